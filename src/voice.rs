use crate::config::{ShowConfig, VoiceSpec};
use crate::transcript::{Gender, TranscriptRow};
use anyhow::{anyhow, Result};
use rand::seq::IndexedRandom;

pub const ROBOT_GUEST_TYPE: &str = "robot";
pub const NORMAL_GUEST_TYPE: &str = "normal";

/// Speakers matching the configured host name, or this generic alias, are
/// always voiced as the host.
const HOST_ALIAS: &str = "host";

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceAssignment {
    pub row_index: usize,
    pub voice_id: String,
    pub rate: f32,
}

/// One entry per pool, drawn once per synthesis run so a whole episode keeps
/// a consistent cast instead of changing voices between lines.
#[derive(Debug, Clone)]
pub struct PoolDraw {
    pub host: VoiceSpec,
    pub male: VoiceSpec,
    pub female: VoiceSpec,
    pub robot: VoiceSpec,
}

impl PoolDraw {
    pub fn random(show: &ShowConfig) -> Result<PoolDraw> {
        let mut rng = rand::rng();
        Ok(PoolDraw {
            host: draw(&show.voices.host, "host", &mut rng)?,
            male: draw(&show.voices.male, "male", &mut rng)?,
            female: draw(&show.voices.female, "female", &mut rng)?,
            robot: draw(&show.voices.robot, "robot", &mut rng)?,
        })
    }
}

fn draw(pool: &[VoiceSpec], label: &str, rng: &mut impl rand::Rng) -> Result<VoiceSpec> {
    pool.choose(rng)
        .cloned()
        .ok_or_else(|| anyhow!("voice pool '{}' is empty", label))
}

pub fn is_host(speaker_name: &str, host_name: &str) -> bool {
    let name = speaker_name.to_lowercase();
    name.contains(&host_name.to_lowercase()) || name.contains(HOST_ALIAS)
}

/// Map every row to a voice and speaking rate, drawing the run's cast first.
pub fn assign(
    rows: &[TranscriptRow],
    show: &ShowConfig,
    guest_type: &str,
    scene_type: &str,
) -> Result<Vec<VoiceAssignment>> {
    let pool_draw = PoolDraw::random(show)?;
    Ok(assign_with_draw(rows, show, guest_type, scene_type, &pool_draw))
}

/// Deterministic core of [`assign`]: given a fixed draw, the mapping depends
/// only on the rows and configuration.
pub fn assign_with_draw(
    rows: &[TranscriptRow],
    show: &ShowConfig,
    guest_type: &str,
    scene_type: &str,
    pool_draw: &PoolDraw,
) -> Vec<VoiceAssignment> {
    let modifier = show
        .scene_rate_modifiers
        .get(scene_type)
        .copied()
        .unwrap_or(1.0);

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let spec = if is_host(&row.speaker_name, &show.host_name) {
                // Host rows keep the host voice whatever gender the model
                // attributed to them.
                &pool_draw.host
            } else if guest_type == ROBOT_GUEST_TYPE {
                &pool_draw.robot
            } else if row.gender == Gender::Female {
                &pool_draw.female
            } else {
                // Absent or malformed gender resolves to male; the tie-break
                // keeps voice selection stable against noisy model output.
                &pool_draw.male
            };
            VoiceAssignment {
                row_index: i,
                voice_id: spec.voice.clone(),
                rate: spec.rate * modifier,
            }
        })
        .collect()
}

/// Gender of the episode's guest, taken from the first non-host row with the
/// same male default as voice selection.
pub fn resolve_guest_gender(rows: &[TranscriptRow], host_name: &str) -> String {
    for row in rows {
        if !is_host(&row.speaker_name, host_name) {
            return match row.gender {
                Gender::Female => "female",
                _ => "male",
            }
            .to_string();
        }
    }
    "male".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VoicePools;

    fn row(name: &str, gender: Gender) -> TranscriptRow {
        TranscriptRow {
            speaker_name: name.to_string(),
            gender,
            text: "line".to_string(),
        }
    }

    fn fixed_draw() -> PoolDraw {
        let spec = |voice: &str, rate: f32| VoiceSpec {
            voice: voice.to_string(),
            rate,
        };
        PoolDraw {
            host: spec("voice-host", 0.9),
            male: spec("voice-male", 1.0),
            female: spec("voice-female", 1.1),
            robot: spec("voice-robot", 0.8),
        }
    }

    fn show() -> ShowConfig {
        ShowConfig::default()
    }

    #[test]
    fn test_host_row_gets_host_voice_regardless_of_gender() {
        let rows = vec![row("Poe Reagan", Gender::Female), row("Jane", Gender::Female)];
        let assignments = assign_with_draw(&rows, &show(), NORMAL_GUEST_TYPE, "podcast", &fixed_draw());
        assert_eq!(assignments[0].voice_id, "voice-host");
        assert_eq!(assignments[1].voice_id, "voice-female");
    }

    #[test]
    fn test_generic_host_alias_matches() {
        let rows = vec![row("The Host", Gender::Male)];
        let assignments = assign_with_draw(&rows, &show(), NORMAL_GUEST_TYPE, "podcast", &fixed_draw());
        assert_eq!(assignments[0].voice_id, "voice-host");
    }

    #[test]
    fn test_female_normal_guest_gets_female_voice() {
        let rows = vec![row("Jane", Gender::Female)];
        let assignments = assign_with_draw(&rows, &show(), NORMAL_GUEST_TYPE, "podcast", &fixed_draw());
        assert_eq!(assignments[0].voice_id, "voice-female");
    }

    #[test]
    fn test_robot_guest_overrides_gender() {
        let rows = vec![row("Unit 7", Gender::Unknown), row("Clara", Gender::Female)];
        let assignments = assign_with_draw(&rows, &show(), ROBOT_GUEST_TYPE, "podcast", &fixed_draw());
        assert_eq!(assignments[0].voice_id, "voice-robot");
        assert_eq!(assignments[1].voice_id, "voice-robot");
    }

    #[test]
    fn test_unknown_gender_defaults_to_male() {
        let rows = vec![row("Mr Bones", Gender::Unknown)];
        let assignments = assign_with_draw(&rows, &show(), "skeleton", "podcast", &fixed_draw());
        assert_eq!(assignments[0].voice_id, "voice-male");
    }

    #[test]
    fn test_scene_modifier_multiplies_rate() {
        let rows = vec![row("Poe Reagan", Gender::Male), row("Jane", Gender::Female)];
        let assignments = assign_with_draw(&rows, &show(), NORMAL_GUEST_TYPE, "rapbattle", &fixed_draw());
        assert!((assignments[0].rate - 0.9 * 1.15).abs() < 1e-6);
        assert!((assignments[1].rate - 1.1 * 1.15).abs() < 1e-6);
    }

    #[test]
    fn test_unregistered_scene_leaves_rate_unmodified() {
        let rows = vec![row("Jane", Gender::Female)];
        let assignments = assign_with_draw(&rows, &show(), NORMAL_GUEST_TYPE, "openmic", &fixed_draw());
        assert!((assignments[0].rate - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_assignment_indices_follow_row_order() {
        let rows = vec![
            row("Poe Reagan", Gender::Male),
            row("Jane", Gender::Female),
            row("Poe Reagan", Gender::Male),
        ];
        let assignments = assign_with_draw(&rows, &show(), NORMAL_GUEST_TYPE, "podcast", &fixed_draw());
        let indices: Vec<usize> = assignments.iter().map(|a| a.row_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_pool_is_an_error() {
        let mut config = show();
        config.voices = VoicePools {
            host: vec![],
            ..VoicePools::default()
        };
        assert!(PoolDraw::random(&config).is_err());
    }

    #[test]
    fn test_guest_gender_from_first_non_host_row() {
        let rows = vec![row("Poe Reagan", Gender::Male), row("Jane", Gender::Female)];
        assert_eq!(resolve_guest_gender(&rows, "Poe Reagan"), "female");

        let rows = vec![row("Poe Reagan", Gender::Male), row("Glorb", Gender::Unknown)];
        assert_eq!(resolve_guest_gender(&rows, "Poe Reagan"), "male");
    }
}
