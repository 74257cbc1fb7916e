use crate::transcript::TranscriptRow;
use crate::voice::is_host;
use serde::{Deserialize, Serialize};

const HOST_CAMERA: u8 = 1;
const GUEST_CAMERA: u8 = 2;

/// Duration is a stub; real timing is not computed from the audio.
const STUB_LENGTH: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationFrame {
    pub camera: u8,
    pub character_pose: [u8; 2],
    pub length: u32,
    pub text: String,
}

/// Derive the animation sequence from parsed rows. Pure function, no I/O.
///
/// Every row but the last maps by host-vs-guest classification; the final
/// row is always the terminal frame whoever spoke it.
pub fn build(rows: &[TranscriptRow], host_name: &str) -> Vec<AnimationFrame> {
    let last = rows.len().saturating_sub(1);
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let (camera, character_pose) = if i == last {
                (0, [0, 0])
            } else if is_host(&row.speaker_name, host_name) {
                (HOST_CAMERA, [1, 0])
            } else {
                (GUEST_CAMERA, [0, 1])
            };
            AnimationFrame {
                camera,
                character_pose,
                length: STUB_LENGTH,
                text: row.text.clone(),
            }
        })
        .collect()
}
