use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub show: ShowConfig,

    #[serde(rename = "loop", default)]
    pub scheduler: LoopConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,

    #[serde(default = "default_job_queue")]
    pub job_queue: String,
    #[serde(default = "default_requested_job_queue")]
    pub requested_job_queue: String,
    #[serde(default = "default_request_queue")]
    pub request_queue: String,
    #[serde(default = "default_response_queue")]
    pub response_queue: String,

    /// Number of rotating backup slots kept in the key/value store.
    #[serde(default = "default_backup_window")]
    pub backup_window: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    /// "openai" or "ollama".
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    pub openai: Option<OpenAIConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TtsConfig {
    #[serde(default = "default_tts_host")]
    pub host: String,

    #[serde(default = "default_audio_folder")]
    pub audio_folder: String,

    /// Upper bound on in-flight synthesis calls per job.
    #[serde(default = "default_tts_concurrency")]
    pub concurrency: usize,

    /// Also write each clip under `audio_folder` instead of keeping it only
    /// in the payload.
    #[serde(default)]
    pub persist_audio: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ShowConfig {
    #[serde(default = "default_host_name")]
    pub host_name: String,

    #[serde(default)]
    pub voices: VoicePools,

    /// Scene types with a registered rate modifier speak faster or slower.
    #[serde(default = "default_scene_rate_modifiers")]
    pub scene_rate_modifiers: HashMap<String, f32>,

    /// Responses starting with any of these are rejected before repair.
    #[serde(default = "default_disallowed_prefixes")]
    pub disallowed_prefixes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VoicePools {
    #[serde(default = "default_host_pool")]
    pub host: Vec<VoiceSpec>,
    #[serde(default = "default_male_pool")]
    pub male: Vec<VoiceSpec>,
    #[serde(default = "default_female_pool")]
    pub female: Vec<VoiceSpec>,
    #[serde(default = "default_robot_pool")]
    pub robot: Vec<VoiceSpec>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VoiceSpec {
    pub voice: String,
    #[serde(default = "default_rate")]
    pub rate: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoopConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Skip autonomous generation once the job queue is deeper than this.
    #[serde(default = "default_high_water")]
    pub high_water: usize,

    /// Replay a backup after a failed generation while the queue is shallower
    /// than this.
    #[serde(default = "default_low_water")]
    pub low_water: usize,
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}
fn default_redis_port() -> u16 {
    6379
}
fn default_job_queue() -> String {
    "jobs".to_string()
}
fn default_requested_job_queue() -> String {
    "requested_jobs".to_string()
}
fn default_request_queue() -> String {
    "script_requests".to_string()
}
fn default_response_queue() -> String {
    "script_request_responses".to_string()
}
fn default_backup_window() -> usize {
    30
}
fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_retry_count() -> usize {
    3
}
fn default_retry_delay() -> u64 {
    10
}
fn default_tts_host() -> String {
    "http://127.0.0.1:59125".to_string()
}
fn default_audio_folder() -> String {
    "audio".to_string()
}
fn default_tts_concurrency() -> usize {
    4
}
fn default_host_name() -> String {
    "Poe Reagan".to_string()
}
fn default_scene_rate_modifiers() -> HashMap<String, f32> {
    HashMap::from([
        ("rapbattle".to_string(), 1.15),
        ("businesstalk".to_string(), 0.9),
    ])
}
fn default_disallowed_prefixes() -> Vec<String> {
    vec![
        "As a large language model trained by OpenAI,".to_string(),
        "As a language model trained by OpenAI,".to_string(),
        "I'm sorry,".to_string(),
        "I apologize".to_string(),
    ]
}
fn voice(name: &str, rate: f32) -> VoiceSpec {
    VoiceSpec {
        voice: name.to_string(),
        rate,
    }
}
fn default_host_pool() -> Vec<VoiceSpec> {
    vec![voice("en_US/cmu-arctic_low#jmk", 0.95)]
}
fn default_male_pool() -> Vec<VoiceSpec> {
    vec![
        voice("en_US/cmu-arctic_low#fem", 1.0),
        voice("en_US/cmu-arctic_low#rms", 1.0),
    ]
}
fn default_female_pool() -> Vec<VoiceSpec> {
    vec![
        voice("en_US/cmu-arctic_low#slt", 1.0),
        voice("en_US/cmu-arctic_low#clb", 1.0),
    ]
}
fn default_robot_pool() -> Vec<VoiceSpec> {
    vec![voice("en_US/cmu-arctic_low#awb", 0.85)]
}
fn default_rate() -> f32 {
    1.0
}
fn default_poll_interval() -> u64 {
    5
}
fn default_high_water() -> usize {
    25
}
fn default_low_water() -> usize {
    3
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            job_queue: default_job_queue(),
            requested_job_queue: default_requested_job_queue(),
            request_queue: default_request_queue(),
            response_queue: default_response_queue(),
            backup_window: default_backup_window(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            retry_count: default_retry_count(),
            retry_delay_seconds: default_retry_delay(),
            openai: None,
            ollama: None,
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            host: default_tts_host(),
            audio_folder: default_audio_folder(),
            concurrency: default_tts_concurrency(),
            persist_audio: false,
        }
    }
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            host_name: default_host_name(),
            voices: VoicePools::default(),
            scene_rate_modifiers: default_scene_rate_modifiers(),
            disallowed_prefixes: default_disallowed_prefixes(),
        }
    }
}

impl Default for VoicePools {
    fn default() -> Self {
        Self {
            host: default_host_pool(),
            male: default_male_pool(),
            female: default_female_pool(),
            robot: default_robot_pool(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            high_water: default_high_water(),
            low_water: default_low_water(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        let config: Config =
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.tts.audio_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let config: Config = serde_yaml_ng::from_str(
            "llm:\n  provider: ollama\n  ollama:\n    base_url: http://localhost:11434\n    model: llama3\n",
        )
        .unwrap();
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.redis.port, 6379);
        assert_eq!(config.redis.backup_window, 30);
        assert_eq!(config.show.host_name, "Poe Reagan");
        assert!(!config.show.voices.male.is_empty());
        assert_eq!(config.scheduler.high_water, 25);
    }

    #[test]
    fn test_loop_section_uses_reserved_word_key() {
        let config: Config =
            serde_yaml_ng::from_str("loop:\n  poll_interval_seconds: 1\n  high_water: 2\n")
                .unwrap();
        assert_eq!(config.scheduler.poll_interval_seconds, 1);
        assert_eq!(config.scheduler.high_water, 2);
        assert_eq!(config.scheduler.low_water, 3);
    }

    #[test]
    fn test_scene_rate_modifiers_default() {
        let config = Config::default();
        assert!(config.show.scene_rate_modifiers.contains_key("rapbattle"));
    }
}
