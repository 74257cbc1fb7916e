use crate::config::TtsConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Local;
use std::fmt::Debug;
use std::path::PathBuf;
use uuid::Uuid;

const TTS_GENERATION_PATH: &str = "/api/tts";

/// One synthesized clip; `path` is set when the clip was also persisted.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub path: Option<PathBuf>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait TtsClient: Send + Sync + Debug {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        rate: f32,
        persist_to_disk: bool,
    ) -> Result<SpeechAudio>;
}

pub fn create_tts_client(config: &TtsConfig) -> Result<Box<dyn TtsClient>> {
    Ok(Box::new(HttpTtsClient::new(config)))
}

/// Mimic-style HTTP synthesis server: text body in, WAV bytes out.
#[derive(Debug)]
pub struct HttpTtsClient {
    base_url: String,
    audio_folder: String,
    client: reqwest::Client,
}

impl HttpTtsClient {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            base_url: config.host.trim_end_matches('/').to_string(),
            audio_folder: config.audio_folder.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn clip_path(&self) -> PathBuf {
        let stamp = Local::now().format("%d-%m-%Y_%H").to_string();
        PathBuf::from(&self.audio_folder)
            .join(stamp)
            .join(format!("{}.wav", Uuid::new_v4()))
    }
}

#[async_trait]
impl TtsClient for HttpTtsClient {
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        rate: f32,
        persist_to_disk: bool,
    ) -> Result<SpeechAudio> {
        let url = format!("{}{}", self.base_url, TTS_GENERATION_PATH);
        // The server takes a length scale, the inverse of speaking rate.
        let length_scale = format!("{:.2}", 1.0 / rate.max(0.1));
        let resp = self
            .client
            .post(&url)
            .query(&[("voice", voice_id), ("lengthScale", length_scale.as_str())])
            .body(text.to_string())
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("TTS API error ({}): {}", status, body));
        }

        let bytes = resp.bytes().await?.to_vec();
        let path = if persist_to_disk {
            let path = self.clip_path();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write audio clip to {:?}", path))?;
            Some(path)
        } else {
            None
        };

        Ok(SpeechAudio { path, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TtsConfig;

    #[test]
    fn test_clip_paths_are_dated_and_unique() {
        let config = TtsConfig {
            audio_folder: "audio".to_string(),
            ..TtsConfig::default()
        };
        let client = HttpTtsClient::new(&config);
        let a = client.clip_path();
        let b = client.clip_path();
        assert_ne!(a, b);
        assert!(a.starts_with("audio"));
        assert_eq!(a.extension().and_then(|e| e.to_str()), Some("wav"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = TtsConfig {
            host: "http://tts.local:59125/".to_string(),
            ..TtsConfig::default()
        };
        let client = HttpTtsClient::new(&config);
        assert_eq!(client.base_url, "http://tts.local:59125");
    }
}
