use crate::config::LlmConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

/// Language-model collaborator.
///
/// `generate` is the best-effort single-prompt call used for autonomous
/// episodes; `chat` carries an explicit system instruction and is preferred
/// for requested jobs. Both may block for a long, model-dependent time.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn generate(&self, prompt: &str) -> Result<String>;
    async fn chat(&self, system: &str, user: &str) -> Result<String>;
}

pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => {
            let cfg = config.openai.as_ref().context("OpenAI config missing")?;
            Ok(Box::new(OpenAIClient::new(
                &cfg.api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
            )))
        }
        "ollama" => {
            let cfg = config.ollama.as_ref().context("Ollama config missing")?;
            Ok(Box::new(OllamaClient::new(&cfg.base_url, &cfg.model)))
        }
        _ => Err(anyhow!("Unknown LLM provider: {}", config.provider)),
    }
}

/// Structured call with bounded local retry on transient failure.
pub async fn chat_with_retry(
    llm: &dyn LlmClient,
    config: &LlmConfig,
    system: &str,
    user: &str,
) -> Result<String> {
    let attempts = config.retry_count + 1;
    let mut last_err = anyhow!("LLM chat was never attempted");
    for attempt in 1..=attempts {
        match llm.chat(system, user).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!("LLM chat failed (attempt {}/{}): {:#}", attempt, attempts, e);
                last_err = e;
                if attempt < attempts {
                    tokio::time::sleep(Duration::from_secs(config.retry_delay_seconds)).await;
                }
            }
        }
    }
    Err(last_err)
}

/// Screen a raw response against configured refusal patterns before it is
/// repaired. Returns the matching pattern as the rejection reason.
pub fn rejection_reason(response: &str, disallowed_prefixes: &[String]) -> Option<String> {
    let normalized = response
        .trim_start_matches(['`', '\n', '\r', ' ', '"'])
        .trim();
    disallowed_prefixes
        .iter()
        .find(|prefix| normalized.starts_with(prefix.as_str()))
        .map(|prefix| format!("response starts with disallowed pattern {:?}", prefix))
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAIClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn complete(&self, messages: Vec<OpenAIMessage>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages,
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI API error: {}", error_text));
        }

        let result: OpenAIResponse = resp.json().await?;
        if let Some(choice) = result.choices.first() {
            if let Some(content) = &choice.message.content {
                return Ok(content.clone());
            }
        }

        Err(anyhow!("OpenAI response empty or missing content"))
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(vec![OpenAIMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }])
        .await
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        self.complete(vec![
            OpenAIMessage {
                role: "system".to_string(),
                content: system.to_string(),
            },
            OpenAIMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ])
        .await
    }
}

// --- Ollama ---

#[derive(Debug)]
struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaClient {
    fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn complete(&self, messages: Vec<OllamaMessage>) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let result: OllamaResponse = resp.json().await?;
        Ok(result.message.content)
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.complete(vec![OllamaMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }])
        .await
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        self.complete(vec![
            OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
            },
            OllamaMessage {
                role: "user".to_string(),
                content: user.to_string(),
            },
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_openai_response_parsing_success() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "name|gender|text"
                },
                "finish_reason": "stop"
            }]
        }"#;

        let result: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.choices[0].message.content.as_deref(),
            Some("name|gender|text")
        );
    }

    #[test]
    fn test_openai_response_missing_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let result: OpenAIResponse = serde_json::from_str(json).unwrap();
        assert!(result.choices[0].message.content.is_none());
    }

    #[test]
    fn test_rejection_reason_matches_refusal_prefix() {
        let prefixes = vec!["I'm sorry,".to_string(), "I apologize".to_string()];
        assert!(rejection_reason("I'm sorry, I cannot do that.", &prefixes).is_some());
        assert!(rejection_reason("```\nI apologize, but no.", &prefixes).is_some());
        assert!(rejection_reason("name|gender|text\nA|male|hi", &prefixes).is_none());
    }

    #[test]
    fn test_rejection_reason_names_the_pattern() {
        let prefixes = vec!["I apologize".to_string()];
        let reason = rejection_reason("I apologize profusely", &prefixes).unwrap();
        assert!(reason.contains("I apologize"));
    }

    #[derive(Debug)]
    struct FlakyLlm {
        failures: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for FlakyLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("not used"))
        }

        async fn chat(&self, _system: &str, _user: &str) -> Result<String> {
            if self.failures.fetch_sub(1, Ordering::SeqCst) > 0 {
                Err(anyhow!("transient provider error"))
            } else {
                Ok("recovered".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_chat_with_retry_recovers_from_transient_failure() {
        let llm = FlakyLlm {
            failures: AtomicUsize::new(2),
        };
        let config = LlmConfig {
            retry_count: 3,
            retry_delay_seconds: 0,
            ..LlmConfig::default()
        };
        let out = chat_with_retry(&llm, &config, "system", "user").await.unwrap();
        assert_eq!(out, "recovered");
    }

    #[tokio::test]
    async fn test_chat_with_retry_gives_up_after_bounded_attempts() {
        let llm = FlakyLlm {
            failures: AtomicUsize::new(100),
        };
        let config = LlmConfig {
            retry_count: 1,
            retry_delay_seconds: 0,
            ..LlmConfig::default()
        };
        assert!(chat_with_retry(&llm, &config, "system", "user").await.is_err());
    }
}
