use crate::config::Config;
use crate::llm::{chat_with_retry, rejection_reason, LlmClient};
use crate::prompts;
use crate::queue::{QueueNames, QueueStore};
use crate::repair;
use crate::synth;
use crate::timeline::{self, AnimationFrame};
use crate::transcript;
use crate::tts_client::TtsClient;
use crate::voice;
use anyhow::{bail, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, error, info, warn};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const BACKUP_KEY_PREFIX: &str = "backup:";

/// One episode's worth of work, autonomous or viewer-requested.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub requester: Option<String>,
    pub guest_type: String,
    pub scene_type: String,
    pub script_prompt: String,
}

impl JobSpec {
    pub fn autonomous() -> Self {
        Self {
            requester: None,
            guest_type: voice::NORMAL_GUEST_TYPE.to_string(),
            scene_type: prompts::DEFAULT_SCENE_TYPE.to_string(),
            script_prompt: String::new(),
        }
    }

    pub fn from_request(request: ScriptRequest) -> Self {
        Self {
            requester: Some(request.name),
            guest_type: request.guest_type.to_lowercase(),
            scene_type: request.scene_type.to_lowercase(),
            script_prompt: request.prompt,
        }
    }
}

/// Wire format consumed from the request queue.
#[derive(Debug, Deserialize)]
pub struct ScriptRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub guest_type: String,
    pub prompt: String,
    #[serde(default = "default_scene_type")]
    pub scene_type: String,
}

fn default_scene_type() -> String {
    prompts::DEFAULT_SCENE_TYPE.to_string()
}

/// Wire format published to the response queue for requesters.
#[derive(Debug, Serialize)]
pub struct RequestResponse {
    pub name: String,
    pub prompt: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wire format of a finished job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub animation: Vec<AnimationFrame>,
    pub audio: Vec<String>,
    pub guest_gender: String,
    pub guest_type: String,
    pub prompt: String,
    pub requester: Option<String>,
    pub scene_type: String,
}

/// Rotating window of backup slot keys. Owns its counter explicitly instead
/// of hiding it in process-wide state.
#[derive(Debug)]
pub struct BackupKeys {
    next: usize,
    window: usize,
}

impl BackupKeys {
    pub fn new(window: usize) -> Self {
        Self {
            next: 0,
            window: window.max(1),
        }
    }

    pub fn next_key(&mut self) -> String {
        let key = format!("{}{}", BACKUP_KEY_PREFIX, self.next);
        self.next = (self.next + 1) % self.window;
        key
    }
}

/// Sequences repair, parse, voice assignment, synthesis and timeline into a
/// published payload, and keeps the polling loop alive through failures.
pub struct JobAssembler {
    config: Config,
    names: QueueNames,
    llm: Box<dyn LlmClient>,
    tts: Box<dyn TtsClient>,
    store: Box<dyn QueueStore>,
    backups: BackupKeys,
}

impl JobAssembler {
    pub fn new(
        config: Config,
        llm: Box<dyn LlmClient>,
        tts: Box<dyn TtsClient>,
        store: Box<dyn QueueStore>,
    ) -> Self {
        let names = QueueNames::from_config(&config.redis);
        let backups = BackupKeys::new(config.redis.backup_window);
        Self {
            config,
            names,
            llm,
            tts,
            store,
            backups,
        }
    }

    /// Poll for requested work, fall back to autonomous generation, sleep,
    /// repeat. Nothing a single job does can take the loop down.
    pub async fn run_loop(&mut self) -> Result<()> {
        info!("Starting orchestration loop");
        loop {
            self.tick().await;
            tokio::time::sleep(Duration::from_secs(self.config.scheduler.poll_interval_seconds))
                .await;
        }
    }

    /// One scheduling decision: a pending request wins over autonomous work,
    /// and autonomous work is skipped while the backlog is deep.
    pub async fn tick(&mut self) {
        match self.store.pop(&self.names.requests).await {
            Ok(Some(raw)) => {
                match serde_json::from_str::<ScriptRequest>(&raw) {
                    Ok(request) => {
                        let spec = JobSpec::from_request(request);
                        if let Err(e) = self.run_job(spec).await {
                            error!("requested job failed to publish: {:#}", e);
                        }
                    }
                    Err(e) => warn!("dropping malformed script request: {:#}", e),
                }
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("request queue unavailable: {:#}", e);
                return;
            }
        }

        match self.store.len(&self.names.jobs).await {
            Ok(depth) if depth > self.config.scheduler.high_water => {
                debug!("job backlog at {}, skipping generation", depth);
            }
            Ok(_) => {
                if let Err(e) = self.run_job(JobSpec::autonomous()).await {
                    error!("autonomous job failed to publish: {:#}", e);
                }
            }
            Err(e) => warn!("job queue unavailable: {:#}", e),
        }
    }

    /// Run one job to completion and apply the failure policy: notify the
    /// requester if there is one, and mask failed autonomous generations
    /// with a backup replay while the queue runs shallow.
    pub async fn run_job(&mut self, spec: JobSpec) -> Result<()> {
        info!(
            "Generating {} {} episode{}",
            spec.guest_type,
            spec.scene_type,
            spec.requester
                .as_deref()
                .map(|name| format!(" for {}", name))
                .unwrap_or_default()
        );
        match self.build_payload(&spec).await {
            Ok(payload) => {
                self.publish(&payload).await?;
                if spec.requester.is_some() {
                    self.notify(&spec, true, None).await;
                }
                Ok(())
            }
            Err(e) => {
                warn!("episode generation failed: {:#}", e);
                if spec.requester.is_some() {
                    self.notify(&spec, false, Some(format!("{:#}", e))).await;
                } else {
                    self.replay_backup_if_starved().await;
                }
                Ok(())
            }
        }
    }

    async fn build_payload(&self, spec: &JobSpec) -> Result<JobPayload> {
        let raw = self.generate_script(spec).await?;
        if let Some(reason) = rejection_reason(&raw, &self.config.show.disallowed_prefixes) {
            bail!("model response rejected: {}", reason);
        }

        let repaired = repair::repair(&raw)?;
        let rows = transcript::parse(&repaired);
        if rows.is_empty() {
            bail!("no usable rows in transcript");
        }
        debug!("parsed {} transcript rows", rows.len());

        let assignments = voice::assign(&rows, &self.config.show, &spec.guest_type, &spec.scene_type)?;
        let results = synth::synthesize_all(
            &rows,
            &assignments,
            self.tts.as_ref(),
            self.config.tts.concurrency,
            self.config.tts.persist_audio,
        )
        .await?;
        let animation = timeline::build(&rows, &self.config.show.host_name);

        Ok(JobPayload {
            animation,
            audio: results
                .iter()
                .map(|r| BASE64.encode(&r.audio.bytes))
                .collect(),
            guest_gender: voice::resolve_guest_gender(&rows, &self.config.show.host_name),
            guest_type: spec.guest_type.clone(),
            prompt: spec.script_prompt.clone(),
            requester: spec.requester.clone(),
            scene_type: spec.scene_type.clone(),
        })
    }

    async fn generate_script(&self, spec: &JobSpec) -> Result<String> {
        if spec.requester.is_some() {
            let prompt = prompts::requested_prompt(
                &self.config.show.host_name,
                &spec.guest_type,
                &spec.script_prompt,
                &spec.scene_type,
            );
            chat_with_retry(
                self.llm.as_ref(),
                &self.config.llm,
                prompts::SYSTEM_INSTRUCTION,
                &prompt,
            )
            .await
        } else {
            self.llm
                .generate(&prompts::autonomous_prompt(&self.config.show.host_name))
                .await
        }
    }

    async fn publish(&mut self, payload: &JobPayload) -> Result<()> {
        let serialized = serde_json::to_string(payload)?;
        let queue = if payload.requester.is_some() {
            &self.names.requested_jobs
        } else {
            &self.names.jobs
        };
        self.store.push(queue, &serialized).await?;

        let key = self.backups.next_key();
        self.store.kv_set(&key, &serialized).await?;
        info!("Published episode to '{}' (backup slot {})", queue, key);
        Ok(())
    }

    async fn notify(&self, spec: &JobSpec, success: bool, error: Option<String>) {
        let Some(name) = spec.requester.clone() else {
            return;
        };
        let response = RequestResponse {
            name,
            prompt: spec.script_prompt.clone(),
            success,
            error,
        };
        let serialized = match serde_json::to_string(&response) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to serialize request response: {:#}", e);
                return;
            }
        };
        if let Err(e) = self.store.push(&self.names.responses, &serialized).await {
            error!("failed to publish request response: {:#}", e);
        }
    }

    /// After a failed autonomous generation, keep the queue fed by replaying
    /// a random prior payload while the backlog is below the low-water mark.
    async fn replay_backup_if_starved(&self) {
        let depth = match self.store.len(&self.names.jobs).await {
            Ok(depth) => depth,
            Err(e) => {
                warn!("job queue unavailable: {:#}", e);
                return;
            }
        };
        if depth >= self.config.scheduler.low_water {
            return;
        }

        match self.random_backup().await {
            Ok(Some(payload)) => {
                if let Err(e) = self.store.push(&self.names.jobs, &payload).await {
                    warn!("failed to replay backup payload: {:#}", e);
                } else {
                    info!("Masked failed generation with a backup payload");
                }
            }
            Ok(None) => debug!("no backup payloads available to replay"),
            Err(e) => warn!("failed to read backup payloads: {:#}", e),
        }
    }

    async fn random_backup(&self) -> Result<Option<String>> {
        let pattern = format!("{}*", BACKUP_KEY_PREFIX);
        let keys = self.store.kv_keys(&pattern).await?;
        let Some(key) = keys.choose(&mut rand::rng()) else {
            return Ok(None);
        };
        self.store.kv_get(key).await
    }
}
