//! HTTP client for the calling platform's application API
//!
//! Deploys the local dialog application project, pushes job keys into its
//! work queue, and pumps queue events back over the engine boundary. The API
//! endpoint and credentials come from the project's `platform.json`, so the
//! CLI stays argv-only.
//!
//! Transport faults while polling surface as [`QueueEvent::Error`] — logged
//! by the coordinator, never fatal to the batch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{ConversationSettings, DeployConfig};
use crate::error::{EngineError, Result};
use crate::types::{CallRecord, JobKey};

use super::{Conversation, ConversationResult, JobQueue, QueueEvent, QueueEvents};

/// Delay before re-polling after a transport fault
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Pacing between polls when the platform returned an empty batch
const EMPTY_POLL_DELAY: Duration = Duration::from_millis(500);

/// Connection settings read from `<project>/platform.json`.
#[derive(Clone, Debug, Deserialize)]
struct ProjectManifest {
    /// Base URL of the platform API
    api_base: String,
    /// API key for the account owning the application
    api_key: String,
}

#[derive(Serialize)]
struct DeployRequest<'a> {
    group_name: &'a str,
}

#[derive(Deserialize)]
struct DeployResponse {
    application_id: String,
}

/// Queue event as the platform serializes it.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventPayload {
    Ready {
        key: JobKey,
    },
    Rejected {
        key: JobKey,
        #[serde(default)]
        error: Option<EngineError>,
    },
    Timeout {
        key: JobKey,
    },
    Error {
        error: EngineError,
    },
}

#[derive(Debug, Deserialize)]
struct EventBatch {
    #[serde(default)]
    events: Vec<EventPayload>,
    cursor: u64,
}

/// A deployed application on the calling platform.
///
/// Created by [`PlatformEngine::deploy`]; implements [`JobQueue`] and feeds
/// the [`QueueEvents`] stream handed out at deploy time.
#[derive(Clone, Debug)]
pub struct PlatformEngine {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    application_id: String,
    events_tx: mpsc::UnboundedSender<QueueEvent>,
}

impl PlatformEngine {
    /// Deploy the dialog application project and open its event stream.
    ///
    /// Reads `<project>/platform.json` for the API endpoint and key, then
    /// registers the application under the configured group.
    pub async fn deploy(options: &DeployConfig) -> Result<(Arc<Self>, QueueEvents)> {
        let manifest = read_manifest(&options.project_path)?;
        let api_base = manifest.api_base.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{api_base}/applications"))
            .bearer_auth(&manifest.api_key)
            .json(&DeployRequest {
                group_name: &options.group_name,
            })
            .send()
            .await?
            .error_for_status()?;
        let deployed: DeployResponse = response.json().await?;
        info!(
            application_id = %deployed.application_id,
            group = %options.group_name,
            "application deployed"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            client,
            api_base,
            api_key: manifest.api_key,
            application_id: deployed.application_id,
            events_tx,
        });
        Ok((engine, events_rx))
    }

    /// Identifier the platform assigned to the deployed application.
    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    fn application_url(&self, suffix: &str) -> String {
        format!(
            "{}/applications/{}/{suffix}",
            self.api_base, self.application_id
        )
    }

    /// Long-poll the platform for queue events and forward them until the
    /// receiver is dropped.
    async fn pump_events(self) {
        let mut cursor: u64 = 0;
        loop {
            if self.events_tx.is_closed() {
                debug!("event receiver dropped, stopping event pump");
                return;
            }
            match self.poll_events(cursor).await {
                Ok(batch) => {
                    cursor = batch.cursor;
                    if batch.events.is_empty() {
                        tokio::time::sleep(EMPTY_POLL_DELAY).await;
                        continue;
                    }
                    for payload in batch.events {
                        if self.events_tx.send(self.translate(payload)).is_err() {
                            return;
                        }
                    }
                }
                Err(error) => {
                    warn!(name = %error.name, "event poll failed: {}", error.message);
                    if self.events_tx.send(QueueEvent::Error { error }).is_err() {
                        return;
                    }
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            }
        }
    }

    async fn poll_events(&self, cursor: u64) -> std::result::Result<EventBatch, EngineError> {
        let response = self
            .client
            .get(self.application_url("events"))
            .query(&[("cursor", cursor)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;
        let response = expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))
    }

    fn translate(&self, payload: EventPayload) -> QueueEvent {
        match payload {
            EventPayload::Ready { key } => QueueEvent::Ready {
                key,
                conversation: Box::new(PlatformConversation::new(
                    self.client.clone(),
                    self.api_base.clone(),
                    self.api_key.clone(),
                    key,
                )),
            },
            EventPayload::Rejected { key, error } => QueueEvent::Rejected {
                key,
                error: error
                    .unwrap_or_else(|| EngineError::new("Rejected", "job rejected by engine")),
            },
            EventPayload::Timeout { key } => QueueEvent::Timeout { key },
            EventPayload::Error { error } => QueueEvent::Error { error },
        }
    }
}

#[async_trait]
impl JobQueue for PlatformEngine {
    async fn push(&self, key: JobKey) -> std::result::Result<(), EngineError> {
        let response = self
            .client
            .post(self.application_url("queue/jobs"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "key": key }))
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;
        expect_success(response).await?;
        Ok(())
    }

    async fn start(&self, concurrency: usize) -> std::result::Result<(), EngineError> {
        let response = self
            .client
            .post(self.application_url("start"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "concurrency": concurrency }))
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;
        expect_success(response).await?;

        tokio::spawn(self.clone().pump_events());
        Ok(())
    }
}

/// A ready conversation on the platform, addressed by its job key.
struct PlatformConversation {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    key: JobKey,
    input: Option<CallRecord>,
    settings: Option<ConversationSettings>,
}

impl PlatformConversation {
    fn new(client: reqwest::Client, api_base: String, api_key: String, key: JobKey) -> Self {
        Self {
            client,
            api_base,
            api_key,
            key,
            input: None,
            settings: None,
        }
    }

    fn conversation_url(&self, suffix: &str) -> String {
        format!("{}/conversations/{}/{suffix}", self.api_base, self.key)
    }
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    input: Option<&'a CallRecord>,
    audio: AudioSettings<'a>,
    sip: SipSettings<'a>,
}

#[derive(Serialize)]
struct AudioSettings<'a> {
    noise_volume: f64,
    tts: &'a str,
}

#[derive(Serialize)]
struct SipSettings<'a> {
    config: &'a str,
}

#[async_trait]
impl Conversation for PlatformConversation {
    fn set_input(&mut self, input: CallRecord) {
        self.input = Some(input);
    }

    fn configure(&mut self, settings: &ConversationSettings) {
        self.settings = Some(settings.clone());
    }

    async fn execute(&mut self) -> std::result::Result<ConversationResult, EngineError> {
        let settings = self.settings.clone().unwrap_or_default();
        let request = ExecuteRequest {
            input: self.input.as_ref(),
            audio: AudioSettings {
                noise_volume: settings.noise_volume,
                tts: &settings.tts_profile,
            },
            sip: SipSettings {
                config: &settings.sip_profile,
            },
        };
        let response = self
            .client
            .post(self.conversation_url("execute"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;
        let response = expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))
    }

    async fn decline(&mut self) -> std::result::Result<(), EngineError> {
        let response = self
            .client
            .post(self.conversation_url("ignore"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;
        expect_success(response).await?;
        Ok(())
    }
}

fn read_manifest(project_path: &Path) -> Result<ProjectManifest> {
    let manifest_path = project_path.join("platform.json");
    let contents = std::fs::read_to_string(&manifest_path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Pass through successful responses; map failures to the platform's own
/// error body when it sent one, a transport error otherwise.
async fn expect_success(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match response.json::<EngineError>().await {
        Ok(error) => Err(error),
        Err(_) => Err(EngineError::transport(format!(
            "unexpected status {status}"
        ))),
    }
}
