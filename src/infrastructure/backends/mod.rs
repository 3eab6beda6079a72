#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub mod gemini;
pub mod openai;
pub mod sse;

use anyhow::bail;
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::models::BackendPrompt;
use crate::domain::models::ChatError;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelType;
use crate::domain::models::StreamEvent;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// One adapter per vendor protocol. Cloning is cheap and shares any session
/// state, so a clone can be moved into a spawned stream task.
#[derive(Clone)]
pub enum Adapter {
    Gemini(gemini::Gemini),
    OpenAICompatible(openai::OpenAI),
}

/// A running completion. Events arrive on `events` until the stream ends;
/// the channel closing means the adapter is fully drained.
pub struct StreamHandle {
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
    worker: JoinHandle<()>,
}

impl StreamHandle {
    pub fn abort(&self) {
        self.worker.abort();
    }
}

impl Adapter {
    pub fn model_type(&self) -> ModelType {
        match self {
            Adapter::Gemini(_) => return ModelType::Gemini,
            Adapter::OpenAICompatible(_) => return ModelType::OpenAICompatible,
        }
    }

    pub async fn get_completion(
        &self,
        prompt: BackendPrompt,
        tx: &mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<()> {
        match self {
            Adapter::Gemini(backend) => return backend.get_completion(prompt, tx).await,
            Adapter::OpenAICompatible(backend) => {
                return backend.get_completion(prompt, tx).await;
            }
        }
    }

    /// Spawns the completion on the runtime and hands back its event stream.
    /// Any adapter failure is delivered exactly once as a terminal event.
    pub fn start(&self, prompt: BackendPrompt) -> StreamHandle {
        let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();
        let adapter = self.clone();

        let worker = tokio::spawn(async move {
            if let Err(err) = adapter.get_completion(prompt, &tx).await {
                tracing::error!(error = ?err, backend = %adapter.model_type(), "Completion failed");
                let _ = tx.send(StreamEvent::failure(&err.to_string()));
            }
        });

        return StreamHandle { events: rx, worker };
    }
}

pub struct BackendManager {}

impl BackendManager {
    /// Builds the adapter for a column. Vendor A sessions are created eagerly;
    /// vendor B only needs its base URL validated.
    pub fn get(config: &ModelConfig, api_key: &str, client: &reqwest::Client) -> Result<Adapter> {
        match config.model_type {
            ModelType::Gemini => {
                let url = config
                    .gemini_base_url
                    .as_deref()
                    .filter(|url| return !url.trim().is_empty())
                    .unwrap_or(DEFAULT_GEMINI_URL);

                return Ok(Adapter::Gemini(gemini::Gemini::new(
                    config, url, api_key, client,
                )));
            }
            ModelType::OpenAICompatible => {
                let url = match config.openai_base_url.as_deref() {
                    Some(url) if !url.trim().is_empty() => url,
                    _ => {
                        bail!(ChatError::MissingBaseUrl {
                            model_name: config.name.to_string(),
                        });
                    }
                };

                return Ok(Adapter::OpenAICompatible(openai::OpenAI::new(
                    config, url, api_key, client,
                )));
            }
        }
    }
}

/// Best-effort extraction of a human readable reason from an error body.
pub fn error_detail(body: &str, status: reqwest::StatusCode) -> String {
    let value = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value,
        Err(_) => {
            return status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string();
        }
    };

    let detail = value
        .pointer("/error/message")
        .and_then(|val| return val.as_str())
        .or_else(|| return value.get("message").and_then(|val| return val.as_str()));

    if let Some(text) = detail {
        return text.split_whitespace().collect::<Vec<&str>>().join(" ");
    }

    return value.to_string();
}

fn transport_err(model_name: &str, err: reqwest::Error) -> ChatError {
    return ChatError::Transport {
        model_name: model_name.to_string(),
        reason: err.to_string(),
    };
}
