#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;

use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use futures::stream::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

use super::error_detail;
use super::sse::SseDecoder;
use super::sse::SseFrame;
use super::transport_err;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ChatError;
use crate::domain::models::GroundingSource;
use crate::domain::models::ModelConfig;
use crate::domain::models::Role;
use crate::domain::models::StreamEvent;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Content {
        return Content {
            role: role.to_string(),
            parts: vec![Part {
                text: text.to_string(),
            }],
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GoogleSearch {}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct WebChunk {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebChunk>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        return self
            .candidates
            .first()
            .and_then(|candidate| return candidate.content.as_ref())
            .map(|content| {
                return content
                    .parts
                    .iter()
                    .map(|part| return part.text.as_str())
                    .collect::<String>();
            })
            .unwrap_or_default();
    }

    /// Citations carried by this chunk, or `None` when it carries none.
    fn grounding_sources(&self) -> Option<Vec<GroundingSource>> {
        let chunks = &self
            .candidates
            .first()?
            .grounding_metadata
            .as_ref()?
            .grounding_chunks;

        if chunks.is_empty() {
            return None;
        }

        let sources = chunks
            .iter()
            .map(|chunk| {
                let web = chunk.web.clone().unwrap_or_default();
                return GroundingSource {
                    uri: web.uri,
                    title: web.title,
                };
            })
            .filter(|source| return !source.uri.trim().is_empty())
            .collect::<Vec<GroundingSource>>();

        return Some(sources);
    }
}

/// Parameters a session is bound to when it is created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    pub model: String,
    pub system_instruction: Option<String>,
    pub google_search: bool,
}

impl SessionSettings {
    /// Search mode and a system instruction are mutually exclusive; the
    /// instruction is dropped whenever search is on.
    pub fn from_config(config: &ModelConfig) -> SessionSettings {
        let google_search = config.is_search_enabled();
        let system_instruction = if google_search {
            None
        } else {
            config.system_instruction().map(|val| return val.to_string())
        };

        return SessionSettings {
            model: config.model_name_api.to_string(),
            system_instruction,
            google_search,
        };
    }

    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            return self.model.to_string();
        }

        return format!("models/{}", self.model);
    }
}

/// A chat session against the Gemini streaming API. The session owns its
/// history; callers only submit the newest user text.
#[derive(Clone)]
pub struct Gemini {
    name: String,
    url: String,
    token: String,
    settings: SessionSettings,
    history: Arc<Mutex<Vec<Content>>>,
    client: reqwest::Client,
}

impl Gemini {
    pub fn new(config: &ModelConfig, url: &str, token: &str, client: &reqwest::Client) -> Gemini {
        return Gemini {
            name: config.name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            settings: SessionSettings::from_config(config),
            history: Arc::new(Mutex::new(vec![])),
            client: client.clone(),
        };
    }

    fn build_request(&self, history: &[Content], text: &str) -> CompletionRequest {
        let mut contents = history.to_vec();
        contents.push(Content::text(&Role::User.to_string(), text));

        let system_instruction = self
            .settings
            .system_instruction
            .as_ref()
            .map(|instruction| return Content::text("system", instruction));

        let mut tools: Vec<Tool> = vec![];
        if self.settings.google_search {
            tools.push(Tool::default());
        }

        return CompletionRequest {
            contents,
            system_instruction,
            tools,
        };
    }

    /// Streams one turn. The history lock is held until the stream ends, so
    /// a session never has two requests in flight.
    #[allow(clippy::implicit_return)]
    pub async fn get_completion(
        &self,
        prompt: BackendPrompt,
        tx: &mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<()> {
        let mut history = self.history.lock().await;
        let req = self.build_request(&history, &prompt.text);

        let res = self
            .client
            .post(format!(
                "{url}/v1beta/{model}:streamGenerateContent?alt=sse",
                url = self.url,
                model = self.settings.model_path(),
            ))
            .header("x-goog-api-key", &self.token)
            .json(&req)
            .send()
            .await
            .map_err(|err| return transport_err(&self.name, err))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                "Failed to make completion request to Gemini"
            );
            bail!(ChatError::Http {
                vendor: "Gemini".to_string(),
                status: status.as_u16(),
                detail: error_detail(&body, status),
            });
        }

        let mut stream = res.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut last_message = "".to_string();
        let mut sources: Option<Vec<GroundingSource>> = None;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|err| return transport_err(&self.name, err))?;
            for frame in decoder.push(&bytes) {
                handle_frame(frame, &mut last_message, &mut sources, tx)?;
            }
        }
        if let Some(frame) = decoder.finish() {
            handle_frame(frame, &mut last_message, &mut sources, tx)?;
        }

        history.push(Content::text(&Role::User.to_string(), &prompt.text));
        history.push(Content::text(&Role::Model.to_string(), &last_message));

        tx.send(StreamEvent::done())?;

        return Ok(());
    }
}

fn handle_frame(
    frame: SseFrame,
    last_message: &mut String,
    sources: &mut Option<Vec<GroundingSource>>,
    tx: &mpsc::UnboundedSender<StreamEvent>,
) -> Result<()> {
    let payload = match frame {
        SseFrame::Data(payload) => payload,
        SseFrame::Done => return Ok(()),
    };

    let res = match serde_json::from_str::<GenerateContentResponse>(&payload) {
        Ok(res) => res,
        Err(err) => {
            let err = ChatError::MalformedChunk(err.to_string());
            tracing::warn!(error = %err, payload = %payload, "Skipping Gemini stream chunk");
            return Ok(());
        }
    };
    tracing::debug!(body = ?res, "Completion response");

    // The most recent chunk carrying citations replaces any earlier list.
    if let Some(chunk_sources) = res.grounding_sources() {
        *sources = Some(chunk_sources);
    }

    let text = res.text();
    *last_message += &text;
    tx.send(StreamEvent::delta(Some(text), sources.clone()))?;

    return Ok(());
}
