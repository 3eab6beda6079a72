#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;

use anyhow::bail;
use anyhow::Result;
use futures::stream::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;

use super::error_detail;
use super::sse::SseDecoder;
use super::sse::SseFrame;
use super::transport_err;
use crate::domain::models::BackendPrompt;
use crate::domain::models::ChatError;
use crate::domain::models::ModelConfig;
use crate::domain::models::Role;
use crate::domain::models::StreamEvent;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: String,
}

impl MessageRequest {
    fn new(role: &str, content: &str) -> MessageRequest {
        return MessageRequest {
            role: role.to_string(),
            content: content.to_string(),
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<MessageRequest>,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionDeltaResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionChoiceResponse {
    #[serde(default)]
    delta: CompletionDeltaResponse,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoiceResponse>,
}

fn to_openai_role(role: Role) -> &'static str {
    match role {
        Role::User => return "user",
        Role::Model => return "assistant",
    }
}

/// Stateless chat-completions client. Every request resends the whole
/// conversation.
#[derive(Clone)]
pub struct OpenAI {
    name: String,
    url: String,
    token: String,
    model: String,
    system_instruction: Option<String>,
    client: reqwest::Client,
}

impl OpenAI {
    pub fn new(config: &ModelConfig, url: &str, token: &str, client: &reqwest::Client) -> OpenAI {
        return OpenAI {
            name: config.name.to_string(),
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            model: config.model_name_api.to_string(),
            system_instruction: config.system_instruction().map(|val| return val.to_string()),
            client: client.clone(),
        };
    }

    /// System instruction first, then every settled prior turn, then the new
    /// user text.
    fn build_messages(&self, prompt: &BackendPrompt) -> Vec<MessageRequest> {
        let mut messages: Vec<MessageRequest> = vec![];
        if let Some(instruction) = &self.system_instruction {
            messages.push(MessageRequest::new("system", instruction));
        }

        for msg in prompt.history.iter().filter(|msg| return msg.is_settled()) {
            messages.push(MessageRequest::new(to_openai_role(msg.role), &msg.text));
        }

        messages.push(MessageRequest::new(
            to_openai_role(Role::User),
            &prompt.text,
        ));

        return messages;
    }

    #[allow(clippy::implicit_return)]
    pub async fn get_completion(
        &self,
        prompt: BackendPrompt,
        tx: &mpsc::UnboundedSender<StreamEvent>,
    ) -> Result<()> {
        let req = CompletionRequest {
            model: self.model.to_string(),
            messages: self.build_messages(&prompt),
            stream: true,
        };

        let res = self
            .client
            .post(format!("{url}/chat/completions", url = self.url))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&req)
            .send()
            .await
            .map_err(|err| return transport_err(&self.name, err))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                "Failed to make completion request to OpenAI"
            );
            bail!(ChatError::Http {
                vendor: "OpenAI".to_string(),
                status: status.as_u16(),
                detail: error_detail(&body, status),
            });
        }

        let mut stream = res.bytes_stream();
        let mut decoder = SseDecoder::default();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|err| return transport_err(&self.name, err))?;
            for frame in decoder.push(&bytes) {
                match frame {
                    SseFrame::Done => {
                        tx.send(StreamEvent::done())?;
                        return Ok(());
                    }
                    SseFrame::Data(payload) => handle_payload(&payload, tx)?,
                }
            }

            // Some servers send the final marker without a trailing blank
            // line and keep the connection open.
            if decoder.has_pending_done() {
                tx.send(StreamEvent::done())?;
                return Ok(());
            }
        }

        if let Some(SseFrame::Data(payload)) = decoder.finish() {
            handle_payload(&payload, tx)?;
        }

        tx.send(StreamEvent::done())?;

        return Ok(());
    }
}

fn handle_payload(payload: &str, tx: &mpsc::UnboundedSender<StreamEvent>) -> Result<()> {
    let ores = match serde_json::from_str::<CompletionResponse>(payload) {
        Ok(ores) => ores,
        Err(err) => {
            let err = ChatError::MalformedChunk(err.to_string());
            tracing::warn!(error = %err, payload = payload, "Skipping OpenAI stream chunk");
            return Ok(());
        }
    };
    tracing::debug!(body = ?ores, "Completion response");

    let text = ores
        .choices
        .first()
        .and_then(|choice| return choice.delta.content.clone());

    if text.as_deref().unwrap_or_default().is_empty() {
        return Ok(());
    }

    tx.send(StreamEvent::delta(text, None))?;

    return Ok(());
}
