#[cfg(test)]
#[path = "chat_session_test.rs"]
mod tests;

use crate::domain::models::BackendPrompt;
use crate::domain::models::ChatError;
use crate::domain::models::Message;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelType;
use crate::domain::models::Role;
use crate::domain::models::StreamEvent;
use crate::infrastructure::backends::Adapter;
use crate::infrastructure::backends::BackendManager;
use crate::infrastructure::backends::StreamHandle;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionState {
    Idle,
    AwaitingKey,
    Ready,
    Streaming,
    Error,
}

/// A send that reached a backend. The caller drains `stream` and folds every
/// event back with `ChatSession::apply`.
pub struct PendingTurn {
    pub message_id: String,
    pub stream: StreamHandle,
}

/// One conversation against one model.
pub struct ChatSession {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub error: Option<String>,
    config: Option<ModelConfig>,
    api_key: Option<String>,
    adapter: Option<Adapter>,
    client: reqwest::Client,
}

impl ChatSession {
    pub fn new(client: &reqwest::Client) -> ChatSession {
        return ChatSession {
            messages: vec![],
            is_loading: false,
            error: None,
            config: None,
            api_key: None,
            adapter: None,
            client: client.clone(),
        };
    }

    pub fn config(&self) -> Option<&ModelConfig> {
        return self.config.as_ref();
    }

    pub fn state(&self) -> SessionState {
        if self.config.is_none() {
            return SessionState::Idle;
        }
        if self.is_loading {
            return SessionState::Streaming;
        }
        if self.api_key.is_none() {
            return SessionState::AwaitingKey;
        }
        if self.error.is_some() {
            return SessionState::Error;
        }

        return SessionState::Ready;
    }

    pub fn is_configured_with(&self, config: &ModelConfig, api_key: Option<&str>) -> bool {
        return self.config.as_ref() == Some(config) && self.api_key.as_deref() == normalize_key(api_key);
    }

    /// Binds the session to a model and key. Any change to the pair starts a
    /// fresh conversation; an identical pair is a no-op. Returns whether the
    /// conversation was reset.
    pub fn configure(&mut self, config: &ModelConfig, api_key: Option<&str>) -> bool {
        if self.is_configured_with(config, api_key) {
            return false;
        }

        self.messages.clear();
        self.error = None;
        self.is_loading = false;
        self.adapter = None;
        self.config = Some(config.clone());
        self.api_key = normalize_key(api_key).map(|key| return key.to_string());

        let api_key = match &self.api_key {
            Some(api_key) => api_key,
            None => {
                self.error = Some(
                    ChatError::MissingApiKey {
                        key_name: config.api_key_name.to_string(),
                    }
                    .to_string(),
                );
                return true;
            }
        };

        match BackendManager::get(config, api_key, &self.client) {
            Ok(adapter) => {
                self.adapter = Some(adapter);
            }
            Err(err) => {
                tracing::warn!(error = %err, model = %config.name, "Unable to set up chat session");
                self.error = Some(err.to_string());
            }
        }

        return true;
    }

    /// Empties the transcript. The model binding, and any history the backend
    /// session tracks itself, are left alone.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Starts a turn: appends the user message and a loading placeholder, then
    /// hands back the running stream. Returns `None` when nothing reached a
    /// backend, in which case `error` explains why.
    pub fn send(&mut self, text: &str) -> Option<PendingTurn> {
        if text.trim().is_empty() {
            return None;
        }

        let config = match &self.config {
            Some(config) => config.clone(),
            None => {
                self.error = Some(ChatError::NotConfigured.to_string());
                return None;
            }
        };

        if self.api_key.is_none() {
            self.error = Some(
                ChatError::SendWithoutApiKey {
                    key_name: config.api_key_name.to_string(),
                    model_name: config.name.to_string(),
                }
                .to_string(),
            );
            self.messages.retain(|msg| return !msg.is_loading);
            return None;
        }

        let history = self.messages.clone();
        let placeholder = Message::placeholder();
        let message_id = placeholder.id.to_string();

        self.messages.push(Message::new(Role::User, text));
        self.messages.push(placeholder);
        self.is_loading = true;
        self.error = None;

        let adapter = match &self.adapter {
            Some(adapter) => adapter,
            None => {
                let err = match config.model_type {
                    ModelType::OpenAICompatible => ChatError::MissingBaseUrl {
                        model_name: config.name.to_string(),
                    },
                    ModelType::Gemini => ChatError::NotConfigured,
                };
                self.fail(&message_id, &err.to_string());
                self.is_loading = false;
                return None;
            }
        };

        let stream = adapter.start(BackendPrompt::new(text, history));

        return Some(PendingTurn { message_id, stream });
    }

    /// Folds one stream event into the message it belongs to. Events for a
    /// message that no longer exists are dropped.
    pub fn apply(&mut self, message_id: &str, event: StreamEvent) -> Option<&Message> {
        if let Some(error) = &event.error_message {
            self.error = Some(error.to_string());
        }

        let msg = self.messages.iter_mut().find(|msg| return msg.id == message_id)?;

        if let Some(text) = &event.text_delta {
            msg.append(text);
        }
        if event.grounding_sources.is_some() {
            msg.grounding_sources = event.grounding_sources;
        }
        if let Some(error) = &event.error_message {
            msg.fail(error);
        }
        if event.is_final {
            msg.is_loading = false;
        }

        return Some(&*msg);
    }

    /// Marks the turn as drained. A message left loading by a stream that
    /// closed without a final event is settled here.
    pub fn complete(&mut self, message_id: &str) -> Option<&Message> {
        self.is_loading = false;

        let msg = self.messages.iter_mut().find(|msg| return msg.id == message_id)?;
        msg.is_loading = false;

        return Some(&*msg);
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        return self.messages.iter().find(|msg| return msg.id == message_id);
    }

    fn fail(&mut self, message_id: &str, error: &str) {
        self.error = Some(error.to_string());
        if let Some(msg) = self.messages.iter_mut().find(|msg| return msg.id == message_id) {
            msg.fail(error);
        }
    }
}

fn normalize_key(api_key: Option<&str>) -> Option<&str> {
    return api_key.filter(|key| return !key.trim().is_empty());
}
