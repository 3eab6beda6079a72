#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

impl GroundingSource {
    /// Prefer the title when a backend provides one, falling back to the URI.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            return &self.uri;
        }

        return &self.title;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub is_loading: bool,
    pub error: Option<String>,
    pub grounding_sources: Option<Vec<GroundingSource>>,
}

impl Message {
    pub fn new(role: Role, text: &str) -> Message {
        return Message {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.to_string(),
            is_loading: false,
            error: None,
            grounding_sources: None,
        };
    }

    /// Empty model message shown while a response streams in.
    pub fn placeholder() -> Message {
        let mut msg = Message::new(Role::Model, "");
        msg.is_loading = true;

        return msg;
    }

    pub fn append(&mut self, text: &str) {
        self.text += text;
    }

    pub fn fail(&mut self, error: &str) {
        self.error = Some(error.to_string());
        self.is_loading = false;
    }

    /// Finished without an error, and therefore safe to replay as history.
    pub fn is_settled(&self) -> bool {
        return !self.is_loading && self.error.is_none();
    }
}
