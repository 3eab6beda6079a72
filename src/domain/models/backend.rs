#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use super::GroundingSource;
use super::Message;

pub struct BackendPrompt {
    pub text: String,
    /// Prior turns of the conversation, oldest first. Backends that keep
    /// their own session history ignore this.
    pub history: Vec<Message>,
}

impl BackendPrompt {
    pub fn new(text: &str, history: Vec<Message>) -> BackendPrompt {
        return BackendPrompt {
            text: text.to_string(),
            history,
        };
    }
}

/// One normalized increment of a streamed response, regardless of which
/// vendor produced it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamEvent {
    pub text_delta: Option<String>,
    pub grounding_sources: Option<Vec<GroundingSource>>,
    pub error_message: Option<String>,
    pub is_final: bool,
}

impl StreamEvent {
    pub fn delta(text: Option<String>, grounding_sources: Option<Vec<GroundingSource>>) -> StreamEvent {
        return StreamEvent {
            text_delta: text.filter(|val| return !val.is_empty()),
            grounding_sources,
            error_message: None,
            is_final: false,
        };
    }

    pub fn done() -> StreamEvent {
        return StreamEvent {
            is_final: true,
            ..StreamEvent::default()
        };
    }

    pub fn failure(error: &str) -> StreamEvent {
        return StreamEvent {
            error_message: Some(error.to_string()),
            is_final: true,
            ..StreamEvent::default()
        };
    }
}
