use thiserror::Error;

/// Failures surfaced to a conversation. The display strings are what users
/// see in a column's error banner.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("API Key ({key_name}) is not configured.")]
    MissingApiKey { key_name: String },

    #[error("Cannot send message: API Key ({key_name}) is missing for {model_name}.")]
    SendWithoutApiKey {
        key_name: String,
        model_name: String,
    },

    #[error("OpenAI Base URL is not configured for {model_name}.")]
    MissingBaseUrl { model_name: String },

    #[error("Chat session is not initialized.")]
    NotConfigured,

    #[error("{vendor} API Error ({status}): {detail}")]
    Http {
        vendor: String,
        status: u16,
        detail: String,
    },

    #[error("Failed to get response from {model_name}: {reason}")]
    Transport { model_name: String, reason: String },

    #[error("Malformed stream chunk: {0}")]
    MalformedChunk(String),
}
