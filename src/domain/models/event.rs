use super::Message;

/// Status reported by a column back to the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnEvent {
    /// Only emitted when the column's loading flag actually flips.
    LoadingChanged { column_id: String, is_loading: bool },
    MessageUpdated { column_id: String, message: Message },
    ErrorChanged {
        column_id: String,
        error: Option<String>,
    },
    /// Messages were wiped by a reconfigure or a clear.
    Reset { column_id: String },
    /// A send has been fully processed, whether or not it reached a backend.
    TurnSettled {
        column_id: String,
        message: Option<Message>,
        error: Option<String>,
    },
}

impl ColumnEvent {
    pub fn column_id(&self) -> &str {
        match self {
            ColumnEvent::LoadingChanged { column_id, .. } => return column_id,
            ColumnEvent::MessageUpdated { column_id, .. } => return column_id,
            ColumnEvent::ErrorChanged { column_id, .. } => return column_id,
            ColumnEvent::Reset { column_id } => return column_id,
            ColumnEvent::TurnSettled { column_id, .. } => return column_id,
        }
    }
}
