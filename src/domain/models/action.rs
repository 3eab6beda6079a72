use super::ModelConfig;

/// Instructions sent from the orchestrator to a single column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnCommand {
    Send(String),
    Clear(),
    Configure {
        config: ModelConfig,
        api_key: Option<String>,
    },
}
