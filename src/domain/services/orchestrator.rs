#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;

use std::collections::HashMap;
use std::collections::HashSet;

use anyhow::Result;
use tokio::sync::mpsc;

use super::ColumnHandle;
use super::ColumnService;
use crate::domain::models::AppConfig;
use crate::domain::models::ColumnEvent;
use crate::domain::models::KeyStore;
use crate::domain::models::Message;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelType;

/// Final state of one column after a broadcast prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnResult {
    pub column_id: String,
    pub message: Option<Message>,
    pub error: Option<String>,
}

/// Fans prompts out to every column and tracks which ones are still busy.
pub struct Orchestrator {
    configs: Vec<ModelConfig>,
    keys: KeyStore,
    columns: Vec<ColumnHandle>,
    loading: HashMap<String, bool>,
    awaiting: HashSet<String>,
    rx: mpsc::UnboundedReceiver<ColumnEvent>,
}

impl Orchestrator {
    pub fn new(app_config: AppConfig) -> Orchestrator {
        let client = reqwest::Client::new();
        let (tx, rx) = mpsc::unbounded_channel::<ColumnEvent>();

        let columns = app_config
            .models
            .iter()
            .map(|config| {
                return ColumnService::start(
                    config,
                    app_config.keys.get(&config.api_key_name),
                    &client,
                    tx.clone(),
                );
            })
            .collect::<Vec<ColumnHandle>>();

        let loading = app_config
            .models
            .iter()
            .map(|config| return (config.id.to_string(), false))
            .collect::<HashMap<String, bool>>();

        return Orchestrator {
            configs: app_config.models,
            keys: app_config.keys,
            columns,
            loading,
            awaiting: HashSet::new(),
            rx,
        };
    }

    pub fn configs(&self) -> &[ModelConfig] {
        return &self.configs;
    }

    pub fn keys(&self) -> &KeyStore {
        return &self.keys;
    }

    /// Display names of every key some column is waiting on, first come first
    /// listed.
    pub fn missing_api_keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();

        return self
            .configs
            .iter()
            .filter(|config| return !self.keys.contains(&config.api_key_name))
            .map(|config| return KeyStore::display_name(&config.api_key_name))
            .filter(|name| return seen.insert(name.to_string()))
            .collect();
    }

    /// True when no column can reach its backend. Also true with no columns.
    pub fn all_keys_missing(&self) -> bool {
        return self
            .configs
            .iter()
            .all(|config| return !self.keys.contains(&config.api_key_name));
    }

    /// A column is busy from the moment a prompt is handed to it until it
    /// settles that turn, and whenever it reports loading.
    pub fn any_busy(&self) -> bool {
        return !self.awaiting.is_empty()
            || self.loading.values().any(|is_loading| return *is_loading);
    }

    pub fn is_busy(&self, column_id: &str) -> bool {
        return self.awaiting.contains(column_id)
            || self.loading.get(column_id).copied().unwrap_or(false);
    }

    /// Sends the prompt to every column. Columns without a key report their own
    /// error rather than being skipped.
    pub fn broadcast(&mut self, text: &str) -> Result<()> {
        for column in &self.columns {
            column.send_message_from_parent(text)?;
            self.awaiting.insert(column.id.to_string());
        }

        return Ok(());
    }

    pub fn clear_all(&self) -> Result<()> {
        for column in &self.columns {
            column.clear_messages()?;
        }

        return Ok(());
    }

    /// Stores a key and reconfigures the columns that use it. Returns how many
    /// columns were reconfigured.
    pub fn set_api_key(&mut self, key_name: &str, value: &str) -> Result<usize> {
        if !self.keys.set(key_name, value) {
            return Ok(0);
        }

        let mut count = 0;
        for (config, column) in self.configs.iter().zip(&self.columns) {
            if config.api_key_name != key_name {
                continue;
            }

            column.configure(config, self.keys.get(key_name))?;
            count += 1;
        }

        return Ok(count);
    }

    /// Search can only be switched while a Gemini column has its key.
    pub fn search_toggle_enabled(&self) -> bool {
        return self.configs.iter().any(|config| {
            return config.model_type == ModelType::Gemini
                && self.keys.contains(&config.api_key_name);
        });
    }

    pub fn search_enabled(&self) -> bool {
        return self
            .configs
            .iter()
            .any(|config| return config.is_search_enabled());
    }

    /// Switches search mode on every Gemini column. Returns false when the
    /// toggle is unavailable.
    pub fn set_search(&mut self, enabled: bool) -> Result<bool> {
        if !self.search_toggle_enabled() {
            return Ok(false);
        }

        for (config, column) in self.configs.iter_mut().zip(&self.columns) {
            let updated = config.with_search(enabled);
            if updated == *config {
                continue;
            }

            *config = updated;
            column.configure(config, self.keys.get(&config.api_key_name))?;
        }

        return Ok(true);
    }

    /// Folds a column event into the aggregate busy state. Returns whether
    /// the global busy flag flipped.
    pub fn handle_event(&mut self, event: &ColumnEvent) -> bool {
        let was_busy = self.any_busy();

        match event {
            ColumnEvent::LoadingChanged {
                column_id,
                is_loading,
            } => {
                self.loading.insert(column_id.to_string(), *is_loading);
            }
            ColumnEvent::TurnSettled { column_id, .. } => {
                self.awaiting.remove(column_id);
            }
            _ => return false,
        }

        return was_busy != self.any_busy();
    }

    pub async fn next_event(&mut self) -> Option<ColumnEvent> {
        let event = self.rx.recv().await?;
        if self.handle_event(&event) {
            tracing::debug!(column = event.column_id(), busy = self.any_busy(), "Busy state changed");
        }

        return Some(event);
    }

    /// Broadcasts a prompt and waits until every column has settled it.
    pub async fn ask(&mut self, text: &str) -> Result<Vec<TurnResult>> {
        self.broadcast(text)?;

        let mut results: HashMap<String, TurnResult> = HashMap::new();
        while results.len() < self.columns.len() {
            let event = match self.next_event().await {
                Some(event) => event,
                None => break,
            };

            if let ColumnEvent::TurnSettled {
                column_id,
                message,
                error,
            } = event
            {
                results.insert(
                    column_id.to_string(),
                    TurnResult {
                        column_id,
                        message,
                        error,
                    },
                );
            }
        }

        return Ok(self
            .configs
            .iter()
            .filter_map(|config| return results.remove(&config.id))
            .collect());
    }
}
