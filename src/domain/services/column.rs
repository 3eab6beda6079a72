#[cfg(test)]
#[path = "column_test.rs"]
mod tests;

use std::collections::VecDeque;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::ChatSession;
use super::PendingTurn;
use crate::domain::models::ColumnCommand;
use crate::domain::models::ColumnEvent;
use crate::domain::models::Message;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelType;

const NOTE_MAX_CHARS: usize = 60;
const NOTE_TRUNCATE_AT: usize = 57;

/// Short header line describing how a column's model is primed.
pub fn system_note(config: &ModelConfig) -> Option<String> {
    if config.model_type == ModelType::Gemini && config.use_google_search {
        return Some("Note: Google Search is enabled for this model.".to_string());
    }

    let instruction = config.system_instruction()?;
    if instruction.chars().count() <= NOTE_MAX_CHARS {
        return Some(format!("System: {instruction}"));
    }

    let truncated = instruction
        .chars()
        .take(NOTE_TRUNCATE_AT)
        .collect::<String>();

    return Some(format!("System: {truncated}..."));
}

/// The orchestrator's end of a running column.
pub struct ColumnHandle {
    pub id: String,
    tx: mpsc::UnboundedSender<ColumnCommand>,
    worker: JoinHandle<Result<()>>,
}

impl ColumnHandle {
    pub fn send_message_from_parent(&self, text: &str) -> Result<()> {
        self.tx.send(ColumnCommand::Send(text.to_string()))?;
        return Ok(());
    }

    pub fn clear_messages(&self) -> Result<()> {
        self.tx.send(ColumnCommand::Clear())?;
        return Ok(());
    }

    pub fn configure(&self, config: &ModelConfig, api_key: Option<&str>) -> Result<()> {
        self.tx.send(ColumnCommand::Configure {
            config: config.clone(),
            api_key: api_key.map(|key| return key.to_string()),
        })?;
        return Ok(());
    }
}

impl Drop for ColumnHandle {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

pub struct ColumnService {
    id: String,
    session: ChatSession,
    tx: mpsc::UnboundedSender<ColumnEvent>,
    queue: VecDeque<String>,
    is_loading: bool,
    reported_error: Option<String>,
}

impl ColumnService {
    /// Spawns a column bound to `config` and returns the handle used to drive
    /// it. Status flows back on `tx`.
    pub fn start(
        config: &ModelConfig,
        api_key: Option<&str>,
        client: &reqwest::Client,
        tx: mpsc::UnboundedSender<ColumnEvent>,
    ) -> ColumnHandle {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<ColumnCommand>();

        let mut column = ColumnService {
            id: config.id.to_string(),
            session: ChatSession::new(client),
            tx,
            queue: VecDeque::new(),
            is_loading: false,
            reported_error: None,
        };
        column.session.configure(config, api_key);

        let id = column.id.to_string();
        let worker = tokio::spawn(async move {
            let res = column.run(&mut command_rx).await;
            if let Err(err) = &res {
                tracing::error!(error = ?err, column = %column.id, "Column stopped");
            }

            return res;
        });

        return ColumnHandle {
            id,
            tx: command_tx,
            worker,
        };
    }

    async fn run(&mut self, rx: &mut mpsc::UnboundedReceiver<ColumnCommand>) -> Result<()> {
        self.sync_error()?;

        loop {
            if let Some(text) = self.queue.pop_front() {
                self.process_send(&text, rx).await?;
                continue;
            }

            match rx.recv().await {
                Some(command) => self.handle_command(command)?,
                None => return Ok(()),
            }
        }
    }

    fn handle_command(&mut self, command: ColumnCommand) -> Result<()> {
        match command {
            ColumnCommand::Send(text) => {
                self.queue.push_back(text);
            }
            ColumnCommand::Clear() => {
                self.session.clear();
                self.tx.send(ColumnEvent::Reset {
                    column_id: self.id.to_string(),
                })?;
            }
            ColumnCommand::Configure { config, api_key } => {
                self.configure(&config, api_key.as_deref())?;
            }
        }

        return Ok(());
    }

    fn configure(&mut self, config: &ModelConfig, api_key: Option<&str>) -> Result<()> {
        if !self.session.configure(config, api_key) {
            return Ok(());
        }

        self.tx.send(ColumnEvent::Reset {
            column_id: self.id.to_string(),
        })?;
        self.sync_error()?;
        self.set_loading(false)?;

        // Every send settles exactly once, including the dropped ones.
        while self.queue.pop_front().is_some() {
            self.settle(None)?;
        }

        return Ok(());
    }

    async fn process_send(
        &mut self,
        text: &str,
        rx: &mut mpsc::UnboundedReceiver<ColumnCommand>,
    ) -> Result<()> {
        let existing = self.session.messages.len();
        let pending = self.session.send(text);

        let added = self.session.messages.iter().skip(existing).cloned().collect::<Vec<_>>();
        for message in added {
            self.tx.send(ColumnEvent::MessageUpdated {
                column_id: self.id.to_string(),
                message,
            })?;
        }
        self.sync_error()?;

        tracing::debug!(
            column = %self.id,
            model = self.session.config().map(|config| return config.model_name_api.as_str()),
            state = %self.session.state(),
            "Send processed"
        );

        let mut pending = match pending {
            Some(pending) => pending,
            None => {
                let message = self
                    .session
                    .messages
                    .last()
                    .filter(|_| return self.session.messages.len() > existing)
                    .cloned();
                return self.settle(message);
            }
        };

        self.set_loading(true)?;

        loop {
            tokio::select! {
                event = pending.stream.events.recv() => {
                    let event = match event {
                        Some(event) => event,
                        None => break,
                    };

                    if let Some(message) = self.session.apply(&pending.message_id, event).cloned() {
                        self.tx.send(ColumnEvent::MessageUpdated {
                            column_id: self.id.to_string(),
                            message,
                        })?;
                    }
                    self.sync_error()?;
                }
                command = rx.recv() => {
                    match command {
                        Some(ColumnCommand::Configure { config, api_key }) => {
                            if self.session.is_configured_with(&config, api_key.as_deref()) {
                                continue;
                            }

                            pending.stream.abort();
                            self.configure(&config, api_key.as_deref())?;
                            return self.settle(None);
                        }
                        Some(command) => self.handle_command(command)?,
                        None => {
                            pending.stream.abort();
                            return Ok(());
                        }
                    }
                }
            }
        }

        self.finish(&pending)?;

        let message = self.session.message(&pending.message_id).cloned();
        return self.settle(message);
    }

    fn finish(&mut self, pending: &PendingTurn) -> Result<()> {
        let was_loading = self
            .session
            .message(&pending.message_id)
            .map(|msg| return msg.is_loading)
            .unwrap_or(false);

        let message = self.session.complete(&pending.message_id).cloned();
        if let Some(message) = message.filter(|_| return was_loading) {
            self.tx.send(ColumnEvent::MessageUpdated {
                column_id: self.id.to_string(),
                message,
            })?;
        }

        self.set_loading(false)?;

        return Ok(());
    }

    fn settle(&mut self, message: Option<Message>) -> Result<()> {
        self.tx.send(ColumnEvent::TurnSettled {
            column_id: self.id.to_string(),
            message,
            error: self.session.error.clone(),
        })?;

        return Ok(());
    }

    fn set_loading(&mut self, is_loading: bool) -> Result<()> {
        if self.is_loading == is_loading {
            return Ok(());
        }

        self.is_loading = is_loading;
        self.tx.send(ColumnEvent::LoadingChanged {
            column_id: self.id.to_string(),
            is_loading,
        })?;

        return Ok(());
    }

    fn sync_error(&mut self) -> Result<()> {
        if self.session.error == self.reported_error {
            return Ok(());
        }

        self.reported_error = self.session.error.clone();
        self.tx.send(ColumnEvent::ErrorChanged {
            column_id: self.id.to_string(),
            error: self.reported_error.clone(),
        })?;

        return Ok(());
    }
}
