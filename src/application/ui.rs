#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;

use anyhow::Result;
use owo_colors::OwoColorize;
use owo_colors::Stream;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;

use crate::domain::models::ColumnEvent;
use crate::domain::models::KeyStore;
use crate::domain::models::Message;
use crate::domain::models::ModelConfig;
use crate::domain::models::SlashCommand;
use crate::domain::services::system_note;
use crate::domain::services::Orchestrator;
use crate::domain::services::TurnResult;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /search (/s) [on,off] - Grounds Gemini answers with Google Search. Starts a new Gemini conversation, and needs the Gemini key.
- /key (/k) [NAME] [VALUE] - Sets an API key, such as `/key GEMINI_API_KEY abc123`. NAME may also be written as shown in the missing keys banner.
- /clear (/c) - Clears the messages of every column.
- /columns (/ls) - Lists every column with its model and system note.
- /quit /exit (/q) - Exit Chorus.
- /help (/h) - Provides this help menu.

Anything else is sent to every column at once. Sending is paused while any column is still answering.
        "#;

    return text.trim().to_string();
}

/// Column listing with the missing keys banner underneath.
pub fn format_header(configs: &[ModelConfig], missing_keys: &[String]) -> String {
    let mut lines = configs
        .iter()
        .map(|config| {
            let mut line = format!("- {} {}", config.name, config.model_name_api);
            if let Some(note) = system_note(config) {
                line = format!("{line}\n  {note}");
            }
            return line;
        })
        .collect::<Vec<String>>();

    if !missing_keys.is_empty() {
        lines.push(format!(
            "\nMissing API keys: {}. Set them with /key NAME VALUE.",
            missing_keys.join(", ")
        ));
    }

    return lines.join("\n");
}

/// One column's finished answer with its numbered sources.
pub fn format_turn(name: &str, message: Option<&Message>, error: Option<&str>) -> String {
    let mut lines = vec![format!("== {name} ==")];

    if let Some(message) = message {
        if !message.text.is_empty() {
            lines.push(message.text.to_string());
        }

        if let Some(sources) = &message.grounding_sources {
            if !sources.is_empty() {
                lines.push("Sources:".to_string());
                for (idx, source) in sources.iter().enumerate() {
                    let n = idx + 1;
                    lines.push(format!("  [{n}] {} <{}>", source.label(), source.uri));
                }
            }
        }
    }

    let error = message
        .and_then(|msg| return msg.error.as_deref())
        .or(error);
    if let Some(error) = error {
        lines.push(format!("Error: {error}"));
    }

    return lines.join("\n");
}

fn print_info(text: &str) {
    println!("{}", text.if_supports_color(Stream::Stdout, |text| return text.dimmed()));
}

fn print_error(text: &str) {
    println!("{}", text.if_supports_color(Stream::Stdout, |text| return text.red()));
}

fn print_header(orchestrator: &Orchestrator) {
    let header = format_header(orchestrator.configs(), &orchestrator.missing_api_keys());
    println!("{}", header.if_supports_color(Stream::Stdout, |text| return text.bold()));
}

fn column_name(orchestrator: &Orchestrator, column_id: &str) -> String {
    return orchestrator
        .configs()
        .iter()
        .find(|config| return config.id == column_id)
        .map(|config| return config.name.to_string())
        .unwrap_or_else(|| return column_id.to_string());
}

fn print_turn(orchestrator: &Orchestrator, result: &TurnResult) {
    let name = column_name(orchestrator, &result.column_id);
    let text = format_turn(&name, result.message.as_ref(), result.error.as_deref());

    let failed = result
        .message
        .as_ref()
        .map(|msg| return msg.error.is_some())
        .unwrap_or(result.error.is_some());
    if failed {
        print_error(&text);
    } else {
        println!("{text}");
    }
}

/// Terminal session state.
#[derive(Default)]
pub struct ChatView {}

impl ChatView {
    /// Handles one line of input. Returns true when the session should end.
    pub fn handle_input(&mut self, orchestrator: &mut Orchestrator, input: &str) -> Result<bool> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(false);
        }

        if let Some(command) = SlashCommand::parse(input) {
            if command.is_quit() {
                return Ok(true);
            }

            if command.is_help() {
                println!("{}", help_text());
                return Ok(false);
            }

            if command.is_columns() {
                print_header(orchestrator);
                return Ok(false);
            }

            if command.is_clear() {
                orchestrator.clear_all()?;
                print_info("Cleared every column.");
                return Ok(false);
            }

            if command.is_search() {
                self.toggle_search(orchestrator, command.toggle_arg())?;
                return Ok(false);
            }

            if command.is_key() {
                self.set_key(orchestrator, command.key_args())?;
                return Ok(false);
            }
        }

        if orchestrator.all_keys_missing() {
            print_error("Every column is missing its API key. Add one with /key NAME VALUE first.");
            return Ok(false);
        }

        if orchestrator.any_busy() {
            print_error("Still waiting on a response. Try again once every column has answered.");
            return Ok(false);
        }

        orchestrator.broadcast(input)?;

        return Ok(false);
    }

    fn toggle_search(&mut self, orchestrator: &mut Orchestrator, enabled: Option<bool>) -> Result<()> {
        let enabled = match enabled {
            Some(enabled) => enabled,
            None => {
                let state = if orchestrator.search_enabled() { "on" } else { "off" };
                print_info(&format!("Google Search is {state}. Use /search on or /search off."));
                return Ok(());
            }
        };

        if !orchestrator.set_search(enabled)? {
            print_error("Google Search needs the Gemini API key. Set it with /key first.");
            return Ok(());
        }

        let state = if enabled { "enabled" } else { "disabled" };
        print_info(&format!("Google Search {state}. Gemini starts a new conversation."));
        print_header(orchestrator);

        return Ok(());
    }

    fn set_key(&mut self, orchestrator: &mut Orchestrator, args: Option<(String, String)>) -> Result<()> {
        let (name, value) = match args {
            Some(args) => args,
            None => {
                print_error("Usage: /key NAME VALUE");
                return Ok(());
            }
        };

        let key_name = KeyStore::key_name_from_display(&name);
        let known = orchestrator
            .configs()
            .iter()
            .any(|config| return config.api_key_name == key_name);
        if !known {
            let names = orchestrator
                .configs()
                .iter()
                .map(|config| return config.api_key_name.to_string())
                .collect::<Vec<String>>();
            print_error(&format!(
                "No column uses {key_name}. Expected one of: {}",
                names.join(", ")
            ));
            return Ok(());
        }

        let count = orchestrator.set_api_key(&key_name, &value)?;
        print_info(&format!(
            "Saved {}. Reconfigured {count} column(s).",
            KeyStore::display_name(&key_name)
        ));

        return Ok(());
    }

    pub fn handle_event(&mut self, orchestrator: &Orchestrator, event: ColumnEvent) {
        match event {
            ColumnEvent::LoadingChanged {
                column_id,
                is_loading: true,
            } => {
                print_info(&format!("{} is thinking...", column_name(orchestrator, &column_id)));
            }
            ColumnEvent::ErrorChanged {
                column_id,
                error: Some(error),
            } => {
                // Errors raised by a turn are reported with its answer.
                if orchestrator.is_busy(&column_id) {
                    return;
                }
                print_error(&format!("{}: {error}", column_name(orchestrator, &column_id)));
            }
            ColumnEvent::TurnSettled {
                column_id,
                message,
                error,
            } => {
                print_turn(
                    orchestrator,
                    &TurnResult {
                        column_id,
                        message,
                        error,
                    },
                );
            }
            _ => (),
        }
    }
}

pub async fn start(orchestrator: &mut Orchestrator) -> Result<()> {
    print_header(orchestrator);
    println!("\nType a prompt, or /help for commands.");

    let mut view = ChatView::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => return drain(orchestrator, &mut view).await,
                };

                if view.handle_input(orchestrator, &line)? {
                    break;
                }
            }
            event = orchestrator.next_event() => {
                match event {
                    Some(event) => view.handle_event(orchestrator, event),
                    None => break,
                }
            }
        }
    }

    return Ok(());
}

/// Prints the answers still streaming once input has ended.
async fn drain(orchestrator: &mut Orchestrator, view: &mut ChatView) -> Result<()> {
    while orchestrator.any_busy() {
        match orchestrator.next_event().await {
            Some(event) => view.handle_event(orchestrator, event),
            None => break,
        }
    }

    return Ok(());
}

/// One-shot mode. Every column answers the prompt, then the process exits.
pub async fn ask(orchestrator: &mut Orchestrator, prompt: &str) -> Result<()> {
    if orchestrator.all_keys_missing() {
        let missing = orchestrator.missing_api_keys().join(", ");
        anyhow::bail!(format!("Every column is missing its API key: {missing}"));
    }

    let results = orchestrator.ask(prompt).await?;
    let answers = results
        .iter()
        .map(|result| {
            let name = column_name(orchestrator, &result.column_id);
            return format_turn(&name, result.message.as_ref(), result.error.as_deref());
        })
        .collect::<Vec<String>>();

    println!("{}", answers.join("\n\n"));

    return Ok(());
}
