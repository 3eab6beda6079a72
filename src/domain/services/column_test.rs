use anyhow::Result;
use test_utils::openai_chunk;
use test_utils::sse_body;
use tokio::sync::mpsc;

use super::system_note;
use super::ColumnHandle;
use super::ColumnService;
use crate::domain::models::ColumnEvent;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelType;

fn openai_config(url: &str) -> ModelConfig {
    let mut config = ModelConfig::new(
        "model-openai-compatible",
        "OpenAI Compatible",
        ModelType::OpenAICompatible,
        "gpt-test",
        "OPENAI_COMPATIBLE_API_KEY",
    );
    config.openai_base_url = Some(url.to_string());

    return config;
}

fn gemini_config() -> ModelConfig {
    return ModelConfig::new(
        "model-gemini",
        "Gemini Flash",
        ModelType::Gemini,
        "gemini-test",
        "GEMINI_API_KEY",
    );
}

fn start(
    config: &ModelConfig,
    api_key: Option<&str>,
) -> (ColumnHandle, mpsc::UnboundedReceiver<ColumnEvent>) {
    let (tx, rx) = mpsc::unbounded_channel::<ColumnEvent>();
    let handle = ColumnService::start(config, api_key, &reqwest::Client::new(), tx);

    return (handle, rx);
}

/// Collects events up to and including the next settled turn.
async fn until_settled(rx: &mut mpsc::UnboundedReceiver<ColumnEvent>) -> Vec<ColumnEvent> {
    let mut events = vec![];
    while let Some(event) = rx.recv().await {
        let settled = matches!(event, ColumnEvent::TurnSettled { .. });
        events.push(event);
        if settled {
            break;
        }
    }

    return events;
}

fn loading_changes(events: &[ColumnEvent]) -> Vec<bool> {
    return events
        .iter()
        .filter_map(|event| {
            if let ColumnEvent::LoadingChanged { is_loading, .. } = event {
                return Some(*is_loading);
            }
            return None;
        })
        .collect();
}

async fn mock_hello(server: &mut mockito::ServerGuard, hits: usize) -> mockito::Mock {
    return server
        .mock("POST", "/chat/completions")
        .expect(hits)
        .with_status(200)
        .with_body(sse_body(&[
            &openai_chunk("He"),
            &openai_chunk("llo"),
            "[DONE]",
        ]))
        .create_async()
        .await;
}

mod note {
    use super::*;

    #[test]
    fn it_is_empty_without_an_instruction() {
        assert_eq!(system_note(&gemini_config()), None);
    }

    #[test]
    fn it_shows_short_instructions() {
        let mut config = gemini_config();
        config.gemini_system_instruction = Some("You are a helpful assistant.".to_string());

        insta::assert_snapshot!(system_note(&config).unwrap(), @"System: You are a helpful assistant.");
    }

    #[test]
    fn it_truncates_long_instructions() {
        let mut config = openai_config("http://localhost");
        config.openai_system_instruction = Some(
            "You are a versatile and creative AI assistant who always answers in rhyme.".to_string(),
        );

        let note = system_note(&config).unwrap();
        insta::assert_snapshot!(note, @"System: You are a versatile and creative AI assistant who always ...");
        assert_eq!(note.chars().count(), "System: ".len() + 60);
    }

    #[test]
    fn it_keeps_instructions_at_the_limit() {
        let mut config = openai_config("http://localhost");
        config.openai_system_instruction = Some("x".repeat(60));

        assert_eq!(system_note(&config), Some(format!("System: {}", "x".repeat(60))));
    }

    #[test]
    fn it_replaces_the_instruction_in_search_mode() {
        let mut config = gemini_config();
        config.gemini_system_instruction = Some("You are a helpful assistant.".to_string());
        let config = config.with_search(true);

        insta::assert_snapshot!(system_note(&config).unwrap(), @"Note: Google Search is enabled for this model.");
    }
}

mod column {
    use super::*;

    #[tokio::test]
    async fn it_reports_a_missing_key_on_start() {
        let (_handle, mut rx) = start(&openai_config("http://localhost"), None);

        assert_eq!(
            rx.recv().await,
            Some(ColumnEvent::ErrorChanged {
                column_id: "model-openai-compatible".to_string(),
                error: Some("API Key (OPENAI_COMPATIBLE_API_KEY) is not configured.".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn it_streams_a_turn() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = mock_hello(&mut server, 1).await;

        let (handle, mut rx) = start(&openai_config(&server.url()), Some("abc"));
        handle.send_message_from_parent("hi")?;

        let events = until_settled(&mut rx).await;
        assert_eq!(loading_changes(&events), vec![true, false]);

        match events.last().unwrap() {
            ColumnEvent::TurnSettled {
                column_id,
                message,
                error,
            } => {
                assert_eq!(column_id, "model-openai-compatible");
                let message = message.as_ref().unwrap();
                assert_eq!(message.text, "Hello");
                assert!(!message.is_loading);
                assert_eq!(*error, None);
            }
            event => panic!("unexpected event {event:?}"),
        }

        let updates = events
            .iter()
            .filter(|event| return matches!(event, ColumnEvent::MessageUpdated { .. }))
            .count();
        assert!(updates >= 3);

        return Ok(());
    }

    #[tokio::test]
    async fn it_settles_a_send_without_a_key() -> Result<()> {
        let (handle, mut rx) = start(&openai_config("http://localhost"), None);
        handle.send_message_from_parent("hi")?;

        let events = until_settled(&mut rx).await;
        assert!(loading_changes(&events).is_empty());
        assert_eq!(
            events.last(),
            Some(&ColumnEvent::TurnSettled {
                column_id: "model-openai-compatible".to_string(),
                message: None,
                error: Some(
                    "Cannot send message: API Key (OPENAI_COMPATIBLE_API_KEY) is missing for OpenAI Compatible."
                        .to_string()
                ),
            })
        );

        return Ok(());
    }

    #[tokio::test]
    async fn it_queues_sends_behind_a_running_turn() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = mock_hello(&mut server, 2).await;

        let (handle, mut rx) = start(&openai_config(&server.url()), Some("abc"));
        handle.send_message_from_parent("first")?;
        handle.send_message_from_parent("second")?;

        let first = until_settled(&mut rx).await;
        let second = until_settled(&mut rx).await;
        assert_eq!(loading_changes(&first), vec![true, false]);
        assert_eq!(loading_changes(&second), vec![true, false]);

        mock.assert_async().await;

        return Ok(());
    }

    #[tokio::test]
    async fn it_settles_sends_dropped_by_a_reconfigure() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = mock_hello(&mut server, 1).await;

        let config = openai_config(&server.url());
        let (handle, mut rx) = start(&config, Some("abc"));
        handle.send_message_from_parent("first")?;
        handle.send_message_from_parent("second")?;
        handle.configure(&config, Some("def"))?;

        until_settled(&mut rx).await;
        until_settled(&mut rx).await;

        handle.send_message_from_parent("third")?;
        let third = until_settled(&mut rx).await;
        assert!(matches!(
            third.last(),
            Some(ColumnEvent::TurnSettled { message: Some(_), .. })
        ));

        return Ok(());
    }

    #[tokio::test]
    async fn it_clears_messages() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _mock = mock_hello(&mut server, 1).await;

        let (handle, mut rx) = start(&openai_config(&server.url()), Some("abc"));
        handle.send_message_from_parent("hi")?;
        until_settled(&mut rx).await;

        handle.clear_messages()?;
        assert_eq!(
            rx.recv().await,
            Some(ColumnEvent::Reset {
                column_id: "model-openai-compatible".to_string(),
            })
        );

        return Ok(());
    }

    #[tokio::test]
    async fn it_resets_when_reconfigured() -> Result<()> {
        let config = openai_config("http://localhost");
        let (handle, mut rx) = start(&config, Some("abc"));

        // Identical pair is ignored, so the first event seen is the reset.
        handle.configure(&config, Some("abc"))?;
        handle.configure(&config, Some("def"))?;

        assert_eq!(
            rx.recv().await,
            Some(ColumnEvent::Reset {
                column_id: "model-openai-compatible".to_string(),
            })
        );

        return Ok(());
    }

    #[tokio::test]
    async fn it_reports_the_key_error_after_reconfiguring() -> Result<()> {
        let config = openai_config("http://localhost");
        let (handle, mut rx) = start(&config, Some("abc"));
        handle.configure(&config, None)?;

        assert_eq!(
            rx.recv().await,
            Some(ColumnEvent::Reset {
                column_id: "model-openai-compatible".to_string(),
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(ColumnEvent::ErrorChanged {
                column_id: "model-openai-compatible".to_string(),
                error: Some("API Key (OPENAI_COMPATIBLE_API_KEY) is not configured.".to_string()),
            })
        );

        return Ok(());
    }
}
