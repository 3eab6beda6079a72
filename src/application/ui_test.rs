use anyhow::Result;
use test_utils::openai_chunk;
use test_utils::sse_body;

use super::drain;
use super::format_header;
use super::format_turn;
use super::help_text;
use super::ChatView;
use crate::domain::models::AppConfig;
use crate::domain::models::ColumnEvent;
use crate::domain::models::GroundingSource;
use crate::domain::models::KeyStore;
use crate::domain::models::Message;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelType;
use crate::domain::models::Role;
use crate::domain::services::Orchestrator;

fn gemini_config() -> ModelConfig {
    let mut config = ModelConfig::new(
        "model-gemini",
        "Gemini Flash",
        ModelType::Gemini,
        "gemini-test",
        "GEMINI_API_KEY",
    );
    config.gemini_system_instruction = Some("You are a helpful assistant.".to_string());
    config.gemini_base_url = Some("http://127.0.0.1:1".to_string());

    return config;
}

fn openai_config() -> ModelConfig {
    let mut config = ModelConfig::new(
        "model-openai-compatible",
        "OpenAI Compatible",
        ModelType::OpenAICompatible,
        "gpt-test",
        "OPENAI_COMPATIBLE_API_KEY",
    );
    config.openai_base_url = Some("http://localhost".to_string());

    return config;
}

fn orchestrator(keys: &[(&str, &str)]) -> Orchestrator {
    let mut store = KeyStore::new();
    for (name, value) in keys {
        store.set(name, value);
    }

    return Orchestrator::new(AppConfig {
        models: vec![gemini_config(), openai_config()],
        keys: store,
    });
}

#[test]
fn it_lists_every_command() {
    let text = help_text();
    assert!(text.starts_with("COMMANDS:"));

    let commands = text
        .lines()
        .filter(|line| return line.starts_with("- "))
        .count();
    assert_eq!(commands, 6);
}

mod header {
    use super::*;

    #[test]
    fn it_formats_columns_and_missing_keys() {
        let header = format_header(
            &[gemini_config(), openai_config()],
            &["GEMINI API Key".to_string()],
        );

        assert_eq!(
            header,
            "- Gemini Flash gemini-test\n  System: You are a helpful assistant.\n- OpenAI Compatible gpt-test\n\nMissing API keys: GEMINI API Key. Set them with /key NAME VALUE."
        );
    }

    #[test]
    fn it_omits_the_banner_when_keys_are_set() {
        let header = format_header(&[openai_config()], &[]);
        insta::assert_snapshot!(header, @"- OpenAI Compatible gpt-test");
    }
}

mod turn {
    use super::*;

    #[test]
    fn it_formats_an_answer() {
        let message = Message::new(Role::Model, "Hello there");
        insta::assert_snapshot!(format_turn("Gemini Flash", Some(&message), None), @r###"
        == Gemini Flash ==
        Hello there
        "###);
    }

    #[test]
    fn it_numbers_sources() {
        let mut message = Message::new(Role::Model, "Rust 1.0 shipped in 2015.");
        message.grounding_sources = Some(vec![
            GroundingSource {
                uri: "https://blog.rust-lang.org".to_string(),
                title: "Rust Blog".to_string(),
            },
            GroundingSource {
                uri: "https://example.com".to_string(),
                title: "".to_string(),
            },
        ]);

        assert_eq!(
            format_turn("Gemini Flash (Search)", Some(&message), None),
            "== Gemini Flash (Search) ==\nRust 1.0 shipped in 2015.\nSources:\n  [1] Rust Blog <https://blog.rust-lang.org>\n  [2] https://example.com <https://example.com>"
        );
    }

    #[test]
    fn it_keeps_partial_text_with_the_error() {
        let mut message = Message::new(Role::Model, "Partial");
        message.fail("OpenAI API Error (500): Internal Server Error");

        assert_eq!(
            format_turn("OpenAI Compatible", Some(&message), None),
            "== OpenAI Compatible ==\nPartial\nError: OpenAI API Error (500): Internal Server Error"
        );
    }

    #[test]
    fn it_reports_a_turn_without_a_message() {
        let text = format_turn(
            "Gemini Flash",
            None,
            Some("Cannot send message: API Key (GEMINI_API_KEY) is missing for Gemini Flash."),
        );
        insta::assert_snapshot!(text, @r###"
        == Gemini Flash ==
        Error: Cannot send message: API Key (GEMINI_API_KEY) is missing for Gemini Flash.
        "###);
    }
}

mod input {
    use super::*;

    #[tokio::test]
    async fn it_quits() -> Result<()> {
        let mut orchestrator = orchestrator(&[]);
        let mut view = ChatView::default();

        assert!(view.handle_input(&mut orchestrator, "/quit")?);
        assert!(view.handle_input(&mut orchestrator, "/q")?);

        return Ok(());
    }

    #[tokio::test]
    async fn it_refuses_prompts_without_keys() -> Result<()> {
        let mut orchestrator = orchestrator(&[]);
        let mut view = ChatView::default();

        assert!(!view.handle_input(&mut orchestrator, "hello")?);
        assert!(!orchestrator.any_busy());

        return Ok(());
    }

    #[tokio::test]
    async fn it_refuses_prompts_while_busy() -> Result<()> {
        let mut orchestrator = orchestrator(&[("GEMINI_API_KEY", "abc")]);
        orchestrator.handle_event(&ColumnEvent::LoadingChanged {
            column_id: "model-gemini".to_string(),
            is_loading: true,
        });
        let mut view = ChatView::default();

        assert!(!view.handle_input(&mut orchestrator, "hello")?);
        assert!(!orchestrator.is_busy("model-openai-compatible"));

        return Ok(());
    }

    #[tokio::test]
    async fn it_marks_every_column_busy_after_a_prompt() -> Result<()> {
        let mut orchestrator = orchestrator(&[("GEMINI_API_KEY", "abc")]);
        let mut view = ChatView::default();

        assert!(!view.handle_input(&mut orchestrator, "  hello  ")?);
        assert!(orchestrator.is_busy("model-gemini"));
        assert!(orchestrator.is_busy("model-openai-compatible"));

        return Ok(());
    }

    #[tokio::test]
    async fn it_sends_only_the_first_of_two_quick_lines() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .expect(1)
            .with_status(200)
            .with_body(sse_body(&[&openai_chunk("Hello"), "[DONE]"]))
            .create_async()
            .await;

        let mut config = openai_config();
        config.openai_base_url = Some(server.url());
        let mut keys = KeyStore::new();
        keys.set("OPENAI_COMPATIBLE_API_KEY", "abc");
        let mut orchestrator = Orchestrator::new(AppConfig {
            models: vec![config],
            keys,
        });
        let mut view = ChatView::default();

        view.handle_input(&mut orchestrator, "first")?;
        view.handle_input(&mut orchestrator, "second")?;

        let mut settled = 0;
        while orchestrator.any_busy() {
            if let Some(ColumnEvent::TurnSettled { .. }) = orchestrator.next_event().await {
                settled += 1;
            }
        }
        assert_eq!(settled, 1);
        mock.assert_async().await;

        return Ok(());
    }

    #[tokio::test]
    async fn it_waits_for_answers_after_input_ends() -> Result<()> {
        let mut orchestrator = orchestrator(&[("GEMINI_API_KEY", "abc")]);
        let mut view = ChatView::default();

        view.handle_input(&mut orchestrator, "hello")?;
        assert!(orchestrator.any_busy());

        drain(&mut orchestrator, &mut view).await?;
        assert!(!orchestrator.any_busy());

        return Ok(());
    }

    #[tokio::test]
    async fn it_sets_keys_by_display_name() -> Result<()> {
        let mut orchestrator = orchestrator(&[]);
        let mut view = ChatView::default();

        view.handle_input(&mut orchestrator, "/key GEMINI API Key abc")?;
        assert!(orchestrator.keys().contains("GEMINI_API_KEY"));
        assert_eq!(
            orchestrator.missing_api_keys(),
            vec!["OPENAI COMPATIBLE API Key"]
        );

        view.handle_input(&mut orchestrator, "/key UNKNOWN_KEY abc")?;
        assert!(!orchestrator.keys().contains("UNKNOWN_KEY"));

        return Ok(());
    }

    #[tokio::test]
    async fn it_toggles_search() -> Result<()> {
        let mut orchestrator = orchestrator(&[]);
        let mut view = ChatView::default();

        view.handle_input(&mut orchestrator, "/search on")?;
        assert!(!orchestrator.search_enabled());

        view.handle_input(&mut orchestrator, "/key GEMINI_API_KEY abc")?;
        view.handle_input(&mut orchestrator, "/search on")?;
        assert!(orchestrator.search_enabled());

        view.handle_input(&mut orchestrator, "/s off")?;
        assert!(!orchestrator.search_enabled());

        return Ok(());
    }
}
