#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::path;
use std::process;

use anyhow::Error;
use anyhow::Result;
use owo_colors::OwoColorize;
use owo_colors::Stream;

use crate::application::cli;
use crate::application::cli::Launch;
use crate::application::ui;
use crate::configuration::Config;
use crate::domain::services::Orchestrator;

fn handle_error(err: Error) {
    let text = format!(
        "Oh no! Chorus has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE"),
        err
    );
    eprintln!(
        "{}",
        text.if_supports_color(Stream::Stderr, |text| return text.red())
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

async fn run(launch: Launch) -> Result<()> {
    let mut orchestrator = Orchestrator::new(Config::app_config());

    match launch {
        Launch::Chat => ui::start(&mut orchestrator).await?,
        Launch::Ask(prompt) => ui::ask(&mut orchestrator, &prompt).await?,
    }

    return Ok(());
}

#[tokio::main]
async fn main() {
    better_panic::install();

    let debug_log_dir = env::var("CHORUS_LOG_DIR").unwrap_or_else(|_| {
        return dirs::cache_dir()
            .unwrap_or_else(|| return path::PathBuf::from("."))
            .join("chorus")
            .to_string_lossy()
            .to_string();
    });

    let file_appender = tracing_appender::rolling::never(debug_log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("chorus")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let launch = match cli::parse().await {
        Ok(Some(launch)) => launch,
        Ok(None) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    };

    if let Err(err) = run(launch).await {
        handle_error(err);
    }

    process::exit(0);
}
