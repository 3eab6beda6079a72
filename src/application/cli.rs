use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use owo_colors::OwoColorize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::application::ui::help_text;
use crate::configuration::Config;
use crate::configuration::ConfigKey;

/// What the binary should do once arguments and config are loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Launch {
    Chat,
    Ask(String),
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_chat() -> Command {
    return Command::new("chat").about("Start an interactive session that sends every prompt to all models side by side.");
}

fn subcommand_ask() -> Command {
    return Command::new("ask")
        .about("Send a single prompt to every model, print each answer, and exit.")
        .arg(
            Arg::new("prompt")
                .help("Prompt to send.")
                .num_args(1..)
                .required(true),
        );
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return format!("CHAT {line}").bold().underline().to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("chorus")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_ask())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("CHORUS_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::GeminiApiKey.to_string())
                .long(ConfigKey::GeminiApiKey.to_string())
                .env("GEMINI_API_KEY")
                .hide_env_values(true)
                .num_args(1)
                .help("Google Gemini API key.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::GeminiModel.to_string())
                .long(ConfigKey::GeminiModel.to_string())
                .env("CHORUS_GEMINI_MODEL")
                .num_args(1)
                .help(format!("Gemini model to chat with. [default: {}]", Config::default(ConfigKey::GeminiModel)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::GeminiSystemInstruction.to_string())
                .long(ConfigKey::GeminiSystemInstruction.to_string())
                .env("CHORUS_GEMINI_SYSTEM_INSTRUCTION")
                .num_args(1)
                .help(format!("System instruction for the Gemini column. Ignored while Google Search is enabled. [default: {}]", Config::default(ConfigKey::GeminiSystemInstruction)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::GeminiURL.to_string())
                .long(ConfigKey::GeminiURL.to_string())
                .env("CHORUS_GEMINI_URL")
                .num_args(1)
                .help(format!("Gemini API URL. [default: {}]", Config::default(ConfigKey::GeminiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::GoogleSearch.to_string())
                .long(ConfigKey::GoogleSearch.to_string())
                .env("CHORUS_GOOGLE_SEARCH")
                .num_args(1)
                .help(format!("Ground Gemini answers with Google Search. [default: {}]", Config::default(ConfigKey::GoogleSearch)))
                .value_parser(PossibleValuesParser::new(["true", "false"]))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenAiCompatibleApiKey.to_string())
                .long(ConfigKey::OpenAiCompatibleApiKey.to_string())
                .env("OPENAI_COMPATIBLE_API_KEY")
                .hide_env_values(true)
                .num_args(1)
                .help("API key for the OpenAI compatible backend.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenAiCompatibleBaseURL.to_string())
                .long(ConfigKey::OpenAiCompatibleBaseURL.to_string())
                .env("OPENAI_COMPATIBLE_BASE_URL")
                .num_args(1)
                .help(format!("Base URL of the OpenAI compatible API, without the /chat/completions suffix. [default: {}]", Config::default(ConfigKey::OpenAiCompatibleBaseURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenAiCompatibleModel.to_string())
                .long(ConfigKey::OpenAiCompatibleModel.to_string())
                .env("OPENAI_COMPATIBLE_MODEL_ID")
                .num_args(1)
                .help(format!("Model ID on the OpenAI compatible backend. [default: {}]", Config::default(ConfigKey::OpenAiCompatibleModel)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OpenAiCompatibleSystemInstruction.to_string())
                .long(ConfigKey::OpenAiCompatibleSystemInstruction.to_string())
                .env("CHORUS_OPENAI_COMPATIBLE_SYSTEM_INSTRUCTION")
                .num_args(1)
                .help(format!("System instruction for the OpenAI compatible column. [default: {}]", Config::default(ConfigKey::OpenAiCompatibleSystemInstruction)))
                .global(true),
        );
}

pub async fn parse() -> Result<Option<Launch>> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("chat", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
        }
        Some(("ask", subcmd_matches)) => {
            Config::load(build(), vec![&matches, subcmd_matches]).await?;
            let prompt = subcmd_matches
                .get_many::<String>("prompt")
                .map(|parts| {
                    return parts
                        .map(|part| return part.as_str())
                        .collect::<Vec<&str>>()
                        .join(" ");
                })
                .unwrap_or_default();

            return Ok(Some(Launch::Ask(prompt)));
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(None);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(None);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(None);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(None);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(None);
            }
        },
        _ => {
            Config::load(build(), vec![&matches]).await?;
        }
    }

    return Ok(Some(Launch::Chat));
}
