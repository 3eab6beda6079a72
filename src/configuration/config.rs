#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::models::AppConfig;
use crate::domain::models::KeyStore;
use crate::domain::models::ModelConfig;
use crate::domain::models::ModelType;
use crate::infrastructure::backends::DEFAULT_GEMINI_URL;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

pub const GEMINI_API_KEY_NAME: &str = "GEMINI_API_KEY";
pub const OPENAI_COMPATIBLE_API_KEY_NAME: &str = "OPENAI_COMPATIBLE_API_KEY";

#[derive(Clone, Copy, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ConfigFile,
    GeminiApiKey,
    GeminiModel,
    GeminiSystemInstruction,
    GeminiURL,
    GoogleSearch,
    #[strum(serialize = "openai-compatible-api-key")]
    OpenAiCompatibleApiKey,
    #[strum(serialize = "openai-compatible-base-url")]
    OpenAiCompatibleBaseURL,
    #[strum(serialize = "openai-compatible-model")]
    OpenAiCompatibleModel,
    #[strum(serialize = "openai-compatible-system-instruction")]
    OpenAiCompatibleSystemInstruction,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let config_path = dirs::cache_dir()
            .unwrap_or_else(|| return path::PathBuf::from("."))
            .join("chorus/config.toml");

        let res = match key {
            ConfigKey::GeminiApiKey => "",
            ConfigKey::GeminiModel => "gemini-2.5-flash-preview-05-20",
            ConfigKey::GeminiSystemInstruction => "You are a helpful assistant.",
            ConfigKey::GeminiURL => DEFAULT_GEMINI_URL,
            ConfigKey::GoogleSearch => "false",
            ConfigKey::OpenAiCompatibleApiKey => "",
            ConfigKey::OpenAiCompatibleBaseURL => "https://openrouter.ai/api/v1",
            ConfigKey::OpenAiCompatibleModel => "tngtech/deepseek-r1t-chimera:free",
            ConfigKey::OpenAiCompatibleSystemInstruction => {
                "You are a versatile and creative AI assistant."
            }

            // Special
            ConfigKey::ConfigFile => return config_path.to_string_lossy().to_string(),
        };

        return res.to_string();
    }

    pub async fn load(cmd: Command, clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Some(arg_config_file) =
                matches.get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            Config::load_toml(&cmd, &toml_str)?;
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            gemini_model = Config::get(ConfigKey::GeminiModel),
            gemini_url = Config::get(ConfigKey::GeminiURL),
            google_search = Config::get(ConfigKey::GoogleSearch),
            openai_compatible_base_url = Config::get(ConfigKey::OpenAiCompatibleBaseURL),
            openai_compatible_model = Config::get(ConfigKey::OpenAiCompatibleModel),
            "config"
        );

        return Ok(());
    }

    fn load_toml(cmd: &Command, toml_str: &str) -> Result<()> {
        let doc = toml_str.parse::<toml_edit::Document>()?;

        for key in ConfigKey::iter() {
            let val = match doc.get(&key.to_string()) {
                Some(val) => val,
                None => continue,
            };

            // Use clap value parsers to do validation.
            let mut possible_values = vec![];
            if let Some(arg) = cmd
                .get_arguments()
                .find(|e| return e.get_long() == Some(key.to_string().as_str()))
            {
                possible_values = arg
                    .get_possible_values()
                    .iter()
                    .map(|e| return e.get_name().to_string())
                    .collect::<Vec<String>>();
            }

            let val_str = if let Some(val_bool) = val.as_bool() {
                val_bool.to_string()
            } else if let Some(val_int) = val.as_integer() {
                val_int.to_string()
            } else if let Some(val_str) = val.as_str() {
                val_str.to_string()
            } else {
                bail!(format!("config.toml has an unsupported value for key '{key}'"));
            };

            if val_str.is_empty() {
                continue;
            }
            if !possible_values.is_empty() && !possible_values.contains(&val_str) {
                bail!(format!("config.toml has an invalid value for key '{key}': {val_str}\nPossible values are: {}", possible_values.join(", ")));
            }
            Config::set(key, &val_str);
        }

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let mut description = arg
                    .get_help()
                    .map(|help| return help.to_string())
                    .unwrap_or_default();

                description = description
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                if !arg.get_possible_values().is_empty() {
                    let possible_values = arg
                        .get_possible_values()
                        .iter()
                        .map(|e| return e.get_name())
                        .collect::<Vec<_>>()
                        .join(", ");
                    description = format!("{description} [possible values: {}]", possible_values);
                }

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<bool>().is_ok() || val.parse::<i32>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{val}\"");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }

    /// Snapshot of the loaded configuration as the explicit startup object the
    /// orchestrator consumes.
    pub fn app_config() -> AppConfig {
        let mut gemini = ModelConfig::new(
            "model-gemini",
            "Gemini Flash",
            ModelType::Gemini,
            &Config::get(ConfigKey::GeminiModel),
            GEMINI_API_KEY_NAME,
        );
        gemini.gemini_system_instruction = non_empty(Config::get(ConfigKey::GeminiSystemInstruction));
        gemini.gemini_base_url = non_empty(Config::get(ConfigKey::GeminiURL));
        let gemini = gemini.with_search(Config::get(ConfigKey::GoogleSearch) == "true");

        let mut openai = ModelConfig::new(
            "model-openai-compatible",
            "OpenAI Compatible",
            ModelType::OpenAICompatible,
            &Config::get(ConfigKey::OpenAiCompatibleModel),
            OPENAI_COMPATIBLE_API_KEY_NAME,
        );
        openai.openai_base_url = non_empty(Config::get(ConfigKey::OpenAiCompatibleBaseURL));
        openai.openai_system_instruction =
            non_empty(Config::get(ConfigKey::OpenAiCompatibleSystemInstruction));

        let mut keys = KeyStore::new();
        for (key_name, config_key) in [
            (GEMINI_API_KEY_NAME, ConfigKey::GeminiApiKey),
            (OPENAI_COMPATIBLE_API_KEY_NAME, ConfigKey::OpenAiCompatibleApiKey),
        ] {
            let value = Config::get(config_key);
            if !value.is_empty() {
                keys.set(key_name, &value);
            }
        }

        return AppConfig {
            models: vec![gemini, openai],
            keys,
        };
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        return None;
    }

    return Some(value);
}
