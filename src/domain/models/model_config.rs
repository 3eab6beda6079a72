#[cfg(test)]
#[path = "model_config_test.rs"]
mod tests;

use super::KeyStore;

pub const SEARCH_SUFFIX: &str = " (Search)";

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ModelType {
    Gemini,
    #[strum(serialize = "openai-compatible")]
    OpenAICompatible,
}

/// Describes a single column. Two configs comparing equal describe the same
/// conversation; any difference starts a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    pub model_type: ModelType,
    pub model_name_api: String,
    pub api_key_name: String,

    pub gemini_system_instruction: Option<String>,
    pub use_google_search: bool,
    pub gemini_base_url: Option<String>,

    pub openai_base_url: Option<String>,
    pub openai_system_instruction: Option<String>,
}

impl ModelConfig {
    pub fn new(id: &str, name: &str, model_type: ModelType, model_name_api: &str, api_key_name: &str) -> ModelConfig {
        return ModelConfig {
            id: id.to_string(),
            name: name.to_string(),
            model_type,
            model_name_api: model_name_api.to_string(),
            api_key_name: api_key_name.to_string(),
            gemini_system_instruction: None,
            use_google_search: false,
            gemini_base_url: None,
            openai_base_url: None,
            openai_system_instruction: None,
        };
    }

    /// The instruction configured for this column's vendor, if any.
    pub fn system_instruction(&self) -> Option<&str> {
        let instruction = match self.model_type {
            ModelType::Gemini => self.gemini_system_instruction.as_deref(),
            ModelType::OpenAICompatible => self.openai_system_instruction.as_deref(),
        };

        return instruction.filter(|text| return !text.trim().is_empty());
    }

    pub fn is_search_enabled(&self) -> bool {
        return self.model_type == ModelType::Gemini && self.use_google_search;
    }

    /// Returns a copy with search mode switched, renaming the column so the
    /// mode is visible in its header.
    pub fn with_search(&self, enabled: bool) -> ModelConfig {
        let mut config = self.clone();
        if config.model_type != ModelType::Gemini {
            return config;
        }

        let base_name = config
            .name
            .strip_suffix(SEARCH_SUFFIX)
            .unwrap_or(&config.name)
            .to_string();

        config.use_google_search = enabled;
        config.name = if enabled {
            format!("{base_name}{SEARCH_SUFFIX}")
        } else {
            base_name
        };

        return config;
    }
}

/// Everything the orchestrator needs at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub models: Vec<ModelConfig>,
    pub keys: KeyStore,
}
