#[cfg(test)]
#[path = "key_store_test.rs"]
mod tests;

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static API_KEY_WORDS: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"(?i)\bAPI KEY\b").expect("API key regex is valid");
});

/// Maps an API key name such as `GEMINI_API_KEY` to its secret. Empty values
/// are treated as missing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyStore {
    keys: HashMap<String, String>,
}

impl KeyStore {
    pub fn new() -> KeyStore {
        return KeyStore::default();
    }

    pub fn get(&self, key_name: &str) -> Option<&str> {
        return self
            .keys
            .get(key_name)
            .map(|val| return val.as_str())
            .filter(|val| return !val.trim().is_empty());
    }

    pub fn contains(&self, key_name: &str) -> bool {
        return self.get(key_name).is_some();
    }

    /// Stores a secret, returning whether the stored value changed.
    pub fn set(&mut self, key_name: &str, value: &str) -> bool {
        if self.keys.get(key_name).map(|val| return val.as_str()) == Some(value) {
            return false;
        }

        self.keys.insert(key_name.to_string(), value.to_string());
        return true;
    }

    /// `GEMINI_API_KEY` becomes `GEMINI API Key`.
    pub fn display_name(key_name: &str) -> String {
        let spaced = key_name.replace('_', " ");
        return API_KEY_WORDS.replace(&spaced, "API Key").to_string();
    }

    /// Reverses `display_name`. Names already in key form pass through.
    pub fn key_name_from_display(display_name: &str) -> String {
        return display_name
            .split_whitespace()
            .collect::<Vec<&str>>()
            .join("_")
            .to_uppercase();
    }
}
