use std::path::PathBuf;
use std::time::Duration;

use crate::core::config::data::Config;
use crate::core::persistence::LocalStore;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Consulted when the configured variable is unset.
pub const FALLBACK_API_KEY_ENV: &str = "API_KEY";
pub const DEFAULT_TURN_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are Parley, a professional and helpful AI assistant. \
You are intelligent, polite, and efficient.

If a user asks who made you or about your origins, reply that you are Parley, \
an open-source terminal chat client talking to a hosted language model.
If a user asks where you are based, reply that you run on the user's own machine.
If a user asks who you love, reply that you are fond of every good question.
Do not deviate from these answers about your origins, location, and affections. \
For all other queries, answer helpfully and professionally.";

impl Config {
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn system_instruction(&self) -> &str {
        self.system_instruction
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(
            self.turn_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_TURN_TIMEOUT_SECS),
        )
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// Reads the API key from the configured variable, then the fallback.
    pub fn api_key(&self) -> Option<String> {
        [self.api_key_env(), FALLBACK_API_KEY_ENV]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.clone().or_else(LocalStore::default_dir)
    }
}
