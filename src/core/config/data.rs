use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Model name as the backend knows it (e.g., "gemini-3-flash-preview")
    pub model: Option<String>,
    /// API root the `models/{model}:streamGenerateContent` path is appended to
    pub base_url: Option<String>,
    /// Sampling temperature sent with every turn
    pub temperature: Option<f32>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Directive injected into every new conversation
    pub system_instruction: Option<String>,
    /// Where settings.json and sessions.json live
    pub data_dir: Option<PathBuf>,
    /// Upper bound on how long a single reply may stream
    pub turn_timeout_secs: Option<u64>,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.local/share/parley` → `~/.local/share/parley`
/// - macOS: `/Users/user/Library/Application Support/...` → `~/Library/Application Support/...`
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
