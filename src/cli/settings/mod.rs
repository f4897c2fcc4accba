//! Settings management for CLI set/unset commands.
//!
//! Each key has a handler. Preference keys (`user-name`, `dark-mode`,
//! `language`) live in the data directory's `settings.json`; backend keys
//! (`model`, `base-url`, `temperature`, `turn-timeout`) live in `config.toml`.

pub mod error;
pub mod handlers;
pub mod helpers;
pub mod registry;

use std::path::PathBuf;

pub use error::SettingError;
pub use registry::SettingRegistry;

use crate::core::config::Config;
use crate::core::persistence::LocalStore;
use crate::core::settings::AppSettings;

/// Which document a setting is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingScope {
    Config,
    Preferences,
}

/// Both documents, loaded, for handlers to modify.
pub struct SetContext<'a> {
    pub config: &'a mut Config,
    pub preferences: &'a mut AppSettings,
}

/// Trait for handling a configuration setting.
pub trait SettingHandler {
    fn key(&self) -> &'static str;

    fn scope(&self) -> SettingScope;

    /// Applies `args` to the context and returns a success message.
    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// Restores the default.
    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError>;

    /// One line for `parley set` output.
    fn format(&self, config: &Config, preferences: &AppSettings) -> String;
}

/// Where the two setting documents are read from and written to.
pub struct SettingsFiles {
    pub config_path: PathBuf,
    pub local: LocalStore,
}

impl SettingsFiles {
    fn load(&self) -> Result<(Config, AppSettings), SettingError> {
        let config = Config::load_from_path(&self.config_path)
            .map_err(|err| SettingError::Save(err.to_string()))?;
        Ok((config, self.local.load().settings))
    }

    fn save(
        &self,
        scope: SettingScope,
        config: &Config,
        preferences: &AppSettings,
    ) -> Result<(), SettingError> {
        match scope {
            SettingScope::Config => config
                .save_to_path(&self.config_path)
                .map_err(|err| SettingError::Save(err.to_string())),
            SettingScope::Preferences => self
                .local
                .save_settings(preferences)
                .map_err(|err| SettingError::Save(err.to_string())),
        }
    }

    pub fn set(&self, key: &str, args: &[String]) -> Result<String, SettingError> {
        self.apply(key, |handler, ctx| handler.set(args, ctx))
    }

    pub fn unset(&self, key: &str) -> Result<String, SettingError> {
        self.apply(key, |handler, ctx| handler.unset(ctx))
    }

    fn apply<F>(&self, key: &str, change: F) -> Result<String, SettingError>
    where
        F: FnOnce(&dyn SettingHandler, &mut SetContext<'_>) -> Result<String, SettingError>,
    {
        let registry = SettingRegistry::new();
        let handler = registry
            .get(key)
            .ok_or_else(|| SettingError::UnknownKey(key.to_string()))?;
        let (mut config, mut preferences) = self.load()?;
        let message = change(
            handler,
            &mut SetContext {
                config: &mut config,
                preferences: &mut preferences,
            },
        )?;
        self.save(handler.scope(), &config, &preferences)?;
        Ok(message)
    }

    /// Every setting with its current value, in display order.
    pub fn describe(&self) -> Result<Vec<String>, SettingError> {
        let registry = SettingRegistry::new();
        let (config, preferences) = self.load()?;
        Ok(registry
            .keys_display_order()
            .iter()
            .filter_map(|key| registry.get(key))
            .map(|handler| handler.format(&config, &preferences))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::Language;
    use tempfile::TempDir;

    fn files(temp_dir: &TempDir) -> SettingsFiles {
        SettingsFiles {
            config_path: temp_dir.path().join("config.toml"),
            local: LocalStore::new(temp_dir.path().join("data")),
        }
    }

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn preference_keys_write_settings_document_only() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let files = files(&temp_dir);

        let message = files.set("language", &args(&["FR"])).expect("set");
        assert_eq!(message, "✅ Set language to: fr");
        files
            .set("user-name", &args(&["Camille", "D."]))
            .expect("set");

        let settings = files.local.load().settings;
        assert_eq!(settings.language, Language::Fr);
        assert_eq!(settings.user_name, "Camille D.");
        assert!(!files.config_path.exists());
    }

    #[test]
    fn config_keys_write_config_document() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let files = files(&temp_dir);

        files.set("temperature", &args(&["0.25"])).expect("set");
        files.set("turn-timeout", &args(&["45s"])).expect("set");
        let config = Config::load_from_path(&files.config_path).expect("load");
        assert_eq!(config.temperature, Some(0.25));
        assert_eq!(config.turn_timeout_secs, Some(45));

        files.unset("temperature").expect("unset");
        let config = Config::load_from_path(&files.config_path).expect("load");
        assert_eq!(config.temperature, None);
        assert_eq!(config.turn_timeout_secs, Some(45));
    }

    #[test]
    fn invalid_values_leave_documents_untouched() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let files = files(&temp_dir);

        assert!(matches!(
            files.set("temperature", &args(&["hot"])),
            Err(SettingError::InvalidValue { .. })
        ));
        assert!(matches!(
            files.set("dark-mode", &args(&["sometimes"])),
            Err(SettingError::InvalidBoolean(_))
        ));
        assert!(matches!(
            files.set("language", &args(&["de"])),
            Err(SettingError::InvalidValue { .. })
        ));
        assert!(matches!(
            files.set("model", &[]),
            Err(SettingError::MissingArgs { .. })
        ));
        assert!(matches!(
            files.set("theme", &args(&["dark"])),
            Err(SettingError::UnknownKey(_))
        ));
        assert!(!files.config_path.exists());
        assert!(!files.local.settings_path().exists());
    }

    #[test]
    fn describe_lists_every_key_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let files = files(&temp_dir);
        files.set("dark-mode", &args(&["on"])).expect("set");

        let lines = files.describe().expect("describe");
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "  user-name: Guest User");
        assert_eq!(lines[1], "  dark-mode: on");
        assert_eq!(lines[2], "  language: en");
        assert!(lines[3].starts_with("  model: (unset, default: "));
    }
}
