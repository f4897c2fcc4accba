//! Setting handlers for each settable key.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{
    format_bool, parse_bool, require_args, success_set, success_unset,
};
use crate::cli::settings::{SetContext, SettingHandler, SettingScope};
use crate::core::config::defaults::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TURN_TIMEOUT_SECS,
};
use crate::core::config::Config;
use crate::core::settings::{AppSettings, Language, DEFAULT_USER_NAME};

/// Data-driven handler for free-text settings.
pub struct TextHandler {
    key: &'static str,
    scope: SettingScope,
    hint: &'static str,
    example: &'static str,
    default_display: &'static str,
    get: fn(&Config, &AppSettings) -> Option<String>,
    set_field: fn(&mut SetContext<'_>, Option<String>),
}

impl SettingHandler for TextHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn scope(&self) -> SettingScope {
        self.scope
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let value = require_args(args, self.hint, self.example)?;
        let message = success_set(self.key, &value);
        (self.set_field)(ctx, Some(value));
        Ok(message)
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        (self.set_field)(ctx, None);
        Ok(success_unset(self.key, self.default_display))
    }

    fn format(&self, config: &Config, preferences: &AppSettings) -> String {
        match (self.get)(config, preferences) {
            Some(value) => format!("  {}: {value}", self.key),
            None => format!("  {}: (unset, default: {})", self.key, self.default_display),
        }
    }
}

pub fn user_name_handler() -> TextHandler {
    TextHandler {
        key: "user-name",
        scope: SettingScope::Preferences,
        hint: "To set your display name, provide it:",
        example: "parley set user-name Nour",
        default_display: DEFAULT_USER_NAME,
        get: |_, prefs| Some(prefs.user_name.clone()),
        set_field: |ctx, value| {
            ctx.preferences.user_name = value.unwrap_or_else(|| DEFAULT_USER_NAME.to_string())
        },
    }
}

pub fn model_handler() -> TextHandler {
    TextHandler {
        key: "model",
        scope: SettingScope::Config,
        hint: "To set the model, specify its name:",
        example: "parley set model gemini-3-flash-preview",
        default_display: DEFAULT_MODEL,
        get: |config, _| config.model.clone(),
        set_field: |ctx, value| ctx.config.model = value,
    }
}

pub fn base_url_handler() -> TextHandler {
    TextHandler {
        key: "base-url",
        scope: SettingScope::Config,
        hint: "To set the API base URL, provide it:",
        example: "parley set base-url https://generativelanguage.googleapis.com/v1beta",
        default_display: DEFAULT_BASE_URL,
        get: |config, _| config.base_url.clone(),
        set_field: |ctx, value| ctx.config.base_url = value,
    }
}

/// Handler for the `dark-mode` preference.
pub struct DarkModeHandler;

impl SettingHandler for DarkModeHandler {
    fn key(&self) -> &'static str {
        "dark-mode"
    }

    fn scope(&self) -> SettingScope {
        SettingScope::Preferences
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let input = require_args(
            args,
            "To set dark mode, specify on or off:",
            "parley set dark-mode on",
        )?;
        let value = parse_bool(&input).ok_or(SettingError::InvalidBoolean(input))?;
        ctx.preferences.is_dark_mode = value;
        Ok(success_set(self.key(), format_bool(value)))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        ctx.preferences.is_dark_mode = false;
        Ok(success_unset(self.key(), "off"))
    }

    fn format(&self, _config: &Config, preferences: &AppSettings) -> String {
        format!("  dark-mode: {}", format_bool(preferences.is_dark_mode))
    }
}

/// Handler for the `language` preference.
pub struct LanguageHandler;

impl SettingHandler for LanguageHandler {
    fn key(&self) -> &'static str {
        "language"
    }

    fn scope(&self) -> SettingScope {
        SettingScope::Preferences
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let input = require_args(
            args,
            "To set the interface language, specify en, fr or ar:",
            "parley set language fr",
        )?;
        let language =
            Language::try_from(input.as_str()).map_err(|_| SettingError::InvalidValue {
                key: "language",
                input,
                expected: "one of en, fr, ar",
            })?;
        ctx.preferences.language = language;
        Ok(success_set(self.key(), language.code()))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        ctx.preferences.language = Language::En;
        Ok(success_unset(self.key(), Language::En.code()))
    }

    fn format(&self, _config: &Config, preferences: &AppSettings) -> String {
        format!("  language: {}", preferences.language)
    }
}

/// Handler for the `temperature` setting.
pub struct TemperatureHandler;

impl SettingHandler for TemperatureHandler {
    fn key(&self) -> &'static str {
        "temperature"
    }

    fn scope(&self) -> SettingScope {
        SettingScope::Config
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let input = require_args(
            args,
            "To set the sampling temperature, give a number between 0 and 2:",
            "parley set temperature 0.4",
        )?;
        let value = input
            .parse::<f32>()
            .ok()
            .filter(|value| (0.0..=2.0).contains(value))
            .ok_or_else(|| SettingError::InvalidValue {
                key: "temperature",
                input: input.clone(),
                expected: "a number between 0 and 2",
            })?;
        ctx.config.temperature = Some(value);
        Ok(success_set(self.key(), &value.to_string()))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        ctx.config.temperature = None;
        Ok(success_unset(self.key(), &DEFAULT_TEMPERATURE.to_string()))
    }

    fn format(&self, config: &Config, _preferences: &AppSettings) -> String {
        match config.temperature {
            Some(value) => format!("  temperature: {value}"),
            None => format!("  temperature: (unset, default: {DEFAULT_TEMPERATURE})"),
        }
    }
}

/// Handler for the `turn-timeout` setting, in seconds.
pub struct TurnTimeoutHandler;

impl SettingHandler for TurnTimeoutHandler {
    fn key(&self) -> &'static str {
        "turn-timeout"
    }

    fn scope(&self) -> SettingScope {
        SettingScope::Config
    }

    fn set(&self, args: &[String], ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        let input = require_args(
            args,
            "To set the reply timeout, give a whole number of seconds:",
            "parley set turn-timeout 60",
        )?;
        let secs = input
            .trim_end_matches('s')
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or_else(|| SettingError::InvalidValue {
                key: "turn-timeout",
                input: input.clone(),
                expected: "a positive number of seconds",
            })?;
        ctx.config.turn_timeout_secs = Some(secs);
        Ok(success_set(self.key(), &format!("{secs}s")))
    }

    fn unset(&self, ctx: &mut SetContext<'_>) -> Result<String, SettingError> {
        ctx.config.turn_timeout_secs = None;
        Ok(success_unset(self.key(), &format!("{DEFAULT_TURN_TIMEOUT_SECS}s")))
    }

    fn format(&self, config: &Config, _preferences: &AppSettings) -> String {
        match config.turn_timeout_secs {
            Some(secs) => format!("  turn-timeout: {secs}s"),
            None => format!("  turn-timeout: (unset, default: {DEFAULT_TURN_TIMEOUT_SECS}s)"),
        }
    }
}
