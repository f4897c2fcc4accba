use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_USER_NAME: &str = "Guest User";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    Ar,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Fr, Language::Ar];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Ar => "ar",
        }
    }

    pub fn is_right_to_left(self) -> bool {
        self == Language::Ar
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Language {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|language| language.code() == normalized)
            .ok_or_else(|| format!("unsupported language '{value}' (expected en, fr or ar)"))
    }
}

/// User preferences, persisted independently of the session list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub user_name: String,
    /// Picks the prompt accent colour on a terminal. Piped output stays plain.
    pub is_dark_mode: bool,
    pub language: Language,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            user_name: DEFAULT_USER_NAME.to_string(),
            is_dark_mode: false,
            language: Language::En,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_document_format() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"userName":"Nour","isDarkMode":true,"language":"ar"}"#)
                .expect("parse");
        assert_eq!(settings.user_name, "Nour");
        assert!(settings.is_dark_mode);
        assert_eq!(settings.language, Language::Ar);
        assert!(settings.language.is_right_to_left());
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!(serde_json::from_str::<AppSettings>(
            r#"{"userName":"x","isDarkMode":false,"language":"de"}"#
        )
        .is_err());
        assert!(Language::try_from("de").is_err());
        assert_eq!(Language::try_from(" FR ").expect("fr"), Language::Fr);
    }

    #[test]
    fn defaults_match_first_run() {
        let settings = AppSettings::default();
        assert_eq!(settings.user_name, DEFAULT_USER_NAME);
        assert!(!settings.is_dark_mode);
        assert_eq!(settings.language, Language::En);
    }
}
