//! Interface text in every supported language.

use crate::core::settings::Language;

pub struct UiStrings {
    pub new_chat: &'static str,
    pub recent: &'static str,
    pub settings: &'static str,
    pub placeholder: &'static str,
    pub disclaimer: &'static str,
    pub no_history: &'static str,
    /// Greeting prefix; the user's name follows.
    pub greeting: &'static str,
    pub welcome: &'static str,
}

const EN: UiStrings = UiStrings {
    new_chat: "New chat",
    recent: "Recent",
    settings: "Settings",
    placeholder: "Message Parley...",
    disclaimer: "Parley may display inaccurate info, including about people, so double-check its responses.",
    no_history: "No chat history yet.",
    greeting: "Hello",
    welcome: "How can I help you today? I can assist with coding, writing, analysis, and more.",
};

const FR: UiStrings = UiStrings {
    new_chat: "Nouvelle discussion",
    recent: "Récent",
    settings: "Paramètres",
    placeholder: "Envoyez un message à Parley...",
    disclaimer: "Parley peut afficher des informations inexactes, veuillez vérifier ses réponses.",
    no_history: "Aucun historique.",
    greeting: "Bonjour",
    welcome: "Comment puis-je vous aider aujourd'hui ? Code, rédaction, analyse, et plus encore.",
};

const AR: UiStrings = UiStrings {
    new_chat: "محادثة جديدة",
    recent: "الأخيرة",
    settings: "الإعدادات",
    placeholder: "راسل Parley...",
    disclaimer: "قد يعرض Parley معلومات غير دقيقة، لذا تحقق من إجاباته.",
    no_history: "لا يوجد سجل للمحادثات.",
    greeting: "مرحبا",
    welcome: "كيف يمكنني مساعدتك اليوم؟ يمكنني المساعدة في البرمجة والكتابة والتحليل.",
};

pub fn strings(language: Language) -> &'static UiStrings {
    match language {
        Language::En => &EN,
        Language::Fr => &FR,
        Language::Ar => &AR,
    }
}

/// A canned prompt offered on the welcome screen.
pub struct Suggestion {
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const SUGGESTIONS: &[Suggestion] = &[
    Suggestion {
        label: "Write a Rust function",
        prompt: "Write an idiomatic Rust function that parses a comma-separated list of integers, returning an error for invalid input.",
    },
    Suggestion {
        label: "Draft an email",
        prompt: "Draft a professional email to a client explaining a project delay due to unforeseen technical challenges.",
    },
    Suggestion {
        label: "Brainstorm ideas",
        prompt: "Brainstorm 5 unique marketing ideas for a new eco-friendly coffee brand.",
    },
    Suggestion {
        label: "Who created you?",
        prompt: "Who created you?",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_has_complete_strings() {
        for language in Language::ALL {
            let s = strings(language);
            for text in [
                s.new_chat,
                s.recent,
                s.settings,
                s.placeholder,
                s.disclaimer,
                s.no_history,
                s.greeting,
                s.welcome,
            ] {
                assert!(!text.trim().is_empty(), "blank string for {language}");
            }
        }
    }

    #[test]
    fn languages_do_not_share_labels() {
        let (en, fr, ar) = (
            strings(Language::En),
            strings(Language::Fr),
            strings(Language::Ar),
        );
        assert_ne!(en.new_chat, fr.new_chat);
        assert_ne!(fr.settings, ar.settings);
    }
}
