//! Plain-text rendering of sessions and transcripts for the terminal.

use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::core::message::{Message, Role, Timestamp};
use crate::core::session::ChatSession;
use crate::core::settings::{AppSettings, Language};
use crate::ui::strings::{strings, SUGGESTIONS};

pub const ASSISTANT_NAME: &str = "Parley";
const TITLE_COLUMN_WIDTH: usize = 36;
/// Right-to-left mark, so bidi-aware terminals start the line on the right.
const RTL_MARK: char = '\u{200F}';
const DARK_ACCENT: &str = "\x1b[1;96m";
const LIGHT_ACCENT: &str = "\x1b[1;34m";
const RESET: &str = "\x1b[0m";

/// Interface text as it should be printed in `language`.
pub fn localized(text: &str, language: Language) -> String {
    if language.is_right_to_left() {
        text.lines()
            .map(|line| format!("{RTL_MARK}{line}"))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        text.to_string()
    }
}

/// The input prompt marker. On a terminal it takes the accent of the
/// current theme.
pub fn prompt_marker(settings: &AppSettings, styled: bool) -> String {
    if !styled {
        return "> ".to_string();
    }
    let accent = if settings.is_dark_mode {
        DARK_ACCENT
    } else {
        LIGHT_ACCENT
    };
    format!("{accent}>{RESET} ")
}

/// Cuts `text` to at most `max_width` terminal columns, marking the cut
/// with an ellipsis.
pub fn fit_to_width(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let mut fitted = String::new();
    let mut width = 0;
    for grapheme in UnicodeSegmentation::graphemes(text, true) {
        let grapheme_width = UnicodeWidthStr::width(grapheme);
        if width + grapheme_width + 1 > max_width {
            break;
        }
        fitted.push_str(grapheme);
        width += grapheme_width;
    }
    fitted.push('…');
    fitted
}

fn pad_to_width(text: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(used)))
}

pub fn format_timestamp(timestamp: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Numbered session list. The number is what `/open` and `/delete` accept.
pub fn session_list(
    sessions: &[&ChatSession],
    active: Option<&str>,
    settings: &AppSettings,
) -> String {
    let text = strings(settings.language);
    if sessions.is_empty() {
        return localized(text.no_history, settings.language);
    }
    let mut out = format!("{}\n", localized(text.recent, settings.language));
    for (index, session) in sessions.iter().enumerate() {
        let marker = if active == Some(session.id.as_str()) {
            '*'
        } else {
            ' '
        };
        let title = pad_to_width(
            &fit_to_width(&session.title, TITLE_COLUMN_WIDTH),
            TITLE_COLUMN_WIDTH,
        );
        out.push_str(&format!(
            "{marker}{:>3}. {title}  {}  ({} messages)\n",
            index + 1,
            format_timestamp(session.updated_at),
            session.messages.len()
        ));
    }
    out
}

fn speaker<'a>(message: &Message, user_name: &'a str) -> &'a str {
    match message.role {
        Role::User => user_name,
        Role::Model => ASSISTANT_NAME,
    }
}

pub fn message_block(message: &Message, user_name: &str) -> String {
    let mut out = format!("{}:", speaker(message, user_name));
    if let Some(attachment) = &message.attachment {
        out.push_str(&format!(
            " [{} image, {} KB]",
            attachment.mime_type,
            attachment.approx_size().div_ceil(1024)
        ));
    }
    if !message.content.is_empty() {
        out.push(' ');
        out.push_str(&message.content);
    }
    if message.is_streaming() {
        out.push_str(" ▌");
    }
    out
}

pub fn transcript(session: &ChatSession, settings: &AppSettings) -> String {
    let mut out = format!("# {}\n\n", session.title);
    for message in &session.messages {
        out.push_str(&message_block(message, &settings.user_name));
        out.push_str("\n\n");
    }
    out
}

/// Greeting shown before the first message of a new chat.
pub fn welcome(settings: &AppSettings) -> String {
    let text = strings(settings.language);
    let name = &settings.user_name;
    let greeting = format!("{}, {name}\n{}", text.greeting, text.welcome);
    let mut out = format!("{}\n\n", localized(&greeting, settings.language));
    for (index, suggestion) in SUGGESTIONS.iter().enumerate() {
        out.push_str(&format!("  [{}] {}\n", index + 1, suggestion.label));
    }
    out.push('\n');
    out.push_str(&localized(text.disclaimer, settings.language));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Attachment;
    use crate::core::settings::Language;

    #[test]
    fn fit_to_width_counts_columns_not_bytes() {
        assert_eq!(fit_to_width("short", 10), "short");
        assert_eq!(fit_to_width("abcdefghij", 5), "abcd…");
        // Each CJK character is two columns wide
        assert_eq!(fit_to_width("漢字漢字漢字", 7), "漢字漢…");
    }

    #[test]
    fn session_list_marks_active_and_numbers_from_one() {
        let mut a = ChatSession::new("a".into(), 1_700_000_000_000);
        a.title = "First".into();
        a.messages.push(Message::user("hi", None));
        let b = ChatSession::new("b".into(), 1_700_000_000_000);

        let listing = session_list(&[&a, &b], Some("b"), &AppSettings::default());
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines[0], "Recent");
        assert!(lines[1].starts_with("   1. First"));
        assert!(lines[1].contains("2023-11-14 22:13 UTC"));
        assert!(lines[1].ends_with("(1 messages)"));
        assert!(lines[2].starts_with("*  2. New Chat"));
    }

    #[test]
    fn empty_session_list_uses_translated_notice() {
        let settings = AppSettings {
            language: Language::Fr,
            ..AppSettings::default()
        };
        assert_eq!(session_list(&[], None, &settings), "Aucun historique.");
    }

    #[test]
    fn message_block_shows_speaker_attachment_and_streaming_cursor() {
        let image = Attachment::from_bytes("image/png", &[0; 2048]);
        let user = Message::user("look", Some(image));
        assert_eq!(
            message_block(&user, "Nour"),
            "Nour: [image/png image, 2 KB] look"
        );

        let mut reply = Message::placeholder();
        reply.push_fragment("Think");
        assert_eq!(message_block(&reply, "Nour"), "Parley: Think ▌");
        reply.finish();
        assert_eq!(message_block(&reply, "Nour"), "Parley: Think");
    }

    #[test]
    fn right_to_left_text_is_marked_per_line() {
        let settings = AppSettings {
            user_name: "Nour".into(),
            language: Language::Ar,
            ..AppSettings::default()
        };
        let text = welcome(&settings);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with('\u{200F}'));
        assert!(lines[0].ends_with("Nour"));
        assert!(lines[1].starts_with('\u{200F}'));
        let disclaimer = strings(Language::Ar).disclaimer;
        assert!(text.ends_with(&format!("\u{200F}{disclaimer}")));

        assert_eq!(localized("Recent", Language::En), "Recent");
    }

    #[test]
    fn prompt_accent_follows_the_theme_only_when_styled() {
        let mut settings = AppSettings::default();
        assert_eq!(prompt_marker(&settings, false), "> ");
        assert_eq!(prompt_marker(&settings, true), "\x1b[1;34m>\x1b[0m ");
        settings.is_dark_mode = true;
        assert_eq!(prompt_marker(&settings, false), "> ");
        assert_eq!(prompt_marker(&settings, true), "\x1b[1;96m>\x1b[0m ");
    }

    #[test]
    fn welcome_greets_by_name() {
        let settings = AppSettings {
            user_name: "Omar".into(),
            ..AppSettings::default()
        };
        let text = welcome(&settings);
        assert!(text.starts_with("Hello, Omar\n"));
        assert!(text.contains("[4] Who created you?"));
    }
}
