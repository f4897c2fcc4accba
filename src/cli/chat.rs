//! Interactive line-based chat loop.

use std::error::Error;
use std::io::{self, IsTerminal, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::say::print_turn;
use crate::cli::sessions::resolve_session;
use crate::core::app::{ChatController, SubmitError};
use crate::core::backend::ChatBackend;
use crate::core::message::Attachment;
use crate::ui::render;
use crate::ui::strings::{strings, SUGGESTIONS};

const HELP: &str = "\
Commands:
  /new                Start a new chat
  /list               List saved chats
  /open <n|id>        Switch to a saved chat
  /delete <n|id>      Delete a saved chat
  /attach <path>      Attach an image to the next message
  /detach             Drop the pending attachment
  /suggest <n>        Send one of the suggested prompts
  /settings           Show your preferences
  /help               Show this help
  /quit               Leave (Ctrl+C at the prompt also quits)
While a reply streams, Ctrl+C stops it and keeps what arrived.";

#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    New,
    List,
    Open(String),
    Delete(String),
    Attach(String),
    Detach,
    Suggest(usize),
    Settings,
    Help,
    Quit,
    Send(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    MissingArgument(&'static str),
    UnknownCommand(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingArgument(usage) => write!(f, "Usage: {usage}"),
            ParseError::UnknownCommand(name) => {
                write!(f, "Unknown command /{name}. Type /help for the list.")
            }
        }
    }
}

/// Lines that start with `/` are commands; `//` escapes a literal slash.
pub fn parse_line(line: &str) -> Result<ReplCommand, ParseError> {
    let trimmed = line.trim();
    if let Some(escaped) = trimmed.strip_prefix("//") {
        return Ok(ReplCommand::Send(format!("/{escaped}")));
    }
    let Some(command) = trimmed.strip_prefix('/') else {
        return Ok(ReplCommand::Send(trimmed.to_string()));
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };
    let argument = |usage: &'static str| {
        if rest.is_empty() {
            Err(ParseError::MissingArgument(usage))
        } else {
            Ok(rest.to_string())
        }
    };

    match name.to_ascii_lowercase().as_str() {
        "new" => Ok(ReplCommand::New),
        "list" | "ls" => Ok(ReplCommand::List),
        "open" => argument("/open <n|id>").map(ReplCommand::Open),
        "delete" | "rm" => argument("/delete <n|id>").map(ReplCommand::Delete),
        "attach" => argument("/attach <path>").map(ReplCommand::Attach),
        "detach" => Ok(ReplCommand::Detach),
        "suggest" => rest
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=SUGGESTIONS.len()).contains(n))
            .map(ReplCommand::Suggest)
            .ok_or(ParseError::MissingArgument("/suggest <1-4>")),
        "settings" => Ok(ReplCommand::Settings),
        "help" | "?" => Ok(ReplCommand::Help),
        "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
        other => Err(ParseError::UnknownCommand(other.to_string())),
    }
}

fn prompt<B: ChatBackend>(controller: &ChatController<B>) -> io::Result<()> {
    let settings = controller.settings();
    let placeholder = render::localized(strings(settings.language).placeholder, settings.language);
    match controller.pending_attachment() {
        Some(attachment) => print!("[{}] {placeholder} ", attachment.mime_type),
        None => print!("{placeholder} "),
    }
    let marker = render::prompt_marker(settings, io::stdout().is_terminal());
    print!("\n{marker}");
    io::stdout().flush()
}

fn open_session<B: ChatBackend>(controller: &mut ChatController<B>, reference: &str) -> bool {
    let Some(id) =
        resolve_session(&controller.sessions(), reference).map(|session| session.id.clone())
    else {
        eprintln!("❌ No chat matches '{reference}'. Type /list to see them.");
        return false;
    };
    controller.select_chat(&id);
    if let Some(session) = controller.active_session() {
        print!("{}", render::transcript(session, controller.settings()));
    }
    true
}

async fn send<B: ChatBackend>(controller: &mut ChatController<B>, text: &str) -> io::Result<()> {
    match controller.submit(text) {
        Ok(turn) => {
            print_turn(controller, turn).await?;
        }
        Err(SubmitError::Empty) => {}
        Err(err @ SubmitError::Busy { .. }) => eprintln!("⚠️  {err}"),
    }
    Ok(())
}

pub async fn run_chat<B: ChatBackend>(
    mut controller: ChatController<B>,
    session: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let opened = match session {
        Some(reference) => open_session(&mut controller, &reference),
        None => false,
    };
    if !opened {
        controller.new_chat();
        println!("{}\n", render::welcome(controller.settings()));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&controller)?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("⚠️  {err}");
                continue;
            }
        };
        match command {
            ReplCommand::Send(text) => send(&mut controller, &text).await?,
            ReplCommand::Suggest(number) => {
                let suggestion = &SUGGESTIONS[number - 1];
                println!("> {}", suggestion.prompt);
                send(&mut controller, suggestion.prompt).await?;
            }
            ReplCommand::New => {
                controller.new_chat();
                println!("{}\n", render::welcome(controller.settings()));
            }
            ReplCommand::List => {
                let listing = render::session_list(
                    &controller.sessions(),
                    controller.active_session_id(),
                    controller.settings(),
                );
                println!("{listing}");
            }
            ReplCommand::Open(reference) => {
                open_session(&mut controller, &reference);
            }
            ReplCommand::Delete(reference) => {
                let target = resolve_session(&controller.sessions(), &reference)
                    .map(|session| (session.id.clone(), session.title.clone()));
                match target {
                    Some((id, title)) => {
                        controller.delete_chat(&id);
                        println!("🗑️  Deleted \"{title}\"");
                    }
                    None => eprintln!("❌ No chat matches '{reference}'. Type /list to see them."),
                }
            }
            ReplCommand::Attach(path) => match Attachment::from_path(&path) {
                Ok(attachment) => {
                    println!(
                        "📎 Attached {path} ({}, {} KB)",
                        attachment.mime_type,
                        attachment.approx_size().div_ceil(1024)
                    );
                    controller.set_attachment(attachment);
                }
                Err(err) => eprintln!("❌ {err}"),
            },
            ReplCommand::Detach => {
                if controller.clear_attachment().is_some() {
                    println!("Attachment removed.");
                }
            }
            ReplCommand::Settings => {
                let settings = controller.settings();
                let text = strings(settings.language);
                println!("{}:", text.settings);
                println!("  user-name: {}", settings.user_name);
                let dark_mode = if settings.is_dark_mode { "on" } else { "off" };
                println!("  dark-mode: {dark_mode}");
                println!("  language: {}", settings.language);
                println!("Change them with 'parley set <key> <value>'.");
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_sent_trimmed() {
        assert_eq!(
            parse_line("  hello there \n"),
            Ok(ReplCommand::Send("hello there".into()))
        );
        assert_eq!(parse_line(""), Ok(ReplCommand::Send(String::new())));
    }

    #[test]
    fn double_slash_escapes_commands() {
        assert_eq!(
            parse_line("//etc/hosts is where?"),
            Ok(ReplCommand::Send("/etc/hosts is where?".into()))
        );
    }

    #[test]
    fn commands_take_arguments() {
        assert_eq!(parse_line("/open 2"), Ok(ReplCommand::Open("2".into())));
        assert_eq!(
            parse_line("/attach ~/Pictures/cat photo.png"),
            Ok(ReplCommand::Attach("~/Pictures/cat photo.png".into()))
        );
        assert_eq!(parse_line("/QUIT"), Ok(ReplCommand::Quit));
        assert_eq!(parse_line("/suggest 4"), Ok(ReplCommand::Suggest(4)));
    }

    #[test]
    fn bad_commands_are_reported() {
        assert_eq!(
            parse_line("/open"),
            Err(ParseError::MissingArgument("/open <n|id>"))
        );
        assert_eq!(
            parse_line("/suggest 9"),
            Err(ParseError::MissingArgument("/suggest <1-4>"))
        );
        assert_eq!(
            parse_line("/frobnicate"),
            Err(ParseError::UnknownCommand("frobnicate".into()))
        );
    }
}
