//! One-shot "say" command, plus the streaming printer the chat loop shares.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::sync::broadcast::error::RecvError;

use crate::cli::sessions::{not_found, resolve_session};
use crate::core::app::{ChatController, PendingTurn};
use crate::core::backend::ChatBackend;
use crate::core::events::ChatEvent;
use crate::core::message::Attachment;
use crate::core::reconciler::TurnOutcome;
use crate::ui::render::ASSISTANT_NAME;

/// Drives `turn` to completion, echoing fragments to stdout as they land.
/// Ctrl+C stops the reply and keeps what already arrived.
pub async fn print_turn<B: ChatBackend>(
    controller: &mut ChatController<B>,
    turn: PendingTurn,
) -> io::Result<TurnOutcome> {
    let mut events = controller.subscribe();
    let cancel_token = turn.cancel_token();
    let session_id = turn.session_id.clone();
    let placeholder_id = turn.placeholder_id.clone();
    let mut printed = String::new();
    let mut stdout = io::stdout();

    print!("{ASSISTANT_NAME}: ");
    stdout.flush()?;

    let outcome = {
        let drive = controller.drive_turn(turn);
        tokio::pin!(drive);
        loop {
            tokio::select! {
                outcome = &mut drive => break outcome,
                event = events.recv() => match event {
                    Ok(ChatEvent::FragmentApplied { message_id, fragment, .. })
                        if message_id == placeholder_id =>
                    {
                        print!("{fragment}");
                        stdout.flush()?;
                        printed.push_str(&fragment);
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("display fell {skipped} events behind");
                    }
                    Err(RecvError::Closed) => {}
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("stop requested for session {session_id}");
                    cancel_token.cancel();
                }
            }
        }
    };

    // Fragments still queued on the bus when the turn settled
    while let Ok(event) = events.try_recv() {
        if let ChatEvent::FragmentApplied {
            message_id,
            fragment,
            ..
        } = event
        {
            if message_id == placeholder_id {
                print!("{fragment}");
                printed.push_str(&fragment);
            }
        }
    }

    // Failure and stop text is written by the reconciler, not streamed.
    let final_content = controller
        .session(&session_id)
        .and_then(|session| session.messages.iter().find(|m| m.id == placeholder_id))
        .map(|message| message.content.clone())
        .unwrap_or_default();
    match final_content.strip_prefix(printed.as_str()) {
        Some(rest) => print!("{rest}"),
        None => print!("\n{final_content}"),
    }
    println!();
    stdout.flush()?;
    Ok(outcome)
}

pub async fn run_say<B: ChatBackend>(
    mut controller: ChatController<B>,
    session: Option<String>,
    image: Option<PathBuf>,
    prompt: Vec<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() && image.is_none() {
        eprintln!("Usage: parley say [--image PATH] <prompt>");
        std::process::exit(1);
    }

    match session {
        Some(reference) => {
            let session_id = resolve_session(&controller.sessions(), &reference)
                .map(|session| session.id.clone());
            match session_id {
                Some(id) => {
                    controller.select_chat(&id);
                }
                None => {
                    eprintln!("{}", not_found(&reference));
                    std::process::exit(1);
                }
            }
        }
        None => controller.new_chat(),
    }

    if let Some(path) = image {
        controller.set_attachment(Attachment::from_path(path)?);
    }

    let turn = controller.submit(&prompt)?;
    let outcome = print_turn(&mut controller, turn).await?;
    if outcome == TurnOutcome::Failed {
        std::process::exit(1);
    }
    Ok(())
}
