//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod say;
pub mod sessions;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::settings::SettingsFiles;
use crate::core::app::ChatController;
use crate::core::chat_stream::{GeminiBackend, GeminiSettings};
use crate::core::config::Config;
use crate::core::persistence::LocalStore;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "parley")]
#[command(version = VERSION)]
#[command(about = "A terminal chat client with persistent, multi-session history")]
#[command(
    long_about = "Parley is a line-based terminal chat client. Replies stream in from a hosted \
Gemini-compatible model and every conversation is kept locally, so you can pick any of them \
up again later.\n\n\
Environment Variables:\n\
  GEMINI_API_KEY    API key for the model backend (API_KEY is also consulted)\n\
  RUST_LOG          Log filter, e.g. parley=debug (logs go to stderr)\n\n\
Controls:\n\
  Enter             Send the message\n\
  Ctrl+C            Stop the reply while it streams; quit at the prompt\n\n\
Commands:\n\
  /help             List chat commands"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding settings.json and sessions.json
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Model to use for this run, overriding the configured one
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat (default)
    Chat {
        /// Resume a session by id or list number
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Send one message and print the reply
    Say {
        /// Continue a session by id or list number instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,
        /// Attach an image (png, jpeg, webp, heic, heif)
        #[arg(short, long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// The message to send
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// List saved sessions, most recent first
    Sessions,
    /// Print a session's transcript
    Show {
        /// Session id or list number
        session: String,
    },
    /// Delete a saved session
    Delete {
        /// Session id or list number
        session: String,
    },
    /// Set a setting, or list all settings when no key is given
    Set {
        /// Setting to change
        key: Option<String>,
        /// New value (may be several words)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Restore a setting to its default
    Unset {
        /// Setting to reset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

fn resolve_data_dir(args: &Args, config: &Config) -> Result<PathBuf, Box<dyn Error>> {
    args.data_dir
        .clone()
        .or_else(|| config.data_dir())
        .ok_or_else(|| "Failed to determine a data directory; pass --data-dir".into())
}

fn build_controller(
    config: &Config,
    local: LocalStore,
) -> Result<ChatController<GeminiBackend>, Box<dyn Error>> {
    let client = reqwest::Client::builder().build()?;
    let backend = GeminiBackend::new(client, GeminiSettings::from_config(config));
    tracing::debug!("using model {}", backend.model());
    Ok(ChatController::new(backend, local, config.turn_timeout()))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let config_path = Config::get_config_path()?;
    let mut config = Config::load_from_path(&config_path)?;
    if let Some(model) = args.model.clone() {
        config.model = Some(model);
    }
    let local = LocalStore::new(resolve_data_dir(&args, &config)?);

    match args.command.unwrap_or(Commands::Chat { session: None }) {
        Commands::Chat { session } => {
            let controller = build_controller(&config, local)?;
            chat::run_chat(controller, session).await
        }
        Commands::Say {
            session,
            image,
            prompt,
        } => {
            let controller = build_controller(&config, local)?;
            say::run_say(controller, session, image, prompt).await
        }
        Commands::Sessions => {
            print!("{}", sessions::list_sessions(&local));
            Ok(())
        }
        Commands::Show { session } => match sessions::show_session(&local, &session) {
            Some(transcript) => {
                print!("{transcript}");
                Ok(())
            }
            None => {
                eprintln!("{}", sessions::not_found(&session));
                std::process::exit(1);
            }
        },
        Commands::Delete { session } => match sessions::delete_session(&local, &session)? {
            Some(title) => {
                println!("🗑️  Deleted \"{title}\"");
                Ok(())
            }
            None => {
                eprintln!("{}", sessions::not_found(&session));
                std::process::exit(1);
            }
        },
        Commands::Set { key, value } => {
            let files = SettingsFiles { config_path, local };
            let Some(key) = key else {
                println!("Current settings:");
                for line in files.describe()? {
                    println!("{line}");
                }
                config.print_environment();
                return Ok(());
            };
            match files.set(&key, &value) {
                Ok(message) => {
                    println!("{message}");
                    Ok(())
                }
                Err(err) => {
                    err.print();
                    std::process::exit(1);
                }
            }
        }
        Commands::Unset { key } => {
            let files = SettingsFiles { config_path, local };
            match files.unset(&key) {
                Ok(message) => {
                    println!("{message}");
                    Ok(())
                }
                Err(err) => {
                    err.print();
                    std::process::exit(1);
                }
            }
        }
    }
}
