//! Parley is a terminal chat client that keeps a local, multi-session history
//! and streams replies from a hosted language model.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns sessions, the per-turn streaming state machine, the model
//!   backend adapter, local persistence, and configuration.
//! - [`ui`] renders sessions and transcripts as plain text and holds the
//!   translated interface strings.
//! - [`cli`] parses arguments and runs the interactive chat loop and the
//!   headless commands.
//! - [`api`] defines the Gemini request/response payloads.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which builds a [`core::app::ChatController`]
//! for the chosen command.

pub mod api;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
