pub mod app;
pub mod backend;
pub mod chat_stream;
pub mod config;
pub mod events;
pub mod ids;
pub mod message;
pub mod persistence;
pub mod reconciler;
pub mod session;
pub mod settings;
