//! Plain-text presentation layer.
//!
//! [`render`] turns sessions and messages into terminal text and
//! [`strings`] holds the translated interface labels. Nothing here owns
//! state; the chat controller in [`crate::core::app`] does.

pub mod render;
pub mod strings;
