#![warn(clippy::pedantic)]
//! Minimal client for the Ollama chat API.
//!
//! Only non-streaming `POST /api/chat` and `GET /api/version` are used.

pub mod client;
pub mod error;
pub mod types;

pub use client::OllamaClient;
pub use error::OllamaError;
pub use types::*;
