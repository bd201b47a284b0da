//! Gemini completion client used by the shopping assistant chat.

mod client;
mod error;
mod types;

pub use client::GeminiClient;
pub use error::GeminiError;
pub use types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};
