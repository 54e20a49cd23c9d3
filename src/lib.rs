//! Ask vision-language models about a local image.
//!
//! An image is validated, Base64-encoded and sent with a text query to an
//! OpenAI-compatible chat-completions endpoint once per configured model.
//! Answers come back keyed by model, or not at all.

pub mod config;
pub mod error;
pub mod metrics;
pub mod vision;

pub use config::Settings;
pub use error::{ConfigError, ProcessError, Result};
pub use vision::{ImageQueryProcessor, ModelAnswers, VisionModel};
