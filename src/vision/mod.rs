//! Vision query pipeline
//!
//! - `image`: load, validate and Base64-encode the input image
//! - `models`: chat-completions request/response types
//! - `client`: HTTP client for the chat-completions endpoint
//! - `processor`: runs one query against every configured model

pub mod client;
pub mod image;
pub mod models;
pub mod processor;

pub use client::ChatClient;
pub use self::image::EncodedImage;
pub use models::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart, ImageUrl,
    ModelAnswers, ModelResponse, VisionModel,
};
pub use processor::ImageQueryProcessor;
