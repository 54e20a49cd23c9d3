//! Data models for the chat-completions vision API

use crate::error::{ProcessError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::image::EncodedImage;

/// Answers keyed by model key, in model order
pub type ModelAnswers = IndexMap<String, String>;

/// A backend model and the key its answer is reported under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisionModel {
    /// Result key, e.g. `llama_11b`
    pub key: String,
    /// Model identifier sent to the API
    pub id: String,
}

impl VisionModel {
    pub fn new(key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
        }
    }

    /// The two Llama 3.2 vision sizes queried by default
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("llama_11b", "llama-3.2-11b-vision-preview"),
            Self::new("llama_90b", "llama-3.2-90b-vision-preview"),
        ]
    }
}

/// Outbound chat completion payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
        }
    }
}

/// One chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl ChatMessage {
    /// A user turn carrying the query text followed by the image
    pub fn user_with_image(query: &str, image: &EncodedImage) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text {
                    text: query.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url(),
                    },
                },
            ],
        }
    }
}

/// Content part of a multimodal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Inbound chat completion body (only the fields we read)
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    pub content: String,
}

/// Raw outcome of one model call, inspected after all calls complete
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub model: String,
    pub status: u16,
    pub body: String,
}

impl ModelResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Extract `choices[0].message.content` from the body
    pub fn answer(&self) -> Result<String> {
        let parsed: ChatCompletionResponse = serde_json::from_str(&self.body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProcessError::Decode(format!("{} returned no choices", self.model)))
    }
}
