//! Ask every configured vision model the same question about one image

use super::client::ChatClient;
use super::image::EncodedImage;
use super::models::{ChatCompletionRequest, ChatMessage, ModelAnswers, ModelResponse, VisionModel};
use crate::config::Settings;
use crate::error::{ProcessError, Result};
use std::path::Path;
use tracing::{error, info, instrument};

/// Sends an image plus a query to each model and collects the answers
pub struct ImageQueryProcessor {
    client: ChatClient,
    models: Vec<VisionModel>,
    max_tokens: u32,
}

impl ImageQueryProcessor {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(settings)?,
            models: settings.models.clone(),
            max_tokens: settings.max_tokens,
        })
    }

    /// Answer `query` about the image at `image_path` with every model.
    ///
    /// All requests are sent one after another before any response is
    /// inspected. Responses are then checked in model order and the first
    /// non-200 status ends the call. Answers are only returned when every
    /// model succeeded.
    #[instrument(skip(self, image_path, query), fields(image = %image_path.as_ref().display()))]
    pub async fn process(&self, image_path: impl AsRef<Path>, query: &str) -> Result<ModelAnswers> {
        let result = self.run(image_path.as_ref(), query).await;

        if let Err(e) = &result {
            match e {
                ProcessError::Api { model, status, body } => {
                    error!(model = %model, status, body = %body, "Error from {} API: {} - {}", model, status, body);
                }
                ProcessError::InvalidImage(_) => error!("{}", e),
                _ => error!(error = %e, "{}", e),
            }
        }

        result
    }

    async fn run(&self, image_path: &Path, query: &str) -> Result<ModelAnswers> {
        let image = EncodedImage::load(image_path).await?;
        let message = ChatMessage::user_with_image(query, &image);

        let mut responses: Vec<(&VisionModel, ModelResponse)> = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let request = ChatCompletionRequest::new(&model.id, vec![message.clone()], self.max_tokens);
            responses.push((model, self.client.send(&request).await?));
        }

        collect_answers(responses)
    }
}

fn collect_answers(responses: Vec<(&VisionModel, ModelResponse)>) -> Result<ModelAnswers> {
    let mut answers = ModelAnswers::with_capacity(responses.len());

    for (model, response) in responses {
        if !response.is_success() {
            return Err(ProcessError::Api {
                model: model.key.clone(),
                status: response.status,
                body: response.body,
            });
        }

        let answer = response.answer()?;
        info!(model = %model.key, "Processed response from {} API: {}", model.key, answer);
        answers.insert(model.key.clone(), answer);
    }

    Ok(answers)
}
