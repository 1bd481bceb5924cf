//! The generation gateway.
//!
//! Every request to the generative API goes through [`Gateway`]. It picks the
//! model, shapes the call, and turns failures into values the caller can show:
//! a fallback string, `None`, or [`ImageOutcome::Failed`]. Only video
//! generation returns a `Result`, because the caller must be able to tell a
//! timeout from a cancellation.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    parse_structured, AspectRatio, GatewayError, GenerateCall, GenerativeBackend, ImageReference,
    InlineImage, OutputKind, StyleMode, Tier, VideoCall, VideoReference, VideoStatus,
};
use crate::core::{CancelToken, GatewayConfig};
use crate::workflow::messages;
use crate::workflow::prompts::build_image_prompt;

/// Image generation parameters.
#[derive(Debug, Clone, Default)]
pub struct ImageRequest {
    pub prompt: String,
    pub style: StyleMode,
    pub aspect_ratio: AspectRatio,
    pub references: Vec<InlineImage>,
    pub tier: Tier,
}

/// Outcome of an image request.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Ready(ImageReference),
    Failed { message: String },
}

/// Video generation parameters.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    /// First frame
    pub source: InlineImage,
    pub prompt: String,
    /// Optional last frame
    pub end_frame: Option<InlineImage>,
}

/// Stateless front of a [`GenerativeBackend`].
pub struct Gateway<B: GenerativeBackend> {
    backend: B,
    config: GatewayConfig,
    output_dir: PathBuf,
}

impl<B: GenerativeBackend> Gateway<B> {
    pub fn new(backend: B, config: GatewayConfig) -> Self {
        Self { backend, config, output_dir: std::env::temp_dir().join("x5os") }
    }

    /// Directory where finished videos are written.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn text_call(&self, prompt: &str, output: OutputKind) -> GenerateCall {
        GenerateCall {
            model: self.config.text_model.clone(),
            prompt: prompt.to_string(),
            images: Vec::new(),
            output,
        }
    }

    /// Plain text, with failures reported to the caller.
    pub async fn try_text(&self, prompt: &str) -> Result<String, GatewayError> {
        let reply = self.backend.generate(self.text_call(prompt, OutputKind::Text)).await?;
        let text = reply.joined_text().trim().to_string();
        if text.is_empty() {
            return Err(GatewayError::EmptyResult("no text in reply".to_string()));
        }
        Ok(text)
    }

    /// Plain text, or `fallback` if the request fails.
    pub async fn request_text(&self, prompt: &str, fallback: &str) -> String {
        match self.try_text(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Text request failed");
                fallback.to_string()
            }
        }
    }

    /// Schema-constrained JSON.
    ///
    /// Transport failures are errors; an unparseable reply is `Ok(None)`.
    pub async fn try_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        shape: &Value,
    ) -> Result<Option<T>, GatewayError> {
        let reply =
            self.backend.generate(self.text_call(prompt, OutputKind::Json(shape.clone()))).await?;
        let parsed = parse_structured(&reply.joined_text());
        if parsed.is_none() {
            tracing::warn!(backend = self.backend.name(), "Structured reply did not match shape");
        }
        Ok(parsed)
    }

    /// Schema-constrained JSON, or `None` on any failure.
    pub async fn request_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        shape: &Value,
    ) -> Option<T> {
        match self.try_structured(prompt, shape).await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Structured request failed");
                None
            }
        }
    }

    /// Generate an image in the requested style.
    pub async fn request_image(&self, request: &ImageRequest) -> ImageOutcome {
        let call = GenerateCall {
            model: self.config.image_model_for(request.tier).to_string(),
            prompt: build_image_prompt(request.style, &request.prompt),
            images: request.references.clone(),
            output: OutputKind::Image(request.aspect_ratio),
        };

        tracing::debug!(
            model = %call.model,
            style = request.style.id(),
            references = call.images.len(),
            "Image request"
        );
        match self.backend.generate(call).await {
            Ok(reply) => match reply.first_image() {
                Some(image) => ImageOutcome::Ready(ImageReference { image: image.clone() }),
                None => {
                    tracing::warn!(text = %reply.joined_text(), "Reply carried no image part");
                    ImageOutcome::Failed { message: messages::NO_IMAGE.to_string() }
                }
            },
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Image request failed");
                ImageOutcome::Failed { message: messages::NO_IMAGE.to_string() }
            }
        }
    }

    /// Generate a video from a still, polling until the job finishes.
    ///
    /// Polls every `poll_interval` up to `max_poll_attempts` times, then gives
    /// up with [`GatewayError::Timeout`]. Returns [`GatewayError::Cancelled`]
    /// as soon as `cancel` fires.
    pub async fn request_video(
        &self,
        request: &VideoRequest,
        cancel: &CancelToken,
    ) -> Result<VideoReference, GatewayError> {
        let call = VideoCall {
            model: self.config.video_model.clone(),
            prompt: request.prompt.trim().to_string(),
            image: request.source.clone(),
            last_frame: request.end_frame.clone(),
        };
        let job = cancel.run(self.backend.start_video(call)).await.ok_or(GatewayError::Cancelled)??;
        tracing::info!(job = %job.name, "Video job started");

        let interval = self.config.poll_interval();
        let max_attempts = self.config.max_poll_attempts.max(1);

        for attempt in 1..=max_attempts {
            cancel.run(tokio::time::sleep(interval)).await.ok_or(GatewayError::Cancelled)?;
            let status =
                cancel.run(self.backend.poll_video(&job)).await.ok_or(GatewayError::Cancelled)??;

            match status {
                VideoStatus::Pending => {
                    tracing::debug!(job = %job.name, attempt, "Video job still running");
                }
                VideoStatus::Done { uri } => {
                    let bytes =
                        cancel.run(self.backend.download(&uri)).await.ok_or(GatewayError::Cancelled)??;
                    if bytes.is_empty() {
                        return Err(GatewayError::EmptyResult("video download was empty".to_string()));
                    }
                    return self.store_video(&bytes).await;
                }
                VideoStatus::Failed { message } => return Err(GatewayError::JobFailed(message)),
            }
        }

        Err(GatewayError::Timeout { attempts: max_attempts })
    }

    async fn store_video(&self, bytes: &[u8]) -> Result<VideoReference, GatewayError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("video-{}.mp4", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(path = %path.display(), "Video saved");
        Ok(VideoReference { path })
    }
}
