//! Generative API integration.
//!
//! Everything that talks to the external generation service lives here:
//!
//! - [`GenerativeBackend`] - the raw API boundary (text, JSON, image, video jobs)
//! - [`GeminiBackend`] - the HTTP implementation of that boundary
//! - [`Gateway`] - the single choke point the rest of the crate calls, which
//!   normalizes failures into fallbacks, `None`, or user-facing messages

mod gateway;
mod gemini;
mod media;
mod parse;

pub use gateway::{Gateway, ImageOutcome, ImageRequest, VideoRequest};
pub use gemini::GeminiBackend;
pub use media::{AspectRatio, ImageReference, InlineImage, StyleMode, VideoReference};
pub use parse::{parse_structured, strip_code_fences};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Subscription tier of the signed-in user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

/// What kind of output a [`GenerateCall`] asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputKind {
    /// Free-form text
    Text,
    /// JSON constrained by the given schema
    Json(serde_json::Value),
    /// An image in the given aspect ratio
    Image(AspectRatio),
}

/// One call to the generation endpoint.
#[derive(Debug, Clone)]
pub struct GenerateCall {
    /// Model identifier
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Inline images attached after the prompt
    pub images: Vec<InlineImage>,
    /// Requested output
    pub output: OutputKind,
}

/// A single part of a backend reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPart {
    Text(String),
    Image(InlineImage),
}

/// Reply of the generation endpoint, flattened to its parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendReply {
    pub parts: Vec<ReplyPart>,
}

impl BackendReply {
    /// Reply consisting of a single text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self { parts: vec![ReplyPart::Text(text.into())] }
    }

    /// All text parts joined together.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ReplyPart::Text(text) => Some(text.as_str()),
                ReplyPart::Image(_) => None,
            })
            .collect()
    }

    /// First image-bearing part, if any.
    pub fn first_image(&self) -> Option<&InlineImage> {
        self.parts.iter().find_map(|part| match part {
            ReplyPart::Image(image) => Some(image),
            ReplyPart::Text(_) => None,
        })
    }
}

/// Parameters for starting a video job.
#[derive(Debug, Clone)]
pub struct VideoCall {
    pub model: String,
    pub prompt: String,
    /// First frame
    pub image: InlineImage,
    /// Optional last frame
    pub last_frame: Option<InlineImage>,
}

/// Handle to a long-running video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoJob {
    pub name: String,
}

/// Status of a video job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoStatus {
    /// Still running
    Pending,
    /// Finished; the media can be fetched from `uri`
    Done { uri: String },
    /// The service gave up on the job
    Failed { message: String },
}

/// The external generation API.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Run a synchronous generation call.
    async fn generate(&self, call: GenerateCall) -> Result<BackendReply, GatewayError>;

    /// Submit a video job.
    async fn start_video(&self, call: VideoCall) -> Result<VideoJob, GatewayError>;

    /// Check on a video job.
    async fn poll_video(&self, job: &VideoJob) -> Result<VideoStatus, GatewayError>;

    /// Fetch finished media.
    async fn download(&self, uri: &str) -> Result<Vec<u8>, GatewayError>;

    /// Get the backend name.
    fn name(&self) -> &str;
}

/// Gateway error types.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Video job failed: {0}")]
    JobFailed(String),

    #[error("Video job still running after {attempts} polls")]
    Timeout { attempts: u32 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Missing credentials: set {0}")]
    MissingCredentials(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
