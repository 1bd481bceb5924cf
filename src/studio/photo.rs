//! AI photo screen logic.

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use super::gallery::{Gallery, GeneratedArtifact};
use crate::ai::{
    AspectRatio, Gateway, GenerativeBackend, ImageOutcome, ImageRequest, InlineImage, StyleMode,
    Tier,
};
use crate::workflow::messages;

/// What the user asked the photo screen for.
#[derive(Debug, Clone, Default)]
pub struct PhotoRequest {
    pub prompt: String,
    pub style: StyleMode,
    pub aspect_ratio: AspectRatio,
    pub references: Vec<InlineImage>,
}

/// Outcome of a photo generation.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoOutcome {
    /// Generated and appended to the gallery
    Added(GeneratedArtifact),
    /// Nothing was appended
    Failed { message: String },
}

/// Generates photos and keeps them in a shared gallery.
pub struct PhotoStudio<'a, B: GenerativeBackend> {
    gateway: &'a Gateway<B>,
    tier: Tier,
    gallery: Arc<RwLock<Gallery>>,
}

impl<'a, B: GenerativeBackend> PhotoStudio<'a, B> {
    pub fn new(gateway: &'a Gateway<B>, tier: Tier) -> Self {
        Self { gateway, tier, gallery: Arc::default() }
    }

    /// Use a gallery shared with other screens.
    pub fn with_gallery(mut self, gallery: Arc<RwLock<Gallery>>) -> Self {
        self.gallery = gallery;
        self
    }

    pub fn gallery(&self) -> Arc<RwLock<Gallery>> {
        Arc::clone(&self.gallery)
    }

    /// Generate an image; only a successful result is added to the gallery.
    pub async fn generate(&self, request: PhotoRequest) -> PhotoOutcome {
        if request.prompt.trim().is_empty() && request.references.is_empty() {
            return PhotoOutcome::Failed { message: messages::EMPTY_PROMPT.to_string() };
        }

        let image = ImageRequest {
            prompt: request.prompt.clone(),
            style: request.style,
            aspect_ratio: request.aspect_ratio,
            references: request.references,
            tier: self.tier,
        };
        match self.gateway.request_image(&image).await {
            ImageOutcome::Ready(reference) => {
                let artifact = GeneratedArtifact::new(
                    reference,
                    request.prompt.trim(),
                    request.style,
                    request.aspect_ratio,
                );
                self.gallery.write().push(artifact.clone());
                tracing::info!(id = %artifact.id, style = request.style.id(), "Photo added to gallery");
                PhotoOutcome::Added(artifact)
            }
            ImageOutcome::Failed { message } => PhotoOutcome::Failed { message },
        }
    }

    /// Flip the like flag of a gallery item.
    pub fn toggle_like(&self, id: Uuid) -> Option<bool> {
        self.gallery.write().toggle_like(id)
    }
}
