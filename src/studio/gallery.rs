//! In-memory gallery of generated images.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::{AspectRatio, ImageReference, StyleMode};

/// A generated image with the settings that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub id: Uuid,
    pub reference: ImageReference,
    /// Prompt as typed by the user, without the style prefix
    pub prompt: String,
    pub style: StyleMode,
    pub aspect_ratio: AspectRatio,
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

impl GeneratedArtifact {
    pub fn new(
        reference: ImageReference,
        prompt: impl Into<String>,
        style: StyleMode,
        aspect_ratio: AspectRatio,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference,
            prompt: prompt.into(),
            style,
            aspect_ratio,
            liked: false,
            created_at: Utc::now(),
        }
    }
}

/// Append-only list of generated images for one session.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    items: Vec<GeneratedArtifact>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, artifact: GeneratedArtifact) {
        self.items.push(artifact);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&GeneratedArtifact> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Items in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        self.items.iter()
    }

    /// Newest first, as the gallery screen shows them.
    pub fn recent(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        self.items.iter().rev()
    }

    pub fn liked(&self) -> impl Iterator<Item = &GeneratedArtifact> {
        self.items.iter().filter(|item| item.liked)
    }

    /// Flip the like flag. Returns the new value, or `None` for an unknown id.
    pub fn toggle_like(&mut self, id: Uuid) -> Option<bool> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.liked = !item.liked;
        Some(item.liked)
    }
}
