//! Photo studio and its session gallery.

mod gallery;
mod photo;

pub use gallery::{Gallery, GeneratedArtifact};
pub use photo::{PhotoOutcome, PhotoRequest, PhotoStudio};
