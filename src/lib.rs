//! # X5 OS
//!
//! Guided AI generation workflows: contracts, design briefs, social-media
//! plans, presentations, photos and videos.
//!
//! Every hard computation is delegated to an external generative API. This
//! crate owns the parts around it: the step state machine that decides when to
//! ask clarifying questions and when to emit a final artifact, the prompt
//! templates, and the gateway that turns API failures into values the user
//! can act on.
//!
//! ## Features
//!
//! - **Guided sessions**: question/answer rounds with an append-only history
//! - **Single gateway**: text, schema-constrained JSON, image and video calls
//! - **Bounded video polling**: cancellable, with an explicit attempt limit
//! - **Photo gallery**: in-memory, append-only, with likes
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//!
//! # Draft a contract
//! x5os flow contract:services --description "Видео-монтаж, оплата 5000р за ролик"
//!
//! # Generate a photo
//! x5os image "кофейня на рассвете" --style cinematic --aspect 16:9
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::future_not_send)]
#![allow(clippy::use_self)]

pub mod ai;
pub mod core;
pub mod studio;
pub mod workflow;

pub use ai::{
    AspectRatio, Gateway, GatewayError, GeminiBackend, GenerativeBackend, ImageOutcome,
    ImageRequest, StyleMode, Tier, VideoRequest,
};
pub use core::{CancelToken, Config};
pub use studio::{Gallery, GeneratedArtifact, PhotoOutcome, PhotoRequest, PhotoStudio};
pub use workflow::{
    Artifact, Category, Clarification, Driver, GenerationResult, GuidedSession, History,
    WorkflowStep,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "x5os";
