//! Guided creation workflows.
//!
//! Drives the contract, design-brief, social-media plan, presentation and
//! photo flows through a fixed set of steps.
//!
//! ## Pieces
//!
//! - `Category` - what a session produces and whether it asks questions first
//! - `prompts` - deterministic prompt templates and response schemas
//! - `GuidedSession` - the step state machine, free of I/O
//! - `Driver` - sends a session's tickets through the gateway
//!
//! ## Steps
//!
//! `AwaitingInput` -> `Processing` -> `Questioning` <-> `Processing` -> `Result`.
//! A failed request lands in `Failed`, from which the same request can be
//! retried. `reset` returns any session to `AwaitingInput`.

mod category;
mod driver;
pub mod prompts;
mod reply;
mod session;
mod state;

pub use category::{Category, ContractKind, DesignKind, FlowMode, PhotoMode};
pub use driver::Driver;
pub use prompts::GenerationRequest;
pub use reply::{DraftReply, QuestionBatch};
pub use session::{GuidedSession, Ticket, TicketKind};
pub use state::{messages, Artifact, Clarification, GenerationResult, History, WorkflowStep};
