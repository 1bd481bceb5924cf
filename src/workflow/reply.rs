//! Wire shapes of structured model replies.
//!
//! The model answers with loosely typed JSON (`{status, contract?, questions?}`).
//! These types validate it into tagged variants on deserialization, so a reply
//! carrying both an artifact and questions cannot reach the session.

use serde::Deserialize;
use serde_json::Value;

use super::state::Artifact;

/// A batch of clarifying questions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "QuestionsWire")]
pub struct QuestionBatch {
    pub questions: Vec<String>,
}

#[derive(Deserialize)]
struct QuestionsWire {
    #[serde(default)]
    questions: Vec<String>,
}

impl From<QuestionsWire> for QuestionBatch {
    fn from(wire: QuestionsWire) -> Self {
        Self { questions: clean_questions(wire.questions) }
    }
}

fn clean_questions(questions: Vec<String>) -> Vec<String> {
    questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

/// Reply to a draft request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "DraftWire")]
pub enum DraftReply {
    Complete(Artifact),
    NeedsInfo(Vec<String>),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum DraftStatus {
    Complete,
    NeedsInfo,
}

#[derive(Deserialize)]
struct DraftWire {
    status: DraftStatus,
    #[serde(default, alias = "document", alias = "brief")]
    contract: Option<String>,
    #[serde(default)]
    plan: Option<Value>,
    #[serde(default)]
    questions: Vec<String>,
}

impl TryFrom<DraftWire> for DraftReply {
    type Error = String;

    fn try_from(wire: DraftWire) -> Result<Self, Self::Error> {
        match wire.status {
            DraftStatus::Complete => {
                if let Some(plan) = wire.plan.filter(|plan| !plan.is_null()) {
                    return Ok(Self::Complete(Artifact::Plan(plan)));
                }
                match wire.contract.map(|text| text.trim().to_string()) {
                    Some(text) if !text.is_empty() => Ok(Self::Complete(Artifact::Document(text))),
                    _ => Err("complete reply without an artifact".to_string()),
                }
            }
            DraftStatus::NeedsInfo => {
                let questions = clean_questions(wire.questions);
                if questions.is_empty() {
                    Err("needs_info reply without questions".to_string())
                } else {
                    Ok(Self::NeedsInfo(questions))
                }
            }
        }
    }
}
