//! Session state types.

use serde::{Deserialize, Serialize};

use crate::ai::ImageReference;

/// User-facing messages for failed steps.
pub mod messages {
    pub const GENERATION_FAILED: &str =
        "Не удалось связаться с сервисом генерации. Попробуйте ещё раз.";
    pub const UNREADABLE_REPLY: &str =
        "Сервис вернул ответ в неожиданном формате. Попробуйте ещё раз.";
    pub const EMPTY_REPLY: &str = "Сервис вернул пустой ответ. Попробуйте уточнить описание.";
    pub const NO_IMAGE: &str = "Не удалось сгенерировать изображение. Попробуйте другой запрос.";
    pub const EMPTY_PROMPT: &str = "Опишите, что нужно сгенерировать.";
    pub const TOO_MANY_ROUNDS: &str =
        "Не удалось завершить документ после всех уточнений. Начните заново с более подробным описанием.";
    pub const CANCELLED: &str = "Запрос отменён.";
}

/// Step of a guided creation session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    /// Session was abandoned
    #[default]
    Idle,
    AwaitingInput,
    /// A request is in flight
    Processing,
    Questioning,
    /// Terminal until reset
    Result,
    /// Last request failed; can be retried
    Failed,
}

/// A clarifying question and the user's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub question: String,
    pub answer: String,
}

impl Clarification {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// Append-only record of clarifications for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    entries: Vec<Clarification>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clarification: Clarification) {
        self.entries.push(clarification);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Clarification> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Clarification] {
        &self.entries
    }

    /// Only an explicit session reset may clear the history.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Extend<Clarification> for History {
    fn extend<I: IntoIterator<Item = Clarification>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Clarification;
    type IntoIter = std::slice::Iter<'a, Clarification>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Final output of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Artifact {
    Document(String),
    Image(ImageReference),
    Plan(serde_json::Value),
}

impl Artifact {
    /// Text rendering for terminals and logs.
    pub fn render(&self) -> String {
        match self {
            Self::Document(text) => text.clone(),
            Self::Image(image) => format!("[image {}]", image.image.mime_type),
            Self::Plan(plan) => {
                serde_json::to_string_pretty(plan).unwrap_or_else(|_| plan.to_string())
            }
        }
    }
}

/// Normalized outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationResult {
    Complete { artifact: Artifact },
    NeedsInfo { questions: Vec<String> },
    Failed { message: String },
}

impl GenerationResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
