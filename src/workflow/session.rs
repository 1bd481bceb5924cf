//! Guided creation session state machine.
//!
//! The session never performs I/O. User actions return a [`Ticket`] naming the
//! one request to send; the reply comes back through [`GuidedSession::apply`].
//! While a ticket is outstanding the session is `Processing` and every other
//! submit is a no-op, which is what keeps requests strictly sequential.

use super::category::{Category, FlowMode};
use super::prompts::GenerationRequest;
use super::state::{messages, Artifact, Clarification, GenerationResult, History, WorkflowStep};
use crate::ai::InlineImage;
use crate::core::WorkflowConfig;

/// Which request a ticket stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    /// Straight to the artifact
    Direct,
    /// First batch of clarifying questions
    Questions,
    /// Draft with the full history
    Draft { final_round: bool },
}

/// A request the session wants sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket {
    seq: u64,
    pub kind: TicketKind,
    pub request: GenerationRequest,
}

impl Ticket {
    /// Sequence number tying the reply to this ticket.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// One artifact-creation session.
#[derive(Debug, Clone)]
pub struct GuidedSession {
    category: Category,
    mode: FlowMode,
    options: WorkflowConfig,
    step: WorkflowStep,
    description: String,
    media: Vec<InlineImage>,
    history: History,
    questions: Vec<String>,
    rounds: usize,
    outcome: Option<GenerationResult>,
    in_flight: Option<u64>,
    last_ticket: Option<Ticket>,
    seq: u64,
}

impl GuidedSession {
    /// Start a session in `AwaitingInput` with default options.
    pub fn new(category: Category) -> Self {
        Self {
            category,
            mode: category.flow_mode(),
            options: WorkflowConfig::default(),
            step: WorkflowStep::AwaitingInput,
            description: String::new(),
            media: Vec::new(),
            history: History::new(),
            questions: Vec::new(),
            rounds: 0,
            outcome: None,
            in_flight: None,
            last_ticket: None,
            seq: 0,
        }
    }

    pub fn with_options(mut self, options: WorkflowConfig) -> Self {
        self.options = options;
        self
    }

    /// Override the category's default flow mode.
    pub fn with_mode(mut self, mode: FlowMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach reference images sent with every request.
    pub fn with_media(mut self, media: Vec<InlineImage>) -> Self {
        self.media = media;
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    pub fn step(&self) -> WorkflowStep {
        self.step
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// The question batch awaiting answers.
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Completed clarification rounds.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn outcome(&self) -> Option<&GenerationResult> {
        self.outcome.as_ref()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match &self.outcome {
            Some(GenerationResult::Complete { artifact }) => Some(artifact),
            _ => None,
        }
    }

    /// Message of the last failure, while in `Failed`.
    pub fn failure(&self) -> Option<&str> {
        match &self.outcome {
            Some(GenerationResult::Failed { message }) => Some(message),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.step == WorkflowStep::Processing
    }

    /// Submit the initial description.
    ///
    /// Returns `None` unless the session is awaiting input and the text is
    /// non-blank.
    pub fn submit_description(&mut self, text: &str) -> Option<Ticket> {
        if self.step != WorkflowStep::AwaitingInput || text.trim().is_empty() {
            return None;
        }
        self.description = text.trim().to_string();

        let kind = match self.mode {
            FlowMode::Direct => TicketKind::Direct,
            FlowMode::Guided => TicketKind::Questions,
        };
        Some(self.issue(kind))
    }

    /// Answer the current question batch.
    ///
    /// Every question is recorded; missing or blank answers become the
    /// configured placeholder.
    pub fn submit_answers<S: AsRef<str>>(&mut self, answers: &[S]) -> Option<Ticket> {
        if self.step != WorkflowStep::Questioning {
            return None;
        }

        let batch = std::mem::take(&mut self.questions);
        self.history.extend(batch.into_iter().enumerate().map(|(index, question)| {
            let answer = answers
                .get(index)
                .map(|a| a.as_ref().trim())
                .filter(|a| !a.is_empty())
                .unwrap_or(self.options.not_specified.as_str());
            Clarification::new(question, answer)
        }));
        self.rounds += 1;

        let final_round = self.rounds >= self.options.max_rounds;
        Some(self.issue(TicketKind::Draft { final_round }))
    }

    /// Re-send the request that failed.
    pub fn retry(&mut self) -> Option<Ticket> {
        if self.step != WorkflowStep::Failed {
            return None;
        }
        let last = self.last_ticket.clone()?;
        self.seq += 1;
        let ticket = Ticket { seq: self.seq, ..last };
        self.begin(&ticket);
        Some(ticket)
    }

    /// Apply the reply for `ticket`.
    ///
    /// Replies for stale tickets (after a reset, abandon, or retry) are
    /// dropped and `false` is returned.
    pub fn apply(&mut self, ticket: &Ticket, result: GenerationResult) -> bool {
        if self.step != WorkflowStep::Processing || self.in_flight != Some(ticket.seq) {
            tracing::debug!(seq = ticket.seq, "Dropping stale reply");
            return false;
        }
        self.in_flight = None;

        match result {
            GenerationResult::Complete { artifact } => {
                self.finish(GenerationResult::Complete { artifact });
            }
            GenerationResult::NeedsInfo { questions } => match ticket.kind {
                TicketKind::Draft { final_round: true } => {
                    self.fail(messages::TOO_MANY_ROUNDS.to_string());
                }
                TicketKind::Direct => {
                    self.fail(messages::UNREADABLE_REPLY.to_string());
                }
                TicketKind::Questions | TicketKind::Draft { final_round: false } => {
                    tracing::info!(
                        category = %self.category,
                        count = questions.len(),
                        "Session waiting for answers"
                    );
                    self.questions = questions;
                    self.step = WorkflowStep::Questioning;
                }
            },
            GenerationResult::Failed { message } => self.fail(message),
        }
        true
    }

    /// Start over: back to `AwaitingInput` with empty history and no artifact.
    pub fn reset(&mut self) {
        self.clear();
        self.step = WorkflowStep::AwaitingInput;
    }

    /// Leave the flow. Any in-flight reply will be discarded.
    pub fn abandon(&mut self) {
        self.clear();
        self.step = WorkflowStep::Idle;
    }

    fn clear(&mut self) {
        self.description.clear();
        self.history.clear();
        self.questions.clear();
        self.rounds = 0;
        self.outcome = None;
        self.in_flight = None;
        self.last_ticket = None;
    }

    fn issue(&mut self, kind: TicketKind) -> Ticket {
        self.seq += 1;
        let ticket = Ticket {
            seq: self.seq,
            kind,
            request: GenerationRequest {
                description: self.description.clone(),
                category: self.category,
                history: self.history.clone(),
                media: self.media.clone(),
            },
        };
        self.begin(&ticket);
        ticket
    }

    fn begin(&mut self, ticket: &Ticket) {
        self.outcome = None;
        self.in_flight = Some(ticket.seq);
        self.last_ticket = Some(ticket.clone());
        self.step = WorkflowStep::Processing;
    }

    fn finish(&mut self, result: GenerationResult) {
        tracing::info!(category = %self.category, rounds = self.rounds, "Session complete");
        self.outcome = Some(result);
        self.step = WorkflowStep::Result;
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(category = %self.category, %message, "Session request failed");
        if self.options.failure_as_result {
            self.finish(GenerationResult::Complete { artifact: Artifact::Document(message) });
        } else {
            self.outcome = Some(GenerationResult::Failed { message });
            self.step = WorkflowStep::Failed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::category::{ContractKind, DesignKind};

    fn design() -> GuidedSession {
        GuidedSession::new(Category::Design { kind: DesignKind::Logo })
    }

    fn ask(session: &mut GuidedSession, ticket: &Ticket, questions: &[&str]) {
        let questions = questions.iter().map(|q| (*q).to_string()).collect();
        assert!(session.apply(ticket, GenerationResult::NeedsInfo { questions }));
    }

    #[test]
    fn test_blank_description_is_ignored() {
        let mut session = design();
        assert!(session.submit_description("").is_none());
        assert!(session.submit_description("   \n\t").is_none());
        assert_eq!(session.step(), WorkflowStep::AwaitingInput);
    }

    #[test]
    fn test_direct_flow_goes_straight_to_result() {
        let mut session = GuidedSession::new(Category::Contract { kind: ContractKind::Services });
        let ticket = session.submit_description("Видео-монтаж, оплата 5000р за ролик").unwrap();
        assert_eq!(ticket.kind, TicketKind::Direct);
        assert_eq!(session.step(), WorkflowStep::Processing);

        let doc = Artifact::Document("ДОГОВОР".into());
        assert!(session.apply(&ticket, GenerationResult::Complete { artifact: doc.clone() }));
        assert_eq!(session.step(), WorkflowStep::Result);
        assert_eq!(session.artifact(), Some(&doc));
        assert!(session.questions().is_empty());
    }

    #[test]
    fn test_second_submit_while_processing_is_noop() {
        let mut session = design();
        let first = session.submit_description("Логотип кофейни");
        assert!(first.is_some());
        assert!(session.submit_description("Логотип кофейни").is_none());
        assert!(session.submit_answers(&["x"]).is_none());
        assert!(session.retry().is_none());
    }

    #[test]
    fn test_missing_answers_use_placeholder() {
        let mut session = design();
        let ticket = session.submit_description("Логотип кофейни").unwrap();
        ask(&mut session, &ticket, &["Цвета?", "Шрифт?", "Сроки?"]);

        let draft = session.submit_answers(&["Зелёный", "  "]).unwrap();
        let answers: Vec<_> = session.history().iter().map(|c| c.answer.as_str()).collect();
        assert_eq!(answers, vec!["Зелёный", "Не указано", "Не указано"]);
        assert_eq!(draft.request.history.len(), 3);
        assert_eq!(draft.kind, TicketKind::Draft { final_round: false });
    }

    #[test]
    fn test_empty_question_batch_still_questions() {
        let mut session = design();
        let ticket = session.submit_description("Логотип").unwrap();
        ask(&mut session, &ticket, &[]);
        assert_eq!(session.step(), WorkflowStep::Questioning);

        let draft = session.submit_answers::<&str>(&[]).unwrap();
        assert!(draft.request.history.is_empty());
    }

    #[test]
    fn test_history_accumulates_across_rounds() {
        let mut session = design();
        let ticket = session.submit_description("Логотип").unwrap();
        ask(&mut session, &ticket, &["A?", "B?"]);
        let draft = session.submit_answers(&["a", "b"]).unwrap();
        ask(&mut session, &draft, &["C?"]);
        assert_eq!(session.questions(), &["C?".to_string()]);
        assert_eq!(session.history().len(), 2);

        let draft = session.submit_answers(&["c"]).unwrap();
        assert_eq!(session.history().len(), 3);
        assert_eq!(draft.request.history.len(), 3);
        assert_eq!(session.rounds(), 2);
    }

    #[test]
    fn test_final_round_needs_info_fails() {
        let options = WorkflowConfig { max_rounds: 1, ..WorkflowConfig::default() };
        let mut session = design().with_options(options);
        let ticket = session.submit_description("Логотип").unwrap();
        ask(&mut session, &ticket, &["A?"]);

        let draft = session.submit_answers(&["a"]).unwrap();
        assert_eq!(draft.kind, TicketKind::Draft { final_round: true });
        ask(&mut session, &draft, &["B?"]);
        assert_eq!(session.step(), WorkflowStep::Failed);
        assert_eq!(session.failure(), Some(messages::TOO_MANY_ROUNDS));
    }

    #[test]
    fn test_failure_then_retry_resends_same_request() {
        let mut session = design();
        let ticket = session.submit_description("Логотип").unwrap();
        assert!(session.apply(&ticket, GenerationResult::failed("нет сети")));
        assert_eq!(session.step(), WorkflowStep::Failed);
        assert_eq!(session.failure(), Some("нет сети"));

        let again = session.retry().unwrap();
        assert_eq!(again.request, ticket.request);
        assert_eq!(again.kind, ticket.kind);
        assert_ne!(again.seq(), ticket.seq());
        assert_eq!(session.step(), WorkflowStep::Processing);
        assert!(session.failure().is_none());
    }

    #[test]
    fn test_failure_as_result_collapses() {
        let options = WorkflowConfig { failure_as_result: true, ..WorkflowConfig::default() };
        let mut session = design().with_options(options);
        let ticket = session.submit_description("Логотип").unwrap();
        session.apply(&ticket, GenerationResult::failed("Ошибка"));

        assert_eq!(session.step(), WorkflowStep::Result);
        assert_eq!(session.artifact(), Some(&Artifact::Document("Ошибка".into())));
    }

    #[test]
    fn test_result_is_terminal() {
        let mut session = GuidedSession::new(Category::Contract { kind: ContractKind::Sale });
        let ticket = session.submit_description("Продажа авто").unwrap();
        session.apply(&ticket, GenerationResult::Complete { artifact: Artifact::Document("d".into()) });

        assert!(session.submit_description("Другое").is_none());
        assert!(session.submit_answers(&["x"]).is_none());
        assert!(session.retry().is_none());
        assert_eq!(session.step(), WorkflowStep::Result);
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut session = design();
        session.reset();
        assert_eq!(session.step(), WorkflowStep::AwaitingInput);

        let ticket = session.submit_description("Логотип").unwrap();
        session.reset();
        assert_eq!(session.step(), WorkflowStep::AwaitingInput);
        assert!(!session.apply(&ticket, GenerationResult::NeedsInfo { questions: vec![] }));

        let ticket = session.submit_description("Логотип").unwrap();
        ask(&mut session, &ticket, &["A?"]);
        session.submit_answers(&["a"]).unwrap();
        session.reset();
        session.reset();

        assert_eq!(session.step(), WorkflowStep::AwaitingInput);
        assert!(session.history().is_empty());
        assert!(session.artifact().is_none());
        assert!(session.questions().is_empty());
    }

    fn assert_fresh(session: &GuidedSession) {
        assert_eq!(session.step(), WorkflowStep::AwaitingInput);
        assert!(session.history().is_empty());
        assert!(session.artifact().is_none());
        assert!(session.outcome().is_none());
        assert!(session.description().is_empty());
    }

    #[test]
    fn test_reset_from_result() {
        let mut session = design();
        let ticket = session.submit_description("Логотип").unwrap();
        ask(&mut session, &ticket, &["A?"]);
        let draft = session.submit_answers(&["a"]).unwrap();
        let artifact = Artifact::Document("Бриф".into());
        assert!(session.apply(&draft, GenerationResult::Complete { artifact }));
        assert_eq!(session.step(), WorkflowStep::Result);

        session.reset();
        assert_fresh(&session);
        assert_eq!(session.rounds(), 0);
    }

    #[test]
    fn test_reset_from_failed() {
        let mut session = design();
        let ticket = session.submit_description("Логотип").unwrap();
        ask(&mut session, &ticket, &["A?"]);
        let draft = session.submit_answers(&["a"]).unwrap();
        assert!(session.apply(&draft, GenerationResult::failed("нет сети")));
        assert_eq!(session.step(), WorkflowStep::Failed);

        session.reset();
        assert_fresh(&session);
        assert!(session.retry().is_none());
    }

    #[test]
    fn test_reset_from_idle() {
        let mut session = design();
        session.submit_description("Логотип").unwrap();
        session.abandon();
        assert_eq!(session.step(), WorkflowStep::Idle);

        session.reset();
        assert_fresh(&session);
        assert!(session.submit_description("Логотип").is_some());
    }

    #[test]
    fn test_abandon_discards_in_flight_reply() {
        let mut session = design();
        let ticket = session.submit_description("Логотип").unwrap();
        session.abandon();

        assert_eq!(session.step(), WorkflowStep::Idle);
        assert!(!session.apply(&ticket, GenerationResult::NeedsInfo { questions: vec![] }));
        assert!(session.submit_description("Логотип").is_none());
    }

    #[test]
    fn test_stale_reply_after_retry_is_dropped() {
        let mut session = design();
        let first = session.submit_description("Логотип").unwrap();
        session.apply(&first, GenerationResult::failed("timeout"));
        let second = session.retry().unwrap();

        assert!(!session.apply(&first, GenerationResult::NeedsInfo { questions: vec![] }));
        assert!(session.apply(&second, GenerationResult::NeedsInfo { questions: vec![] }));
    }
}
