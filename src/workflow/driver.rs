//! Runs session tickets against the gateway.

use super::category::{Category, PhotoMode};
use super::prompts::{
    build_direct_prompt, build_draft_prompt, build_photo_prompt, build_questions_prompt,
    draft_schema, questions_schema, GenerationRequest,
};
use super::reply::{DraftReply, QuestionBatch};
use super::session::{GuidedSession, Ticket, TicketKind};
use super::state::{messages, Artifact, GenerationResult};
use crate::ai::{Gateway, GatewayError, GenerativeBackend, ImageOutcome, ImageRequest, Tier};
use crate::core::CancelToken;

/// Executes tickets issued by a [`GuidedSession`].
pub struct Driver<'a, B: GenerativeBackend> {
    gateway: &'a Gateway<B>,
    tier: Tier,
}

impl<'a, B: GenerativeBackend> Driver<'a, B> {
    pub fn new(gateway: &'a Gateway<B>) -> Self {
        Self { gateway, tier: Tier::Free }
    }

    /// Tier used for photo flows.
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Send the ticket's request and normalize the reply.
    pub async fn execute(&self, ticket: &Ticket) -> GenerationResult {
        let request = &ticket.request;
        tracing::debug!(
            category = %request.category,
            kind = ?ticket.kind,
            history = request.history.len(),
            "Executing ticket"
        );

        // The category fixes the artifact kind whatever the flow mode.
        match (ticket.kind, request.category) {
            (TicketKind::Questions, _) => {
                let prompt = build_questions_prompt(request);
                match self.gateway.try_structured::<QuestionBatch>(&prompt, &questions_schema()).await {
                    Ok(batch) => GenerationResult::NeedsInfo {
                        questions: batch.unwrap_or_default().questions,
                    },
                    Err(e) => failure(&e),
                }
            }
            (TicketKind::Direct | TicketKind::Draft { .. }, Category::Photo { mode }) => {
                self.photo(request, mode).await
            }
            (TicketKind::Direct, category) if category.produces_plan() => {
                self.draft(request, true).await
            }
            (TicketKind::Direct, _) => {
                match self.gateway.try_text(&build_direct_prompt(request)).await {
                    Ok(text) => GenerationResult::Complete { artifact: Artifact::Document(text) },
                    Err(e) => failure(&e),
                }
            }
            (TicketKind::Draft { final_round }, _) => self.draft(request, final_round).await,
        }
    }

    async fn photo(&self, request: &GenerationRequest, mode: PhotoMode) -> GenerationResult {
        let image = ImageRequest {
            prompt: build_photo_prompt(request),
            style: mode.style,
            aspect_ratio: mode.aspect_ratio,
            references: request.media.clone(),
            tier: self.tier,
        };
        match self.gateway.request_image(&image).await {
            ImageOutcome::Ready(image) => GenerationResult::Complete { artifact: Artifact::Image(image) },
            ImageOutcome::Failed { message } => GenerationResult::Failed { message },
        }
    }

    async fn draft(&self, request: &GenerationRequest, final_round: bool) -> GenerationResult {
        let prompt = build_draft_prompt(request, final_round);
        let schema = draft_schema(request.category);
        match self.gateway.try_structured::<DraftReply>(&prompt, &schema).await {
            Ok(Some(DraftReply::Complete(artifact))) => GenerationResult::Complete { artifact },
            Ok(Some(DraftReply::NeedsInfo(questions))) => GenerationResult::NeedsInfo { questions },
            Ok(None) => GenerationResult::failed(messages::UNREADABLE_REPLY),
            Err(e) => failure(&e),
        }
    }

    /// Execute `ticket` and apply the reply to `session`.
    ///
    /// Returns `false` if the reply was stale and dropped.
    pub async fn run(&self, session: &mut GuidedSession, ticket: Ticket) -> bool {
        let result = self.execute(&ticket).await;
        session.apply(&ticket, result)
    }

    /// Like [`run`](Self::run), but gives up when `cancel` fires.
    ///
    /// A cancelled request leaves the session `Failed` so it can be retried.
    pub async fn run_cancellable(
        &self,
        session: &mut GuidedSession,
        ticket: Ticket,
        cancel: &CancelToken,
    ) -> bool {
        let result = cancel
            .run(self.execute(&ticket))
            .await
            .unwrap_or_else(|| GenerationResult::failed(messages::CANCELLED));
        session.apply(&ticket, result)
    }

    /// Submit a description and run the resulting request, if any.
    pub async fn start(&self, session: &mut GuidedSession, description: &str) -> bool {
        match session.submit_description(description) {
            Some(ticket) => self.run(session, ticket).await,
            None => false,
        }
    }

    /// Submit answers and run the draft request, if any.
    pub async fn answer<S: AsRef<str>>(&self, session: &mut GuidedSession, answers: &[S]) -> bool {
        match session.submit_answers(answers) {
            Some(ticket) => self.run(session, ticket).await,
            None => false,
        }
    }
}

fn failure(err: &GatewayError) -> GenerationResult {
    tracing::warn!(error = %err, "Generation request failed");
    let message = match err {
        GatewayError::EmptyResult(_) => messages::EMPTY_REPLY,
        GatewayError::Parse(_) => messages::UNREADABLE_REPLY,
        GatewayError::Cancelled => messages::CANCELLED,
        _ => messages::GENERATION_FAILED,
    };
    GenerationResult::failed(message)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::ai::{
        BackendReply, GenerateCall, InlineImage, OutputKind, ReplyPart, VideoCall, VideoJob,
        VideoStatus,
    };
    use crate::core::GatewayConfig;
    use crate::workflow::category::{ContractKind, DesignKind, FlowMode};
    use crate::workflow::state::WorkflowStep;

    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<Result<BackendReply, GatewayError>>>,
        prompts: Mutex<Vec<String>>,
        outputs: Mutex<Vec<OutputKind>>,
    }

    impl Scripted {
        fn with(replies: Vec<Result<BackendReply, GatewayError>>) -> Self {
            Self { replies: Mutex::new(replies.into()), ..Self::default() }
        }
    }

    #[async_trait]
    impl GenerativeBackend for Scripted {
        async fn generate(&self, call: GenerateCall) -> Result<BackendReply, GatewayError> {
            self.prompts.lock().push(call.prompt);
            self.outputs.lock().push(call.output);
            self.replies.lock().pop_front().unwrap_or_else(|| Ok(BackendReply::default()))
        }

        async fn start_video(&self, _call: VideoCall) -> Result<VideoJob, GatewayError> {
            Err(GatewayError::Transport("unused".into()))
        }

        async fn poll_video(&self, _job: &VideoJob) -> Result<VideoStatus, GatewayError> {
            Ok(VideoStatus::Pending)
        }

        async fn download(&self, _uri: &str) -> Result<Vec<u8>, GatewayError> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn text(body: &str) -> Result<BackendReply, GatewayError> {
        Ok(BackendReply::text(body))
    }

    #[tokio::test]
    async fn test_questions_parse_failure_means_empty_batch() {
        let gateway = Gateway::new(Scripted::with(vec![text("не JSON")]), GatewayConfig::default());
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::Design { kind: DesignKind::Logo });

        assert!(driver.start(&mut session, "Логотип").await);
        assert_eq!(session.step(), WorkflowStep::Questioning);
        assert!(session.questions().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_marks_failed() {
        let gateway = Gateway::new(
            Scripted::with(vec![Err(GatewayError::Transport("reset".into()))]),
            GatewayConfig::default(),
        );
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::Contract { kind: ContractKind::Lease });

        driver.start(&mut session, "Аренда квартиры").await;
        assert_eq!(session.step(), WorkflowStep::Failed);
        assert_eq!(session.failure(), Some(messages::GENERATION_FAILED));
    }

    #[tokio::test]
    async fn test_unreadable_draft_fails() {
        let gateway = Gateway::new(
            Scripted::with(vec![text(r#"{"questions":["A?"]}"#), text(r#"{"status":"complete"}"#)]),
            GatewayConfig::default(),
        );
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::Presentation);

        driver.start(&mut session, "КП для кофейни").await;
        driver.answer(&mut session, &["да"]).await;
        assert_eq!(session.failure(), Some(messages::UNREADABLE_REPLY));
        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_plan_artifact() {
        let gateway = Gateway::new(
            Scripted::with(vec![
                text(r#"{"questions":[]}"#),
                text(r#"{"status":"complete","plan":{"posts":[{"day":1,"topic":"Знакомство"}]}}"#),
            ]),
            GatewayConfig::default(),
        );
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::SocialPlan);

        driver.start(&mut session, "Кофейня у дома").await;
        driver.answer::<&str>(&mut session, &[]).await;
        let Some(Artifact::Plan(plan)) = session.artifact() else {
            panic!("expected a plan, got {:?}", session.outcome());
        };
        assert_eq!(plan["posts"][0]["topic"], "Знакомство");
    }

    #[tokio::test]
    async fn test_photo_category_generates_image() {
        let image = InlineImage::new("image/png", "AAAA");
        let gateway = Gateway::new(
            Scripted::with(vec![Ok(BackendReply { parts: vec![ReplyPart::Image(image.clone())] })]),
            GatewayConfig::default(),
        );
        let driver = Driver::new(&gateway).with_tier(Tier::Pro);
        let mut session = GuidedSession::new(Category::Photo { mode: PhotoMode::default() });

        driver.start(&mut session, "Портрет в парке").await;
        assert!(matches!(session.artifact(), Some(Artifact::Image(reference)) if reference.image == image));
        assert!(gateway.backend().prompts.lock()[0].ends_with("Портрет в парке"));
    }

    #[tokio::test]
    async fn test_guided_photo_ends_in_image() {
        let image = InlineImage::new("image/png", "AAAA");
        let gateway = Gateway::new(
            Scripted::with(vec![
                text(r#"{"questions":["Какой фон?"]}"#),
                Ok(BackendReply { parts: vec![ReplyPart::Image(image.clone())] }),
            ]),
            GatewayConfig::default(),
        );
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::Photo { mode: PhotoMode::default() })
            .with_mode(FlowMode::Guided);

        driver.start(&mut session, "Кот в шляпе").await;
        assert_eq!(session.step(), WorkflowStep::Questioning);
        driver.answer(&mut session, &["Летний парк"]).await;

        assert!(matches!(session.artifact(), Some(Artifact::Image(reference)) if reference.image == image));
        let outputs = gateway.backend().outputs.lock();
        assert!(matches!(outputs[0], OutputKind::Json(_)));
        assert!(matches!(outputs[1], OutputKind::Image(_)));
        let prompts = gateway.backend().prompts.lock();
        assert!(prompts[1].contains("Кот в шляпе"));
        assert!(prompts[1].ends_with("Какой фон? Летний парк"));
    }

    #[tokio::test]
    async fn test_direct_plan_ends_in_plan() {
        for category in [Category::SocialPlan, Category::Presentation] {
            let gateway = Gateway::new(
                Scripted::with(vec![text(
                    r#"{"status":"complete","plan":{"title":"Неделя 1","slides":[]}}"#,
                )]),
                GatewayConfig::default(),
            );
            let driver = Driver::new(&gateway);
            let mut session = GuidedSession::new(category).with_mode(FlowMode::Direct);

            driver.start(&mut session, "Кофейня у дома").await;

            let Some(Artifact::Plan(plan)) = session.artifact() else {
                panic!("expected a plan for {category}, got {:?}", session.outcome());
            };
            assert_eq!(plan["title"], "Неделя 1");
            let outputs = gateway.backend().outputs.lock();
            assert_eq!(outputs.len(), 1);
            assert!(matches!(&outputs[0], OutputKind::Json(schema) if schema["properties"]["plan"]["type"] == "OBJECT"));
        }
    }

    #[tokio::test]
    async fn test_guided_contract_ends_in_document() {
        let gateway = Gateway::new(
            Scripted::with(vec![
                text(r#"{"questions":["Срок?"]}"#),
                text(r#"{"status":"complete","contract":"ДОГОВОР"}"#),
            ]),
            GatewayConfig::default(),
        );
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::Contract { kind: ContractKind::Services })
            .with_mode(FlowMode::Guided);

        driver.start(&mut session, "Монтаж").await;
        driver.answer(&mut session, &["месяц"]).await;
        assert_eq!(session.artifact(), Some(&Artifact::Document("ДОГОВОР".into())));
    }

    #[tokio::test]
    async fn test_direct_design_ends_in_document() {
        let gateway = Gateway::new(Scripted::with(vec![text("Бриф")]), GatewayConfig::default());
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::Design { kind: DesignKind::Website })
            .with_mode(FlowMode::Direct);

        driver.start(&mut session, "Сайт студии").await;
        assert_eq!(session.artifact(), Some(&Artifact::Document("Бриф".into())));
        assert_eq!(gateway.backend().outputs.lock()[0], OutputKind::Text);
    }

    #[tokio::test]
    async fn test_cancelled_run_leaves_failed() {
        let gateway = Gateway::new(Scripted::with(vec![text("doc")]), GatewayConfig::default());
        let driver = Driver::new(&gateway);
        let mut session = GuidedSession::new(Category::Contract { kind: ContractKind::Nda });
        let cancel = CancelToken::new();
        cancel.cancel();

        let ticket = session.submit_description("NDA для подрядчика").unwrap();
        assert!(driver.run_cancellable(&mut session, ticket, &cancel).await);
        assert_eq!(session.failure(), Some(messages::CANCELLED));
        assert!(gateway.backend().prompts.lock().is_empty());

        let ticket = session.retry().unwrap();
        assert!(driver.run(&mut session, ticket).await);
        assert_eq!(session.artifact(), Some(&Artifact::Document("doc".into())));
    }
}
