//! Answer generator: lazy engine lifecycle plus retrieve → prompt → LLM.
//!
//! [`AnswerGenerator::answer`] never fails. Initialization and generation
//! errors are logged and turned into one of two fixed fallback answers.
//!
//! The engine is built on first use through a [`RetrieverSource`]. The
//! build runs in its own task, which owns the lifecycle lock until the
//! outcome is installed, so concurrent first calls share one
//! initialization and a caller that gives up never abandons it. Callers
//! that queued behind an attempt adopt its outcome; a failed engine is
//! rebuilt by the next fresh call.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use scuba_rag_core::models::{Answer, AnswerOutcome};
use scuba_rag_core::prompt::Prompt;
use scuba_rag_core::retriever::Retriever;

use crate::error::RagError;
use crate::ingest::RetrieverSource;
use crate::llm::ChatModel;

pub const UNAVAILABLE_MESSAGE: &str = "Lo siento, el asistente de buceo no está disponible en este momento. Inténtalo de nuevo más tarde.";
pub const PROCESSING_ERROR_MESSAGE: &str = "Lo siento, ocurrió un error al procesar tu consulta.";

/// Externally visible lifecycle state, reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl EngineStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineStatus::Initializing,
            2 => EngineStatus::Ready,
            3 => EngineStatus::Failed,
            _ => EngineStatus::Uninitialized,
        }
    }
}

enum EngineState {
    Uninitialized,
    Ready(Arc<dyn Retriever>),
    Failed { reason: String },
}

pub struct AnswerGenerator {
    source: Arc<dyn RetrieverSource>,
    llm: Arc<dyn ChatModel>,
    state: Arc<Mutex<EngineState>>,
    /// Completed initialization attempts.
    attempts: Arc<AtomicU64>,
    /// Mirrors `state` for lock-free status reads.
    status: Arc<AtomicU8>,
}

impl AnswerGenerator {
    pub fn new(source: Arc<dyn RetrieverSource>, llm: Arc<dyn ChatModel>) -> Self {
        Self {
            source,
            llm,
            state: Arc::new(Mutex::new(EngineState::Uninitialized)),
            attempts: Arc::new(AtomicU64::new(0)),
            status: Arc::new(AtomicU8::new(EngineStatus::Uninitialized as u8)),
        }
    }

    /// Answer a user message. Always returns an [`Answer`].
    pub async fn answer(&self, message: &str) -> Answer {
        let retriever = match self.engine().await {
            Ok(retriever) => retriever,
            Err(reason) => {
                tracing::warn!(%reason, "answer engine unavailable");
                return Answer::fallback(AnswerOutcome::Unavailable, UNAVAILABLE_MESSAGE);
            }
        };

        match self.generate(retriever.as_ref(), message).await {
            Ok(text) => Answer::generated(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to answer message");
                Answer::fallback(AnswerOutcome::Failed, PROCESSING_ERROR_MESSAGE)
            }
        }
    }

    /// Initialize the engine now instead of on the first message.
    pub async fn warm_up(&self) -> EngineStatus {
        match self.engine().await {
            Ok(_) => EngineStatus::Ready,
            Err(reason) => {
                tracing::warn!(%reason, "warm-up failed, will retry on first message");
                EngineStatus::Failed
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    async fn engine(&self) -> Result<Arc<dyn Retriever>, String> {
        let seen = self.attempts.load(Ordering::Acquire);
        let state = self.state.clone().lock_owned().await;

        match &*state {
            EngineState::Ready(retriever) => return Ok(retriever.clone()),
            // Another caller finished an attempt while we waited.
            EngineState::Failed { reason } if self.attempts.load(Ordering::Acquire) != seen => {
                return Err(reason.clone());
            }
            _ => {}
        }

        self.status
            .store(EngineStatus::Initializing as u8, Ordering::Release);

        let build = tokio::spawn(initialize(
            state,
            self.source.clone(),
            self.attempts.clone(),
            self.status.clone(),
        ));

        match build.await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.status
                    .store(EngineStatus::Failed as u8, Ordering::Release);
                Err(format!("initialization task aborted: {}", e))
            }
        }
    }

    async fn generate(&self, retriever: &dyn Retriever, message: &str) -> Result<String, RagError> {
        let chunks = retriever.retrieve(message).await?;
        let prompt = Prompt::compose(&chunks, message);

        tracing::debug!(
            chunks = chunks.len(),
            model = self.llm.model_name(),
            "calling language model"
        );

        Ok(self.llm.complete(&prompt).await?)
    }
}

/// Build the engine and install the outcome while holding the lifecycle lock.
async fn initialize(
    mut state: OwnedMutexGuard<EngineState>,
    source: Arc<dyn RetrieverSource>,
    attempts: Arc<AtomicU64>,
    status: Arc<AtomicU8>,
) -> Result<Arc<dyn Retriever>, String> {
    tracing::info!("initializing answer engine");
    let outcome = source.build().await;
    attempts.fetch_add(1, Ordering::AcqRel);

    match outcome {
        Ok(retriever) => {
            tracing::info!("answer engine ready");
            *state = EngineState::Ready(retriever.clone());
            status.store(EngineStatus::Ready as u8, Ordering::Release);
            Ok(retriever)
        }
        Err(e) => {
            let reason = e.to_string();
            tracing::error!(%reason, "answer engine initialization failed");
            *state = EngineState::Failed {
                reason: reason.clone(),
            };
            status.store(EngineStatus::Failed as u8, Ordering::Release);
            Err(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use scuba_rag_core::embedding::EmbedError;
    use scuba_rag_core::models::Chunk;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct StubRetriever {
        fail: bool,
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Chunk>, EmbedError> {
            if self.fail {
                return Err(EmbedError::Request("connection refused".into()));
            }
            Ok(vec![Chunk {
                source: "stub.yaml".into(),
                index: 0,
                start: 0,
                text: "Dummy context".into(),
            }])
        }
    }

    /// Counts builds; fails the first `failures` of them.
    struct StubSource {
        builds: AtomicUsize,
        failures: usize,
        delay: Duration,
        retrieval_fails: bool,
    }

    impl StubSource {
        fn ok() -> Self {
            Self {
                builds: AtomicUsize::new(0),
                failures: 0,
                delay: Duration::ZERO,
                retrieval_fails: false,
            }
        }

        fn builds(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RetrieverSource for StubSource {
        async fn build(&self) -> Result<Arc<dyn Retriever>, RagError> {
            let n = self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.failures {
                return Err(RagError::corpus("/kb", "No such file or directory"));
            }
            Ok(Arc::new(StubRetriever {
                fail: self.retrieval_fails,
            }))
        }
    }

    struct EchoChat;

    #[async_trait]
    impl ChatModel for EchoChat {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
            Ok(format!("Echo: {}", prompt))
        }
    }

    struct FailingChat;

    #[async_trait]
    impl ChatModel for FailingChat {
        fn model_name(&self) -> &str {
            "failing"
        }
        async fn complete(&self, _prompt: &Prompt) -> Result<String, LlmError> {
            Err(LlmError::Request("OpenAI API error 500".into()))
        }
    }

    #[tokio::test]
    async fn test_answer_uses_context_and_llm() {
        let generator = AnswerGenerator::new(Arc::new(StubSource::ok()), Arc::new(EchoChat));
        assert_eq!(generator.status(), EngineStatus::Uninitialized);

        let answer = generator.answer("¿Dónde bucear?").await;
        assert_eq!(answer.outcome, AnswerOutcome::Generated);
        assert!(answer.content.starts_with("Echo: "));
        assert!(answer.content.contains("Dummy context"));
        assert!(answer.content.contains("¿Dónde bucear?"));
        assert_eq!(generator.status(), EngineStatus::Ready);
    }

    #[tokio::test]
    async fn test_failing_llm_returns_processing_error() {
        let generator = AnswerGenerator::new(Arc::new(StubSource::ok()), Arc::new(FailingChat));
        let answer = generator.answer("hola").await;
        assert_eq!(answer.outcome, AnswerOutcome::Failed);
        assert_eq!(answer.content, PROCESSING_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_retrieval_failure_returns_processing_error() {
        let source = StubSource {
            retrieval_fails: true,
            ..StubSource::ok()
        };
        let generator = AnswerGenerator::new(Arc::new(source), Arc::new(EchoChat));
        let answer = generator.answer("hola").await;
        assert_eq!(answer.content, PROCESSING_ERROR_MESSAGE);
        assert_eq!(generator.status(), EngineStatus::Ready);
    }

    #[tokio::test]
    async fn test_failed_initialization_falls_back_then_recovers() {
        let source = Arc::new(StubSource {
            failures: 1,
            ..StubSource::ok()
        });
        let generator = AnswerGenerator::new(source.clone(), Arc::new(EchoChat));

        let first = generator.answer("hola").await;
        assert_eq!(first.outcome, AnswerOutcome::Unavailable);
        assert_eq!(first.content, UNAVAILABLE_MESSAGE);
        assert_eq!(generator.status(), EngineStatus::Failed);

        let second = generator.answer("hola").await;
        assert_eq!(second.outcome, AnswerOutcome::Generated);
        assert_eq!(source.builds(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_initialize_once() {
        let source = Arc::new(StubSource {
            delay: Duration::from_millis(100),
            ..StubSource::ok()
        });
        let generator = Arc::new(AnswerGenerator::new(source.clone(), Arc::new(EchoChat)));

        let (a, b) = tokio::join!(generator.answer("uno"), generator.answer("dos"));
        assert!(!a.is_fallback());
        assert!(!b.is_fallback());
        assert_eq!(source.builds(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_a_failed_attempt() {
        let source = Arc::new(StubSource {
            failures: 1,
            delay: Duration::from_millis(100),
            ..StubSource::ok()
        });
        let generator = Arc::new(AnswerGenerator::new(source.clone(), Arc::new(EchoChat)));

        let (a, b) = tokio::join!(generator.answer("uno"), generator.answer("dos"));
        assert_eq!(a.outcome, AnswerOutcome::Unavailable);
        assert_eq!(b.outcome, AnswerOutcome::Unavailable);
        assert_eq!(source.builds(), 1);
    }

    #[tokio::test]
    async fn test_status_reports_initializing_during_build() {
        let source = Arc::new(StubSource {
            delay: Duration::from_millis(200),
            ..StubSource::ok()
        });
        let generator = Arc::new(AnswerGenerator::new(source, Arc::new(EchoChat)));

        let warming = {
            let generator = generator.clone();
            tokio::spawn(async move { generator.warm_up().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(generator.status(), EngineStatus::Initializing);

        assert_eq!(warming.await.unwrap(), EngineStatus::Ready);
        assert_eq!(generator.status(), EngineStatus::Ready);
    }

    #[tokio::test]
    async fn test_status_stays_ready_while_lock_is_held() {
        let generator = AnswerGenerator::new(Arc::new(StubSource::ok()), Arc::new(EchoChat));
        assert_eq!(generator.warm_up().await, EngineStatus::Ready);

        let _held = generator.state.lock().await;
        assert_eq!(generator.status(), EngineStatus::Ready);
    }

    #[tokio::test]
    async fn test_status_stays_failed_while_lock_is_held() {
        let source = StubSource {
            failures: 1,
            ..StubSource::ok()
        };
        let generator = AnswerGenerator::new(Arc::new(source), Arc::new(EchoChat));
        assert_eq!(generator.warm_up().await, EngineStatus::Failed);

        let _held = generator.state.lock().await;
        assert_eq!(generator.status(), EngineStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_abandon_initialization() {
        let source = Arc::new(StubSource {
            delay: Duration::from_millis(200),
            ..StubSource::ok()
        });
        let generator = AnswerGenerator::new(source.clone(), Arc::new(EchoChat));

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), generator.answer("hola")).await;
        assert!(timed_out.is_err());
        assert_eq!(generator.status(), EngineStatus::Initializing);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(generator.status(), EngineStatus::Ready);

        let answer = generator.answer("hola").await;
        assert_eq!(answer.outcome, AnswerOutcome::Generated);
        assert_eq!(source.builds(), 1);
    }
}
