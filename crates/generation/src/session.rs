//! Session state machine around the job driver.
//!
//! A session runs at most one job at a time, owns the blob store and the
//! history ledger, and is the only place where backend errors are turned
//! into user-visible state instead of propagating further.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};
use veo_api::{GenerationBackend, GenerationError};

use crate::driver::{JobDriver, JobEvent};
use crate::history::{HistoryItem, HistoryLedger};
use crate::request::GenerationRequest;
use media_store::BlobStore;

/// Where the session currently is in a job's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Polling,
    Resolving,
}

impl Phase {
    pub fn is_busy(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

/// Progress snapshot published for display while a job runs.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub phase: Phase,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// One user's generation session.
pub struct Session {
    driver: JobDriver,
    store: BlobStore,
    ledger: HistoryLedger,
    current: Option<HistoryItem>,
    progress: Arc<Mutex<ProgressState>>,
}

impl Session {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        let store = BlobStore::new();
        Self {
            driver: JobDriver::new(backend, store.clone()),
            store,
            ledger: HistoryLedger::new(),
            current: None,
            progress: Arc::new(Mutex::new(ProgressState::default())),
        }
    }

    /// Run a request to completion, updating progress as it goes.
    ///
    /// Returns `Ok(())` without doing anything when a job is already in
    /// flight or the prompt fails validation (validation failures are
    /// reported through the progress error slot). Backend errors are
    /// recorded in progress state and also returned so callers can react.
    pub async fn generate(&mut self, request: GenerationRequest) -> Result<(), GenerationError> {
        {
            let mut progress = self.progress.lock();
            if progress.phase.is_busy() {
                warn!("generation already in flight; ignoring request");
                return Ok(());
            }
            if let Some(issue) = request.prompt_issue() {
                progress.error = Some(issue);
                return Ok(());
            }
            progress.phase = Phase::Submitting;
            progress.message = None;
            progress.error = None;
        }
        self.current = None;

        let progress = Arc::clone(&self.progress);
        let mut sink = move |event: JobEvent| {
            let mut progress = progress.lock();
            match event {
                JobEvent::Phase(phase) => progress.phase = phase,
                JobEvent::Message(message) => progress.message = Some(message),
            }
        };

        let outcome = self.driver.run(&request, &mut sink).await;

        let result = match outcome {
            Ok(items) => {
                info!(count = items.len(), "generation finished");
                self.current = items.first().cloned();
                self.ledger.prepend(items);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "generation failed");
                self.progress.lock().error = Some(e.to_string());
                Err(e)
            }
        };

        let mut progress = self.progress.lock();
        progress.phase = Phase::Idle;
        progress.message = None;

        result
    }

    /// Remove a history entry, releasing its media. Clears the current
    /// result slot when it points at the removed entry.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.ledger.remove(id, &self.store);
        if removed && self.current.as_ref().is_some_and(|item| item.id() == id) {
            self.current = None;
        }
        removed
    }

    pub fn store(&self) -> &BlobStore {
        &self.store
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    /// The most recent successful result, if it is still in the ledger.
    pub fn current(&self) -> Option<&HistoryItem> {
        self.current.as_ref()
    }

    pub fn progress(&self) -> ProgressState {
        self.progress.lock().clone()
    }

    /// Shared progress cell, for observers on other tasks.
    pub fn progress_handle(&self) -> Arc<Mutex<ProgressState>> {
        Arc::clone(&self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ImageOptions, ImageConfig, RenderOptions, VideoConfig};
    use crate::test_backend::{PollStep, ScriptedBackend};
    use veo_api::GeminiClient;

    fn video_request(prompt: &str) -> GenerationRequest {
        GenerationRequest::video(prompt, RenderOptions::default(), VideoConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_publishes_result_and_returns_to_idle() {
        let backend = Arc::new(ScriptedBackend::video(
            vec![PollStep::Done(Some("https://dl.example/v.mp4".to_string()))],
            vec![1, 2, 3],
        ));
        let mut session = Session::new(backend);

        session.generate(video_request("a fox")).await.unwrap();

        assert_eq!(session.ledger().len(), 1);
        let current = session.current().unwrap();
        assert_eq!(current.id(), session.ledger().iter().next().unwrap().id());

        let progress = session.progress();
        assert_eq!(progress.phase, Phase::Idle);
        assert_eq!(progress.message, None);
        assert_eq!(progress.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_sets_error_and_keeps_ledger_intact() {
        let backend = Arc::new(ScriptedBackend::video(
            vec![PollStep::Fail("quota exceeded".to_string())],
            vec![],
        ));
        let mut session = Session::new(backend);

        let err = session.generate(video_request("a fox")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Poll(_)));

        assert!(session.ledger().is_empty());
        assert!(session.current().is_none());
        assert!(session.store().is_empty());

        let progress = session.progress();
        assert_eq!(progress.phase, Phase::Idle);
        assert!(progress.error.as_deref().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_state_change() {
        let backend = Arc::new(GeminiClient::new(None));
        let mut session = Session::new(backend);

        let err = session.generate(video_request("a fox")).await.unwrap_err();
        assert!(matches!(err, GenerationError::Configuration(_)));
        assert!(session.ledger().is_empty());
        assert!(session.current().is_none());
        assert_eq!(session.progress().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn in_flight_guard_ignores_a_second_request() {
        let backend = Arc::new(ScriptedBackend::images(vec![(
            vec![1],
            "image/png".to_string(),
        )]));
        let mut session = Session::new(backend);
        session.progress_handle().lock().phase = Phase::Polling;

        let request = GenerationRequest::image(
            "poster",
            ImageOptions::default(),
            ImageConfig::default(),
        );
        session.generate(request).await.unwrap();
        assert!(session.ledger().is_empty());
        assert!(session.current().is_none());
    }

    #[tokio::test]
    async fn invalid_prompts_never_reach_the_backend() {
        let backend = Arc::new(ScriptedBackend::video(vec![], vec![]));
        let mut session = Session::new(backend.clone());

        session.generate(video_request("  ")).await.unwrap();
        assert_eq!(
            session.progress().error.as_deref(),
            Some("Prompt cannot be empty.")
        );

        session
            .generate(video_request(r#"{"broken": "#))
            .await
            .unwrap();
        assert_eq!(
            session.progress().error.as_deref(),
            Some("Invalid JSON format.")
        );

        assert!(!backend.was_submitted());
        assert!(session.ledger().is_empty());
    }

    #[tokio::test]
    async fn remove_releases_media_and_clears_the_current_slot() {
        let backend = Arc::new(ScriptedBackend::images(vec![(
            vec![9],
            "image/png".to_string(),
        )]));
        let mut session = Session::new(backend);

        let request = GenerationRequest::image(
            "poster",
            ImageOptions::default(),
            ImageConfig::default(),
        );
        session.generate(request).await.unwrap();
        assert_eq!(session.store().len(), 1);
        let id = session.current().unwrap().id().to_string();

        assert!(!session.remove("not-an-id"));
        assert!(session.current().is_some());

        assert!(session.remove(&id));
        assert!(session.current().is_none());
        assert!(session.ledger().is_empty());
        assert!(session.store().is_empty());
    }
}
