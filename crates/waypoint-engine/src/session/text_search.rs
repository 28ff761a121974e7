//! Guided search for printed text. Structurally the item-search flow with
//! the catalog swapped for a free-form query and the object detector
//! swapped for the text recognizer: any non-empty query is accepted and
//! matched against recognized blocks by case-insensitive containment.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use waypoint_core::{
    BoundingBox, CameraSource, DeviceError, FeatureId, FeatureKind, FeedbackOutput, GuideEvent,
    InputMethod, Preferences, SessionId, SpeechRecognizer, TextBatch, TextRecognizer,
};

use crate::error::EngineError;
use crate::feedback::{FeedbackPolicy, SearchKind};
use crate::lifecycle::{Feature, FeatureManager};
use crate::orchestrator::{PhaseSnapshot, SessionOrchestrator};
use crate::prediction::{PredictionConfig, PredictionState};
use crate::pump::{ContinuousFrameProcessor, DEFAULT_MAX_FPS};
use crate::tasks::TaskBag;

use super::{search_adjacency, SearchPhase, AUTO_OFF_NOTICE, AUTO_OFF_WARNING};

#[derive(Clone, Copy, Debug)]
pub struct TextSearchConfig {
    pub speech_timeout: Duration,
    pub max_fps: u32,
    pub prediction: PredictionConfig,
}

impl Default for TextSearchConfig {
    fn default() -> Self {
        Self {
            speech_timeout: Duration::from_secs(8),
            max_fps: DEFAULT_MAX_FPS,
            prediction: PredictionConfig::default(),
        }
    }
}

pub struct TextSearchSession {
    id: FeatureId,
    weak_self: Weak<TextSearchSession>,
    config: TextSearchConfig,

    orchestrator: SessionOrchestrator<SearchPhase>,
    pump: ContinuousFrameProcessor,
    prediction: Mutex<PredictionState>,
    policy: Mutex<FeedbackPolicy>,
    bag: TaskBag,

    camera: Arc<dyn CameraSource>,
    recognizer: Arc<dyn TextRecognizer>,
    speech: Arc<dyn SpeechRecognizer>,
    output: Arc<dyn FeedbackOutput>,
    prefs: Arc<Preferences>,
    manager: Arc<FeatureManager>,
    events: broadcast::Sender<GuideEvent>,

    session_id: Mutex<SessionId>,
    query_tx: watch::Sender<Option<String>>,
}

impl TextSearchSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: Arc<dyn CameraSource>,
        recognizer: Arc<dyn TextRecognizer>,
        speech: Arc<dyn SpeechRecognizer>,
        output: Arc<dyn FeedbackOutput>,
        prefs: Arc<Preferences>,
        manager: Arc<FeatureManager>,
        events: broadcast::Sender<GuideEvent>,
        config: TextSearchConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id: FeatureId::new(),
            weak_self: weak.clone(),
            config,
            orchestrator: SessionOrchestrator::new(search_adjacency),
            pump: ContinuousFrameProcessor::new(Arc::clone(&camera), config.max_fps),
            prediction: Mutex::new(PredictionState::new(config.prediction)),
            policy: Mutex::new(FeedbackPolicy::new(SearchKind::Text)),
            bag: TaskBag::new(),
            camera,
            recognizer,
            speech,
            output,
            prefs,
            manager,
            events,
            session_id: Mutex::new(SessionId::new()),
            query_tx: watch::channel(None).0,
        })
    }

    pub fn phase(&self) -> SearchPhase {
        self.orchestrator.current()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<PhaseSnapshot<SearchPhase>> {
        self.orchestrator.subscribe()
    }

    /// Observe the active query; `None` outside a search episode.
    pub fn subscribe_query(&self) -> watch::Receiver<Option<String>> {
        self.query_tx.subscribe()
    }

    pub fn current_query(&self) -> Option<String> {
        self.query_tx.borrow().clone()
    }

    /// Start searching for a known query, skipping acquisition.
    pub async fn start_with_query(&self, query: &str) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyActive);
        }
        if !self.orchestrator.transition(SearchPhase::ProcessingSpeech) {
            return Ok(());
        }
        self.begin_session();

        let Some(me) = self.weak_self.upgrade() else {
            return Ok(());
        };
        let token = self.bag.token();
        let query = query.to_string();
        self.bag.spawn(async move {
            me.accept_and_announce(&query, &token).await;
        });
        Ok(())
    }

    /// Keyboard query entry, legal while `Listening`.
    pub async fn submit_query(&self, text: &str) {
        let token = self.bag.token();
        self.handle_query(text, &token).await;
    }

    fn begin_session(&self) {
        let session_id = SessionId::new();
        *self.session_id.lock() = session_id.clone();
        if let Some(me) = self.weak_self.upgrade() {
            self.manager.register(me);
        }
        self.emit(GuideEvent::FeatureStarted {
            feature_id: self.id.clone(),
            session_id,
            kind: FeatureKind::TextSearch,
        });
    }

    fn spawn_listener(&self) {
        let Some(me) = self.weak_self.upgrade() else {
            return;
        };
        let token = self.bag.token();
        self.bag.spawn(async move {
            let result = me.acquire_query(&token).await;
            if token.is_cancelled() {
                return;
            }
            match result {
                Ok(text) => me.handle_query(&text, &token).await,
                Err(err) => {
                    me.emit_error(err.to_string());
                    me.recover();
                }
            }
        });
    }

    fn recover(&self) {
        if let Some(me) = self.weak_self.upgrade() {
            tokio::spawn(async move {
                me.finish(false).await;
            });
        }
    }

    async fn acquire_query(&self, token: &CancellationToken) -> Result<String, EngineError> {
        self.speech.set_language(&self.prefs.language);
        let mut transcripts = self.speech.transcripts();
        self.speech.start().await?;

        let wait_final = async {
            loop {
                match transcripts.recv().await {
                    Ok(t) if t.is_final && !t.text.trim().is_empty() => {
                        return Ok(t.text);
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(EngineError::Device(DeviceError::NothingRecognized));
                    }
                }
            }
        };

        let result = tokio::select! {
            _ = token.cancelled() => Err(EngineError::Device(DeviceError::Cancelled)),
            timed = tokio::time::timeout(self.config.speech_timeout, wait_final) => {
                timed.unwrap_or(Err(EngineError::Device(DeviceError::RecognitionTimeout(
                    self.config.speech_timeout,
                ))))
            }
        };
        self.speech.stop().await;
        result
    }

    async fn handle_query(&self, text: &str, token: &CancellationToken) {
        // Queries are only meaningful while acquisition is open; anything
        // arriving later (or before start) is stale input.
        if self.orchestrator.current() != SearchPhase::Listening {
            return;
        }
        if !self.orchestrator.transition(SearchPhase::ProcessingSpeech) {
            return;
        }
        self.accept_and_announce(text, token).await;
    }

    async fn accept_and_announce(&self, text: &str, token: &CancellationToken) {
        let query = text.trim().to_string();
        if query.is_empty() {
            self.emit_error(EngineError::Device(DeviceError::NothingRecognized).to_string());
            self.recover();
            return;
        }

        self.query_tx.send_replace(Some(query.clone()));
        if !self.orchestrator.transition(SearchPhase::Announcing) {
            return;
        }

        let phrase = format!("Searching for text {query}");
        if let Err(e) = self.output.speak(&phrase).await {
            tracing::warn!(error = %e, "announcement failed");
        }

        if token.is_cancelled() || self.orchestrator.current() != SearchPhase::Announcing {
            return;
        }
        if !self.orchestrator.transition(SearchPhase::Searching) {
            return;
        }

        self.apply_torch(self.prefs.torch_on_search).await;
        self.spawn_search_workers(query).await;
    }

    async fn spawn_search_workers(&self, query: String) {
        self.spawn_text_consumer(query);
        self.start_frame_feed().await;
        self.arm_auto_off();
    }

    fn spawn_text_consumer(&self, query: String) {
        let Some(me) = self.weak_self.upgrade() else {
            return;
        };
        let token = self.bag.token();
        let mut rx = self.recognizer.subscribe();
        self.bag.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    batch = rx.recv() => match batch {
                        Ok(batch) => me.handle_batch(&query, batch).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "text consumer lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    async fn handle_batch(&self, query: &str, batch: TextBatch) {
        if self.orchestrator.is_paused() {
            return;
        }
        let matches: Vec<BoundingBox> = batch.containing(query).map(|b| b.bounds).collect();
        let guidance = self.prediction.lock().observe(&matches);
        let Some(point) = guidance else {
            return;
        };

        let directive =
            self.policy
                .lock()
                .evaluate(point, Instant::now(), self.output.is_speaking());
        self.output
            .play_haptic(directive.pattern, directive.intensity)
            .await;
        if let Some(phrase) = directive.phrase {
            if let Err(e) = self.output.speak(&phrase).await {
                tracing::debug!(error = %e, "directive phrase dropped");
            }
        }
    }

    async fn start_frame_feed(&self) {
        let recognizer = Arc::clone(&self.recognizer);
        let started = self
            .pump
            .start(move |frame| {
                let recognizer = Arc::clone(&recognizer);
                async move {
                    recognizer.submit(frame).await;
                }
            })
            .await;
        if let Err(e) = started {
            self.emit_error(format!("camera start failed: {e}"));
        }
    }

    fn arm_auto_off(&self) {
        let Some(me) = self.weak_self.upgrade() else {
            return;
        };
        let warn_after = self.prefs.auto_off_warn();
        let pause_after = self.prefs.auto_off_pause();
        let warn_token = self.bag.token();
        let pause_token = self.bag.token();

        let warn_me = Arc::clone(&me);
        self.bag.spawn(async move {
            tokio::time::sleep(warn_after).await;
            if warn_token.is_cancelled() || !warn_me.is_running() {
                return;
            }
            let _ = warn_me.output.speak(AUTO_OFF_WARNING).await;
        });

        self.bag.spawn(async move {
            tokio::time::sleep(pause_after).await;
            if pause_token.is_cancelled() || !me.is_running() {
                return;
            }
            let _ = me.output.speak(AUTO_OFF_NOTICE).await;
            tokio::spawn(async move {
                me.pause().await;
            });
        });
    }

    async fn apply_torch(&self, on: bool) {
        if let Err(e) = self.camera.set_torch(on).await {
            tracing::warn!(error = %e, "torch unavailable");
        }
    }

    async fn finish(&self, completed: bool) {
        let session_id = self.session_id.lock().clone();
        self.bag.cancel_all().await;
        self.pump.stop().await;
        self.speech.stop().await;
        self.apply_torch(false).await;
        self.output.stop_and_suspend();

        if completed {
            self.orchestrator.transition(SearchPhase::Completed);
        }
        self.orchestrator.transition(SearchPhase::Idle);

        self.query_tx.send_replace(None);
        self.prediction.lock().reset();
        self.policy.lock().reset();
        self.manager.unregister(&self.id);
        self.emit(GuideEvent::FeatureStopped {
            feature_id: self.id.clone(),
            session_id,
            kind: FeatureKind::TextSearch,
        });
    }

    fn emit(&self, event: GuideEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("no event receivers");
        }
    }

    fn emit_error(&self, message: String) {
        tracing::warn!(feature = %self.id, %message, "session error");
        self.emit(GuideEvent::Error {
            feature_id: Some(self.id.clone()),
            message,
        });
    }
}

#[async_trait]
impl Feature for TextSearchSession {
    fn id(&self) -> &FeatureId {
        &self.id
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::TextSearch
    }

    fn is_running(&self) -> bool {
        self.orchestrator.current().is_running()
    }

    async fn start(&self) -> Result<(), EngineError> {
        if self.is_running() {
            return Ok(());
        }
        if !self.orchestrator.transition(SearchPhase::Listening) {
            return Ok(());
        }
        self.begin_session();

        match self.prefs.input_method {
            InputMethod::Voice => self.spawn_listener(),
            InputMethod::Keyboard => {}
        }
        Ok(())
    }

    async fn pause(&self) {
        if !self.orchestrator.pause() {
            return;
        }
        self.bag.cancel_all().await;
        self.pump.stop().await;
        self.apply_torch(false).await;
        self.output.stop_and_suspend();
        self.policy.lock().reset();
        self.manager.refresh();
    }

    async fn resume(&self) {
        if !self.orchestrator.resume() {
            return;
        }
        self.output.resume_output();
        self.apply_torch(self.prefs.torch_on_search).await;
        if let Some(query) = self.current_query() {
            self.spawn_search_workers(query).await;
        }
        self.manager.refresh();
    }

    async fn stop(&self) {
        if !self.is_running() {
            return;
        }
        self.finish(self.orchestrator.current() == SearchPhase::Searching)
            .await;
    }
}
