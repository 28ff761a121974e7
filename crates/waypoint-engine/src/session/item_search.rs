//! Guided search for a physical object. Full flow: acquire a spoken or
//! typed query, resolve it against the target catalog, announce the
//! resolved item, then run the frame pump and detection stream with
//! haptic+speech alignment feedback until stopped or auto-off.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use waypoint_core::{
    BoundingBox, CameraSource, DetectionBatch, DeviceError, FeatureId, FeatureKind, FeedbackOutput,
    GuideEvent, InputMethod, ObjectDetector, Preferences, SearchTarget, SessionId,
    SpeechRecognizer, TargetCatalog,
};

use crate::error::EngineError;
use crate::feedback::{FeedbackPolicy, SearchKind};
use crate::lifecycle::{Feature, FeatureManager};
use crate::orchestrator::{PhaseSnapshot, SessionOrchestrator};
use crate::prediction::{PredictionConfig, PredictionState};
use crate::pump::{ContinuousFrameProcessor, DEFAULT_MAX_FPS};
use crate::tasks::TaskBag;

use super::{
    search_adjacency, SearchPhase, AUTO_OFF_NOTICE, AUTO_OFF_WARNING, NOT_SUPPORTED_SUFFIX,
};

#[derive(Clone, Copy, Debug)]
pub struct ItemSearchConfig {
    /// Hard limit on query acquisition before the session recovers to idle.
    pub speech_timeout: Duration,
    pub max_fps: u32,
    pub prediction: PredictionConfig,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for ItemSearchConfig {
    fn default() -> Self {
        Self {
            speech_timeout: Duration::from_secs(8),
            max_fps: DEFAULT_MAX_FPS,
            prediction: PredictionConfig::default(),
            confidence_threshold: 0.45,
            iou_threshold: 0.5,
        }
    }
}

pub struct ItemSearchSession {
    id: FeatureId,
    weak_self: Weak<ItemSearchSession>,
    config: ItemSearchConfig,

    orchestrator: SessionOrchestrator<SearchPhase>,
    pump: ContinuousFrameProcessor,
    prediction: Mutex<PredictionState>,
    policy: Mutex<FeedbackPolicy>,
    bag: TaskBag,

    camera: Arc<dyn CameraSource>,
    detector: Arc<dyn ObjectDetector>,
    speech: Arc<dyn SpeechRecognizer>,
    output: Arc<dyn FeedbackOutput>,
    prefs: Arc<Preferences>,
    catalog: TargetCatalog,
    manager: Arc<FeatureManager>,
    events: broadcast::Sender<GuideEvent>,

    session_id: Mutex<SessionId>,
    target_tx: watch::Sender<Option<SearchTarget>>,
}

impl ItemSearchSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: Arc<dyn CameraSource>,
        detector: Arc<dyn ObjectDetector>,
        speech: Arc<dyn SpeechRecognizer>,
        output: Arc<dyn FeedbackOutput>,
        prefs: Arc<Preferences>,
        catalog: TargetCatalog,
        manager: Arc<FeatureManager>,
        events: broadcast::Sender<GuideEvent>,
        config: ItemSearchConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id: FeatureId::new(),
            weak_self: weak.clone(),
            config,
            orchestrator: SessionOrchestrator::new(search_adjacency),
            pump: ContinuousFrameProcessor::new(Arc::clone(&camera), config.max_fps),
            prediction: Mutex::new(PredictionState::new(config.prediction)),
            policy: Mutex::new(FeedbackPolicy::new(SearchKind::Object)),
            bag: TaskBag::new(),
            camera,
            detector,
            speech,
            output,
            prefs,
            catalog,
            manager,
            events,
            session_id: Mutex::new(SessionId::new()),
            target_tx: watch::channel(None).0,
        })
    }

    pub fn phase(&self) -> SearchPhase {
        self.orchestrator.current()
    }

    /// Observe the phase + pause flag. Replays the current snapshot.
    pub fn subscribe_phase(&self) -> watch::Receiver<PhaseSnapshot<SearchPhase>> {
        self.orchestrator.subscribe()
    }

    /// Observe the resolved target; `None` outside a search episode.
    pub fn subscribe_target(&self) -> watch::Receiver<Option<SearchTarget>> {
        self.target_tx.subscribe()
    }

    pub fn current_target(&self) -> Option<SearchTarget> {
        self.target_tx.borrow().clone()
    }

    /// Preselected-target entry: skips query acquisition and goes straight
    /// to the match-and-announce path with the given item name.
    pub async fn start_with_target(&self, item_name: &str) -> Result<(), EngineError> {
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
        let query = item_name.to_string();
        self.bag.spawn(async move {
            me.resolve_and_announce(&query, &token).await;
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
            kind: FeatureKind::ItemSearch,
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
                // The session moved on while we were listening; the result
                // is stale and silently discarded.
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

    /// Recovery to idle from inside a bag-owned worker. The teardown
    /// cancels that very worker, so it must run detached.
    fn recover(&self) {
        if let Some(me) = self.weak_self.upgrade() {
            tokio::spawn(async move {
                me.finish(false).await;
            });
        }
    }

    /// Wait for the first final transcript, bounded by the speech timeout.
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
        self.resolve_and_announce(text, token).await;
    }

    async fn resolve_and_announce(&self, text: &str, token: &CancellationToken) {
        tracing::info!(feature = %self.id, query = text, "resolving query");
        let Some(target) = self.catalog.resolve(text) else {
            self.emit_error(EngineError::NoMatchingTarget(text.to_string()).to_string());
            let _ = self
                .output
                .speak(&format!("{text} {NOT_SUPPORTED_SUFFIX}"))
                .await;
            self.recover();
            return;
        };

        self.target_tx.send_replace(Some(target.clone()));
        if !self.orchestrator.transition(SearchPhase::Announcing) {
            return;
        }

        let phrase = format!("Searching for {}", target.item_name);
        if let Err(e) = self.output.speak(&phrase).await {
            tracing::warn!(error = %e, "announcement failed");
        }

        // The announcement may finish long after a stop; re-check before
        // advancing.
        if token.is_cancelled() || self.orchestrator.current() != SearchPhase::Announcing {
            return;
        }
        if !self.orchestrator.transition(SearchPhase::Searching) {
            return;
        }
        self.begin_searching(&target, token).await;
    }

    async fn begin_searching(&self, target: &SearchTarget, token: &CancellationToken) {
        // Model warm-up is the slowest step of the pipeline.
        if let Err(e) = self.detector.initialize(&target.model_name).await {
            if token.is_cancelled() {
                return;
            }
            self.emit_error(format!("detector init failed: {e}"));
            self.recover();
            return;
        }
        if token.is_cancelled() || self.orchestrator.current() != SearchPhase::Searching {
            return;
        }

        self.detector
            .set_confidence_threshold(self.config.confidence_threshold);
        self.detector.set_iou_threshold(self.config.iou_threshold);

        self.apply_torch(self.prefs.torch_on_search).await;
        self.spawn_search_workers(target.clone()).await;
    }

    /// Detection consumer + frame feed + auto-off. Used on entry to
    /// `Searching` and again on resume.
    async fn spawn_search_workers(&self, target: SearchTarget) {
        self.spawn_detection_consumer(target);
        self.start_frame_feed().await;
        self.arm_auto_off();
    }

    fn spawn_detection_consumer(&self, target: SearchTarget) {
        let Some(me) = self.weak_self.upgrade() else {
            return;
        };
        let token = self.bag.token();
        let mut rx = self.detector.subscribe();
        self.bag.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    batch = rx.recv() => match batch {
                        Ok(batch) => me.handle_batch(&target, batch).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "detection consumer lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    async fn handle_batch(&self, target: &SearchTarget, batch: DetectionBatch) {
        if self.orchestrator.is_paused() {
            return;
        }
        let matches: Vec<BoundingBox> = batch
            .matching(&target.item_name)
            .map(|o| o.bounds)
            .collect();
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
        let detector = Arc::clone(&self.detector);
        let started = self
            .pump
            .start(move |frame| {
                let detector = Arc::clone(&detector);
                async move {
                    detector.submit(frame).await;
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
            // Pausing tears down this bag, including the task running
            // right now — hand the teardown to a detached task.
            tokio::spawn(async move {
                me.pause().await;
            });
        });
    }

    async fn apply_torch(&self, on: bool) {
        if let Err(e) = self.camera.set_torch(on).await {
            // Torch is optional everywhere; searching continues without it.
            tracing::warn!(error = %e, "torch unavailable");
        }
    }

    /// Tear the episode down and return to idle. `completed` selects
    /// whether the `Completed` phase is visited on the way.
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

        self.target_tx.send_replace(None);
        self.prediction.lock().reset();
        self.policy.lock().reset();
        self.manager.unregister(&self.id);
        self.emit(GuideEvent::FeatureStopped {
            feature_id: self.id.clone(),
            session_id,
            kind: FeatureKind::ItemSearch,
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
impl Feature for ItemSearchSession {
    fn id(&self) -> &FeatureId {
        &self.id
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::ItemSearch
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
            // Keyboard input arrives via submit_query; the session waits
            // in Listening until then.
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
        // Target and conviction history stay frozen for resume.
        self.policy.lock().reset();
        self.manager.refresh();
    }

    async fn resume(&self) {
        if !self.orchestrator.resume() {
            return;
        }
        self.output.resume_output();
        self.apply_torch(self.prefs.torch_on_search).await;
        if let Some(target) = self.current_target() {
            self.spawn_search_workers(target).await;
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
