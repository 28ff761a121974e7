//! Continuous hands-free reading. No query acquisition: the session goes
//! straight to the active phase, pumps frames into the text recognizer,
//! and speaks each newly-seen block. Consecutive identical frames are
//! deduplicated so a sign held in view is read once, not on every frame.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use waypoint_core::{
    CameraSource, FeatureId, FeatureKind, FeedbackOutput, GuideEvent, Preferences, SessionId,
    TextBatch, TextRecognizer,
};

use crate::error::EngineError;
use crate::lifecycle::{Feature, FeatureManager};
use crate::orchestrator::{PhaseSnapshot, SessionOrchestrator};
use crate::pump::{ContinuousFrameProcessor, DEFAULT_MAX_FPS};
use crate::tasks::TaskBag;

use super::{read_adjacency, SearchPhase, AUTO_OFF_NOTICE, AUTO_OFF_WARNING};

#[derive(Clone, Copy, Debug)]
pub struct ReadTextConfig {
    pub max_fps: u32,
    /// Blocks below this recognizer confidence are not read aloud.
    pub min_confidence: f32,
}

impl Default for ReadTextConfig {
    fn default() -> Self {
        Self {
            max_fps: DEFAULT_MAX_FPS,
            min_confidence: 0.5,
        }
    }
}

pub struct ReadTextSession {
    id: FeatureId,
    weak_self: Weak<ReadTextSession>,
    config: ReadTextConfig,

    orchestrator: SessionOrchestrator<SearchPhase>,
    pump: ContinuousFrameProcessor,
    bag: TaskBag,

    camera: Arc<dyn CameraSource>,
    recognizer: Arc<dyn TextRecognizer>,
    output: Arc<dyn FeedbackOutput>,
    prefs: Arc<Preferences>,
    manager: Arc<FeatureManager>,
    events: broadcast::Sender<GuideEvent>,

    session_id: Mutex<SessionId>,
    last_read: Mutex<Option<String>>,
}

impl ReadTextSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: Arc<dyn CameraSource>,
        recognizer: Arc<dyn TextRecognizer>,
        output: Arc<dyn FeedbackOutput>,
        prefs: Arc<Preferences>,
        manager: Arc<FeatureManager>,
        events: broadcast::Sender<GuideEvent>,
        config: ReadTextConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            id: FeatureId::new(),
            weak_self: weak.clone(),
            config,
            orchestrator: SessionOrchestrator::new(read_adjacency),
            pump: ContinuousFrameProcessor::new(Arc::clone(&camera), config.max_fps),
            bag: TaskBag::new(),
            camera,
            recognizer,
            output,
            prefs,
            manager,
            events,
            session_id: Mutex::new(SessionId::new()),
            last_read: Mutex::new(None),
        })
    }

    pub fn phase(&self) -> SearchPhase {
        self.orchestrator.current()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<PhaseSnapshot<SearchPhase>> {
        self.orchestrator.subscribe()
    }

    async fn spawn_read_workers(&self) {
        self.spawn_text_consumer();
        self.start_frame_feed().await;
        self.arm_auto_off();
    }

    fn spawn_text_consumer(&self) {
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
                        Ok(batch) => me.read_batch(batch).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "read consumer lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    async fn read_batch(&self, batch: TextBatch) {
        if self.orchestrator.is_paused() {
            return;
        }
        let passage = batch
            .blocks
            .iter()
            .filter(|b| b.confidence >= self.config.min_confidence)
            .map(|b| b.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if passage.is_empty() {
            return;
        }

        // A sign held in view recognizes identically frame after frame.
        {
            let mut last = self.last_read.lock();
            if last.as_deref() == Some(passage.as_str()) {
                return;
            }
            *last = Some(passage.clone());
        }

        if let Err(e) = self.output.speak(&passage).await {
            tracing::debug!(error = %e, "passage dropped");
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
        self.apply_torch(false).await;
        self.output.stop_and_suspend();

        if completed {
            self.orchestrator.transition(SearchPhase::Completed);
        }
        self.orchestrator.transition(SearchPhase::Idle);

        *self.last_read.lock() = None;
        self.manager.unregister(&self.id);
        self.emit(GuideEvent::FeatureStopped {
            feature_id: self.id.clone(),
            session_id,
            kind: FeatureKind::ReadText,
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
impl Feature for ReadTextSession {
    fn id(&self) -> &FeatureId {
        &self.id
    }

    fn kind(&self) -> FeatureKind {
        FeatureKind::ReadText
    }

    fn is_running(&self) -> bool {
        self.orchestrator.current().is_running()
    }

    async fn start(&self) -> Result<(), EngineError> {
        if self.is_running() {
            return Ok(());
        }
        if !self.orchestrator.transition(SearchPhase::Searching) {
            return Ok(());
        }

        let session_id = SessionId::new();
        *self.session_id.lock() = session_id.clone();
        if let Some(me) = self.weak_self.upgrade() {
            self.manager.register(me);
        }
        self.emit(GuideEvent::FeatureStarted {
            feature_id: self.id.clone(),
            session_id,
            kind: FeatureKind::ReadText,
        });

        self.output.set_reading_rate(self.prefs.reading_rate);
        self.apply_torch(self.prefs.torch_on_search).await;
        self.spawn_read_workers().await;
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
        self.manager.refresh();
    }

    async fn resume(&self) {
        if !self.orchestrator.resume() {
            return;
        }
        self.output.resume_output();
        self.apply_torch(self.prefs.torch_on_search).await;
        self.spawn_read_workers().await;
        self.manager.refresh();
    }

    async fn stop(&self) {
        if !self.is_running() {
            return;
        }
        self.finish(true).await;
    }
}
