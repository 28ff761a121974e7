//! Thin projection layer between feature activation and the UI: app-wide
//! mode, zoom level, button availability, and the aggregated processing
//! state. Enforces the shared-singleton policy — activating any feature
//! stops whatever was running first, so at most one feature is ever live.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

use waypoint_core::{CameraSource, FeedbackOutput, GuideEvent, StopReason};

use crate::error::EngineError;
use crate::lifecycle::Feature;
use crate::session::{ItemSearchSession, ReadTextSession, TextSearchSession};
use crate::stop::StopController;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    Idle,
    ItemSearch,
    TextSearch,
    Reading,
}

/// UI-facing aggregate of the active feature's state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Idle,
    Running,
    Paused,
    Error(String),
}

/// Which controls the UI should offer in the current mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonStates {
    pub search_item_enabled: bool,
    pub search_text_enabled: bool,
    pub read_enabled: bool,
    pub stop_visible: bool,
}

/// Zoom projection per mode. Text modes get a tighter crop so small print
/// fills more of the detector's input.
pub fn zoom_for(mode: AppMode) -> f32 {
    match mode {
        AppMode::Idle | AppMode::ItemSearch => 1.0,
        AppMode::TextSearch => 1.5,
        AppMode::Reading => 2.0,
    }
}

pub struct ModeCoordinator {
    stop: Arc<StopController>,
    camera: Arc<dyn CameraSource>,
    output: Arc<dyn FeedbackOutput>,
    item: Arc<ItemSearchSession>,
    text: Arc<TextSearchSession>,
    read: Arc<ReadTextSession>,
    mode_tx: watch::Sender<AppMode>,
    processing_tx: watch::Sender<ProcessingState>,
    // Serializes activations so two rapid mode taps cannot interleave
    // their stop/start sequences.
    activation: tokio::sync::Mutex<()>,
}

impl ModeCoordinator {
    pub fn new(
        stop: Arc<StopController>,
        camera: Arc<dyn CameraSource>,
        output: Arc<dyn FeedbackOutput>,
        item: Arc<ItemSearchSession>,
        text: Arc<TextSearchSession>,
        read: Arc<ReadTextSession>,
    ) -> Arc<Self> {
        Arc::new(Self {
            stop,
            camera,
            output,
            item,
            text,
            read,
            mode_tx: watch::channel(AppMode::Idle).0,
            processing_tx: watch::channel(ProcessingState::Idle).0,
            activation: tokio::sync::Mutex::new(()),
        })
    }

    pub fn mode(&self) -> AppMode {
        *self.mode_tx.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<AppMode> {
        self.mode_tx.subscribe()
    }

    pub fn processing_state(&self) -> ProcessingState {
        self.processing_tx.borrow().clone()
    }

    pub fn subscribe_processing(&self) -> watch::Receiver<ProcessingState> {
        self.processing_tx.subscribe()
    }

    pub fn button_states(&self) -> ButtonStates {
        let busy = !matches!(self.processing_state(), ProcessingState::Idle);
        ButtonStates {
            search_item_enabled: !busy,
            search_text_enabled: !busy,
            read_enabled: !busy,
            stop_visible: busy,
        }
    }

    /// Switch the app into a mode. Whatever ran before is stopped first and
    /// stale feedback output is silenced before the new feature may speak.
    pub async fn activate(&self, mode: AppMode) -> Result<(), EngineError> {
        let _guard = self.activation.lock().await;

        self.stop.stop_all(StopReason::Programmatic).await;
        self.output.stop_and_suspend();
        self.output.resume_output();

        if let Err(e) = self.camera.set_zoom(zoom_for(mode)).await {
            tracing::warn!(error = %e, "zoom unavailable");
        }

        let result = match mode {
            AppMode::Idle => Ok(()),
            AppMode::ItemSearch => self.item.start().await,
            AppMode::TextSearch => self.text.start().await,
            AppMode::Reading => self.read.start().await,
        };

        match result {
            Ok(()) => {
                self.mode_tx.send_replace(mode);
                self.refresh_processing();
                Ok(())
            }
            Err(e) => {
                self.mode_tx.send_replace(AppMode::Idle);
                self.processing_tx
                    .send_replace(ProcessingState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// User-initiated global stop.
    pub async fn stop_everything(&self) {
        let _guard = self.activation.lock().await;
        self.stop.stop_all(StopReason::User).await;
        self.mode_tx.send_replace(AppMode::Idle);
        self.refresh_processing();
    }

    /// Pause or resume the active feature.
    pub async fn toggle_pause(&self) {
        match self.mode() {
            AppMode::Idle => return,
            AppMode::ItemSearch => {
                if self.item_paused() {
                    self.item.resume().await;
                } else {
                    self.item.pause().await;
                }
            }
            AppMode::TextSearch => {
                if self.text_paused() {
                    self.text.resume().await;
                } else {
                    self.text.pause().await;
                }
            }
            AppMode::Reading => {
                if self.read_paused() {
                    self.read.resume().await;
                } else {
                    self.read.pause().await;
                }
            }
        }
        self.refresh_processing();
    }

    /// Recompute the aggregate from the active feature's snapshot. Also
    /// driven by the projection task on every upstream change.
    pub fn refresh_processing(&self) {
        let state = self.derive_processing();
        self.processing_tx.send_replace(state);
    }

    fn derive_processing(&self) -> ProcessingState {
        let (running, paused) = match self.mode() {
            AppMode::Idle => (false, false),
            AppMode::ItemSearch => (self.item.is_running(), self.item_paused()),
            AppMode::TextSearch => (self.text.is_running(), self.text_paused()),
            AppMode::Reading => (self.read.is_running(), self.read_paused()),
        };
        match (running, paused) {
            (false, _) => ProcessingState::Idle,
            (true, false) => ProcessingState::Running,
            (true, true) => ProcessingState::Paused,
        }
    }

    fn item_paused(&self) -> bool {
        self.item.subscribe_phase().borrow().paused
    }

    fn text_paused(&self) -> bool {
        self.text.subscribe_phase().borrow().paused
    }

    fn read_paused(&self) -> bool {
        self.read.subscribe_phase().borrow().paused
    }

    /// Spawn the reactive projection: phase changes from any session and
    /// error events both land in the processing-state watch. Returns the
    /// task handle; the composition root owns its lifetime.
    pub fn spawn_projection(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<GuideEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let me = Arc::clone(self);
        let mut item_rx = self.item.subscribe_phase();
        let mut text_rx = self.text.subscribe_phase();
        let mut read_rx = self.read.subscribe_phase();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = item_rx.changed() => {
                        if changed.is_err() { break; }
                        me.refresh_processing();
                    }
                    changed = text_rx.changed() => {
                        if changed.is_err() { break; }
                        me.refresh_processing();
                    }
                    changed = read_rx.changed() => {
                        if changed.is_err() { break; }
                        me.refresh_processing();
                    }
                    event = events.recv() => match event {
                        Ok(GuideEvent::Error { message, .. }) => {
                            me.processing_tx
                                .send_replace(ProcessingState::Error(message));
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "projection lagged, dropped events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Feature, FeatureManager};
    use crate::session::{
        ItemSearchConfig, ReadTextConfig, SearchPhase, TextSearchConfig,
    };
    use std::time::Duration;
    use waypoint_core::{Preferences, TargetCatalog};
    use waypoint_sim::{
        RecordingOutput, SimCamera, SimObjectDetector, SimSpeechRecognizer, SimTextRecognizer,
    };

    struct World {
        coordinator: Arc<ModeCoordinator>,
        manager: Arc<FeatureManager>,
        item: Arc<ItemSearchSession>,
        read: Arc<ReadTextSession>,
    }

    fn world() -> World {
        let camera = SimCamera::new(64, 64);
        let detector = SimObjectDetector::new();
        let text_recognizer = SimTextRecognizer::new();
        let speech = SimSpeechRecognizer::with_final_transcript("keys", Duration::from_millis(10));
        let output = RecordingOutput::new();
        let prefs = Arc::new(Preferences::default());
        let manager = Arc::new(FeatureManager::new());
        let (events_tx, _) = broadcast::channel(64);

        let item = ItemSearchSession::new(
            camera.clone(),
            detector,
            speech.clone(),
            output.clone(),
            Arc::clone(&prefs),
            TargetCatalog::builtin(),
            Arc::clone(&manager),
            events_tx.clone(),
            ItemSearchConfig {
                speech_timeout: Duration::from_millis(200),
                max_fps: 100,
                ..Default::default()
            },
        );
        let text = TextSearchSession::new(
            camera.clone(),
            text_recognizer.clone(),
            speech,
            output.clone(),
            Arc::clone(&prefs),
            Arc::clone(&manager),
            events_tx.clone(),
            TextSearchConfig {
                speech_timeout: Duration::from_millis(200),
                max_fps: 100,
                ..Default::default()
            },
        );
        let read = ReadTextSession::new(
            camera.clone(),
            text_recognizer,
            output.clone(),
            prefs,
            Arc::clone(&manager),
            events_tx.clone(),
            ReadTextConfig {
                max_fps: 100,
                ..Default::default()
            },
        );

        let stop = Arc::new(StopController::new(Arc::clone(&manager), events_tx));
        let coordinator = ModeCoordinator::new(
            stop,
            camera,
            output,
            Arc::clone(&item),
            text,
            Arc::clone(&read),
        );
        World {
            coordinator,
            manager,
            item,
            read,
        }
    }

    #[tokio::test]
    async fn activation_stops_previous_feature() {
        let w = world();
        w.coordinator.activate(AppMode::Reading).await.unwrap();
        assert!(w.read.is_running());

        w.coordinator.activate(AppMode::ItemSearch).await.unwrap();
        assert!(!w.read.is_running());
        assert!(w.item.is_running());
        assert_eq!(w.manager.running().len(), 1);

        w.coordinator.stop_everything().await;
    }

    #[tokio::test]
    async fn stop_everything_returns_to_idle() {
        let w = world();
        w.coordinator.activate(AppMode::Reading).await.unwrap();
        w.coordinator.stop_everything().await;

        assert_eq!(w.coordinator.mode(), AppMode::Idle);
        assert_eq!(w.coordinator.processing_state(), ProcessingState::Idle);
        assert!(w.manager.running().is_empty());
    }

    #[tokio::test]
    async fn processing_state_tracks_pause() {
        let w = world();
        w.coordinator.activate(AppMode::Reading).await.unwrap();
        assert_eq!(w.coordinator.processing_state(), ProcessingState::Running);

        w.coordinator.toggle_pause().await;
        assert_eq!(w.coordinator.processing_state(), ProcessingState::Paused);
        assert_eq!(w.read.phase(), SearchPhase::Searching);

        w.coordinator.toggle_pause().await;
        assert_eq!(w.coordinator.processing_state(), ProcessingState::Running);

        w.coordinator.stop_everything().await;
    }

    #[tokio::test]
    async fn buttons_follow_processing_state() {
        let w = world();
        let idle = w.coordinator.button_states();
        assert!(idle.search_item_enabled);
        assert!(!idle.stop_visible);

        w.coordinator.activate(AppMode::Reading).await.unwrap();
        let busy = w.coordinator.button_states();
        assert!(!busy.read_enabled);
        assert!(busy.stop_visible);

        w.coordinator.stop_everything().await;
    }

    #[tokio::test]
    async fn projection_reports_errors() {
        let w = world();
        let (events_tx, events_rx) = broadcast::channel(16);
        let _task = w.coordinator.spawn_projection(events_rx);

        events_tx
            .send(GuideEvent::Error {
                feature_id: None,
                message: "detector offline".into(),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            w.coordinator.processing_state(),
            ProcessingState::Error("detector offline".into())
        );
    }

    #[test]
    fn zoom_projection_per_mode() {
        assert_eq!(zoom_for(AppMode::Idle), 1.0);
        assert!(zoom_for(AppMode::TextSearch) > zoom_for(AppMode::ItemSearch));
        assert!(zoom_for(AppMode::Reading) > zoom_for(AppMode::TextSearch));
    }
}
