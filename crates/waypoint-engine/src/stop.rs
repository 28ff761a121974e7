//! Single global stop entry point. Stops every running feature, then
//! broadcasts one stop event so feedback-output components can self-silence
//! without holding a reference to the feature that was stopped.

use std::sync::Arc;

use tokio::sync::broadcast;

use waypoint_core::{GuideEvent, LogLevel, StopReason};

use crate::lifecycle::FeatureManager;

pub struct StopController {
    manager: Arc<FeatureManager>,
    events: broadcast::Sender<GuideEvent>,
}

impl StopController {
    pub fn new(manager: Arc<FeatureManager>, events: broadcast::Sender<GuideEvent>) -> Self {
        Self { manager, events }
    }

    /// Stop every running feature and broadcast the stop. Returns how many
    /// features were stopped. Postcondition: the manager's running set is
    /// empty — every `stop` leaves its feature non-running before it
    /// returns, anything else is a defect and logged as one.
    pub async fn stop_all(&self, reason: StopReason) -> usize {
        let running = self.manager.running();
        let count = running.len();

        for feature in running {
            tracing::debug!(feature = %feature.id(), kind = feature.kind().label(), "stopping");
            feature.stop().await;
            if feature.is_running() {
                tracing::error!(
                    feature = %feature.id(),
                    "feature still running after stop() returned"
                );
            }
        }

        let remaining = self.manager.running().len();
        if remaining > 0 {
            tracing::error!(remaining, "running set not empty after stop_all");
        }

        if count > 0 {
            let _ = self.events.send(GuideEvent::Log {
                level: LogLevel::Info,
                message: format!("stopped {count} running features"),
            });
        }
        let _ = self.events.send(GuideEvent::AllStopped { reason });
        count
    }
}
