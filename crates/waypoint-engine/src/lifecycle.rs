//! Feature lifecycle contract and the process-wide registry of features.
//! Features register themselves on `start` and unregister on `stop`; the
//! "currently running" set is always recomputed from `is_running`, never
//! stored, so it cannot drift from the features' own state.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;

use waypoint_core::{FeatureId, FeatureKind};

use crate::error::EngineError;

/// The four lifecycle commands every long-running feature implements, plus
/// the derived running flag. `pause`/`resume` default to no-ops for
/// features that do not support suspension.
#[async_trait]
pub trait Feature: Send + Sync {
    fn id(&self) -> &FeatureId;
    fn kind(&self) -> FeatureKind;

    /// True while the feature is neither idle nor completed.
    fn is_running(&self) -> bool;

    /// Begin a session. Calling `start` on a running feature is a no-op.
    async fn start(&self) -> Result<(), EngineError>;

    async fn pause(&self) {}

    async fn resume(&self) {}

    /// End the session. Must leave `is_running() == false` before
    /// returning. Calling `stop` on an idle feature is a no-op.
    async fn stop(&self);
}

/// Registry of features, keyed by their opaque ids. Explicitly maintained:
/// membership changes only through `register`/`unregister`, and features
/// signal running-flag changes with `refresh` — the registry never polls.
pub struct FeatureManager {
    features: DashMap<FeatureId, Arc<dyn Feature>>,
    running_tx: watch::Sender<Vec<FeatureId>>,
}

impl FeatureManager {
    pub fn new() -> Self {
        let (running_tx, _) = watch::channel(Vec::new());
        Self {
            features: DashMap::new(),
            running_tx,
        }
    }

    pub fn register(&self, feature: Arc<dyn Feature>) {
        self.features.insert(feature.id().clone(), feature);
        self.refresh();
    }

    pub fn unregister(&self, id: &FeatureId) {
        self.features.remove(id);
        self.refresh();
    }

    pub fn get(&self, id: &FeatureId) -> Option<Arc<dyn Feature>> {
        self.features.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// The registered features currently running.
    pub fn running(&self) -> Vec<Arc<dyn Feature>> {
        self.features
            .iter()
            .filter(|e| e.value().is_running())
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    /// Recompute and republish the running set. Features call this after
    /// any change to their running flag.
    pub fn refresh(&self) {
        let mut running: Vec<FeatureId> = self
            .features
            .iter()
            .filter(|e| e.value().is_running())
            .map(|e| e.key().clone())
            .collect();
        running.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        self.running_tx.send_replace(running);
    }

    /// Observe the running set. Replays the current value to new
    /// subscribers.
    pub fn subscribe_running(&self) -> watch::Receiver<Vec<FeatureId>> {
        self.running_tx.subscribe()
    }
}

impl Default for FeatureManager {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::StubFeature;
    use super::*;

    #[tokio::test]
    async fn running_set_follows_feature_state() {
        let manager = FeatureManager::new();
        let feature = StubFeature::new(FeatureKind::ItemSearch);
        manager.register(feature.clone());
        assert!(manager.running().is_empty());

        feature.start().await.unwrap();
        manager.refresh();
        assert_eq!(manager.running().len(), 1);

        feature.stop().await;
        manager.refresh();
        assert!(manager.running().is_empty());
    }

    #[test]
    fn registry_membership_is_explicit() {
        let manager = FeatureManager::new();
        let feature = StubFeature::new(FeatureKind::ReadText);
        let id = feature.id().clone();
        manager.register(feature);
        assert_eq!(manager.len(), 1);
        assert!(manager.get(&id).is_some());
        manager.unregister(&id);
        assert!(manager.is_empty());
        assert!(manager.get(&id).is_none());
    }

    #[tokio::test]
    async fn running_watch_publishes_on_refresh() {
        let manager = FeatureManager::new();
        let rx = manager.subscribe_running();
        let feature = StubFeature::new(FeatureKind::TextSearch);
        manager.register(feature.clone());
        feature.start().await.unwrap();
        manager.refresh();
        assert_eq!(rx.borrow().len(), 1);
        assert_eq!(rx.borrow()[0], *feature.id());
    }

    #[test]
    fn reregistering_same_id_does_not_duplicate() {
        let manager = FeatureManager::new();
        let feature = StubFeature::new(FeatureKind::ItemSearch);
        manager.register(feature.clone());
        manager.register(feature);
        assert_eq!(manager.len(), 1);
    }
}
