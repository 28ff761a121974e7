//! Generic session state machine. One orchestrator owns one feature's
//! phase; every transition goes through [`SessionOrchestrator::transition`]
//! and is checked against the adjacency predicate supplied at construction.
//! Pausing is orthogonal to the phase value and only takes effect while the
//! phase reports itself active.

use parking_lot::Mutex;
use tokio::sync::watch;

/// Implemented by each feature's phase enum.
pub trait Phase: Copy + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    /// The reset state, reachable from anywhere.
    const IDLE: Self;

    /// Whether this phase supports suspension (frame/detection processing
    /// is underway).
    fn is_active(&self) -> bool;
}

/// The pair observers see: phase plus the orthogonal pause flag. Published
/// atomically so no subscriber reads a torn combination.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseSnapshot<S> {
    pub state: S,
    pub paused: bool,
}

struct Inner<S> {
    state: S,
    paused: bool,
}

/// Single source of truth for a feature's phase.
pub struct SessionOrchestrator<S: Phase> {
    inner: Mutex<Inner<S>>,
    allowed: fn(S, S) -> bool,
    tx: watch::Sender<PhaseSnapshot<S>>,
}

impl<S: Phase> SessionOrchestrator<S> {
    pub fn new(allowed: fn(S, S) -> bool) -> Self {
        let (tx, _) = watch::channel(PhaseSnapshot {
            state: S::IDLE,
            paused: false,
        });
        Self {
            inner: Mutex::new(Inner {
                state: S::IDLE,
                paused: false,
            }),
            allowed,
            tx,
        }
    }

    /// Request a transition. Succeeds iff the adjacency predicate allows
    /// `(current, to)`, or `to` is the idle state (forced reset). On
    /// failure the state is untouched and the caller must treat the intent
    /// as ignored — this is a rejection, not an error.
    pub fn transition(&self, to: S) -> bool {
        let mut inner = self.inner.lock();
        if to != S::IDLE && !(self.allowed)(inner.state, to) {
            tracing::debug!(from = ?inner.state, to = ?to, "transition rejected");
            return false;
        }
        inner.state = to;
        if to == S::IDLE {
            // A forced reset also lifts any suspension.
            inner.paused = false;
        }
        self.publish(&inner);
        true
    }

    /// Suspend processing. No-op unless the current phase is active and
    /// not already paused. Returns whether the flag changed.
    pub fn pause(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.is_active() || inner.paused {
            return false;
        }
        inner.paused = true;
        self.publish(&inner);
        true
    }

    /// Lift a suspension. Returns whether the flag changed.
    pub fn resume(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.paused {
            return false;
        }
        inner.paused = false;
        self.publish(&inner);
        true
    }

    pub fn current(&self) -> S {
        self.inner.lock().state
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn snapshot(&self) -> PhaseSnapshot<S> {
        let inner = self.inner.lock();
        PhaseSnapshot {
            state: inner.state,
            paused: inner.paused,
        }
    }

    /// Subscribe to state changes. New subscribers immediately observe the
    /// current snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PhaseSnapshot<S>> {
        self.tx.subscribe()
    }

    // Publish under the lock so the watch value ordering matches the
    // mutation ordering.
    fn publish(&self, inner: &Inner<S>) {
        self.tx.send_replace(PhaseSnapshot {
            state: inner.state,
            paused: inner.paused,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Demo {
        Idle,
        Warming,
        Active,
    }

    impl Phase for Demo {
        const IDLE: Self = Demo::Idle;

        fn is_active(&self) -> bool {
            matches!(self, Demo::Active)
        }
    }

    fn adjacency(from: Demo, to: Demo) -> bool {
        matches!(
            (from, to),
            (Demo::Idle, Demo::Warming) | (Demo::Warming, Demo::Active)
        )
    }

    fn orch() -> SessionOrchestrator<Demo> {
        SessionOrchestrator::new(adjacency)
    }

    #[test]
    fn legal_transitions_succeed() {
        let o = orch();
        assert!(o.transition(Demo::Warming));
        assert!(o.transition(Demo::Active));
        assert_eq!(o.current(), Demo::Active);
    }

    #[test]
    fn illegal_transition_is_rejected_and_state_unchanged() {
        let o = orch();
        assert!(!o.transition(Demo::Active));
        assert_eq!(o.current(), Demo::Idle);
    }

    #[test]
    fn idle_is_reachable_from_anywhere() {
        let o = orch();
        o.transition(Demo::Warming);
        o.transition(Demo::Active);
        assert!(o.transition(Demo::Idle));
        assert_eq!(o.current(), Demo::Idle);
    }

    #[test]
    fn pause_only_in_active_phase() {
        let o = orch();
        assert!(!o.pause());
        o.transition(Demo::Warming);
        assert!(!o.pause());
        o.transition(Demo::Active);
        assert!(o.pause());
        assert!(o.is_paused());
        // Pausing again is a no-op.
        assert!(!o.pause());
    }

    #[test]
    fn pause_does_not_change_state() {
        let o = orch();
        o.transition(Demo::Warming);
        o.transition(Demo::Active);
        o.pause();
        assert_eq!(o.current(), Demo::Active);
    }

    #[test]
    fn reset_clears_pause() {
        let o = orch();
        o.transition(Demo::Warming);
        o.transition(Demo::Active);
        o.pause();
        o.transition(Demo::Idle);
        assert!(!o.is_paused());
    }

    #[test]
    fn subscribers_replay_current_value() {
        let o = orch();
        o.transition(Demo::Warming);
        let rx = o.subscribe();
        assert_eq!(
            *rx.borrow(),
            PhaseSnapshot {
                state: Demo::Warming,
                paused: false
            }
        );
    }

    #[tokio::test]
    async fn watch_observes_pause_flag() {
        let o = orch();
        let mut rx = o.subscribe();
        o.transition(Demo::Warming);
        o.transition(Demo::Active);
        o.pause();
        rx.changed().await.unwrap();
        let snap = *rx.borrow_and_update();
        assert!(snap.paused);
        assert_eq!(snap.state, Demo::Active);
    }
}
