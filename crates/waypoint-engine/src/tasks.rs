//! Per-episode cancellation. Every async worker a session owns (speech
//! acquisition, detection consumption, auto-off timers) is spawned through
//! the session's [`TaskBag`]; `cancel_all` tears the whole group down and
//! re-arms the bag for the next episode.

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct BagInner {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

pub struct TaskBag {
    inner: Mutex<BagInner>,
}

impl TaskBag {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BagInner {
                token: CancellationToken::new(),
                handles: Vec::new(),
            }),
        }
    }

    /// The current episode's token. Workers must check it at every
    /// continuation before touching state.
    pub fn token(&self) -> CancellationToken {
        self.inner.lock().token.clone()
    }

    /// Spawn a worker tied to the current episode.
    pub fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut inner = self.inner.lock();
        inner.handles.retain(|h| !h.is_finished());
        inner.handles.push(handle);
    }

    /// How many workers are still alive.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .handles
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel and await every worker of the current episode, then re-arm
    /// with a fresh token. The token and handles are taken in one locked
    /// step, so workers spawned afterwards belong to the next episode.
    pub async fn cancel_all(&self) {
        let (token, handles) = {
            let mut inner = self.inner.lock();
            let token = std::mem::replace(&mut inner.token, CancellationToken::new());
            let handles = std::mem::take(&mut inner.handles);
            (token, handles)
        };
        token.cancel();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Default for TaskBag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_all_stops_workers() {
        let bag = TaskBag::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            let token = bag.token();
            bag.spawn(async move {
                token.cancelled().await;
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        bag.cancel_all().await;
        // Workers either ran their cancellation arm or were aborted; in
        // both cases none are left.
        assert!(bag.is_empty());
    }

    #[tokio::test]
    async fn bag_rearms_after_cancel() {
        let bag = TaskBag::new();
        let old = bag.token();
        bag.cancel_all().await;
        let new = bag.token();
        assert!(old.is_cancelled());
        assert!(!new.is_cancelled());
    }

    #[tokio::test]
    async fn workers_spawned_after_cancel_survive() {
        let bag = TaskBag::new();
        bag.cancel_all().await;
        let flag = Arc::new(AtomicUsize::new(0));
        let flag2 = Arc::clone(&flag);
        bag.spawn(async move {
            flag2.store(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(flag.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finished_handles_are_pruned() {
        let bag = TaskBag::new();
        bag.spawn(async {});
        tokio::time::sleep(Duration::from_millis(20)).await;
        bag.spawn(async { tokio::time::sleep(Duration::from_secs(5)).await });
        assert_eq!(bag.len(), 1);
        bag.cancel_all().await;
    }
}
