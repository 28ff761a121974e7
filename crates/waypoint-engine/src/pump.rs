//! Bounded-cadence frame pump. Pulls one-shot frames from the camera while
//! a session is searching and hands each to the consumer callback. Pull +
//! skipped ticks means a slow consumer drops frames instead of building a
//! backlog.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use waypoint_core::{CameraFrame, CameraSource, DeviceError};

pub const DEFAULT_MAX_FPS: u32 = 15;

struct Worker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ContinuousFrameProcessor {
    camera: Arc<dyn CameraSource>,
    period: Duration,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl ContinuousFrameProcessor {
    pub fn new(camera: Arc<dyn CameraSource>, max_fps: u32) -> Self {
        let fps = max_fps.max(1);
        Self {
            camera,
            period: Duration::from_secs(1) / fps,
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Start pulling frames into `on_frame`. Calling `start` while already
    /// running is a no-op.
    pub async fn start<F, Fut>(&self, mut on_frame: F) -> Result<(), DeviceError>
    where
        F: FnMut(CameraFrame) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut slot = self.worker.lock().await;
        if slot.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            return Ok(());
        }

        self.camera.set_up().await?;
        self.camera.start().await?;

        let token = CancellationToken::new();
        let camera = Arc::clone(&self.camera);
        let loop_token = token.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        match camera.grab_frame().await {
                            Ok(frame) => on_frame(frame).await,
                            Err(DeviceError::Cancelled) => break,
                            Err(e) => {
                                tracing::warn!(error = %e, "frame grab failed");
                            }
                        }
                    }
                }
            }
        });

        *slot = Some(Worker { token, handle });
        Ok(())
    }

    /// Stop the pull loop. No `on_frame` call happens after this returns:
    /// the worker is cancelled and awaited before the camera is released.
    /// Idempotent.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(w) = worker {
            w.token.cancel();
            let _ = w.handle.await;
        }
        self.camera.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingCamera {
        frames: AtomicU64,
        started: AtomicU64,
        stopped: AtomicU64,
    }

    impl CountingCamera {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: AtomicU64::new(0),
                started: AtomicU64::new(0),
                stopped: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl CameraSource for CountingCamera {
        async fn set_up(&self) -> Result<(), DeviceError> {
            Ok(())
        }

        async fn start(&self) -> Result<(), DeviceError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        async fn grab_frame(&self) -> Result<CameraFrame, DeviceError> {
            let index = self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(CameraFrame::new(index, 4, 4, Bytes::new()))
        }

        async fn set_zoom(&self, _factor: f32) -> Result<(), DeviceError> {
            Ok(())
        }

        async fn set_torch(&self, _on: bool) -> Result<(), DeviceError> {
            Err(DeviceError::Unavailable("torch".into()))
        }
    }

    #[tokio::test]
    async fn delivers_frames_until_stopped() {
        let camera = CountingCamera::new();
        let pump = ContinuousFrameProcessor::new(camera.clone(), 100);
        let seen = Arc::new(AtomicU64::new(0));
        let seen2 = Arc::clone(&seen);

        pump.start(move |_frame| {
            let seen = Arc::clone(&seen2);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        pump.stop().await;

        let delivered = seen.load(Ordering::SeqCst);
        assert!(delivered > 0, "no frames delivered");

        // No deliveries after stop returns.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), delivered);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let camera = CountingCamera::new();
        let pump = ContinuousFrameProcessor::new(camera.clone(), 100);
        pump.start(|_| async {}).await.unwrap();
        pump.start(|_| async {}).await.unwrap();
        assert_eq!(camera.started.load(Ordering::SeqCst), 1);
        assert!(pump.is_running().await);
        pump.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let camera = CountingCamera::new();
        let pump = ContinuousFrameProcessor::new(camera.clone(), 100);
        pump.start(|_| async {}).await.unwrap();
        pump.stop().await;
        pump.stop().await;
        assert!(!pump.is_running().await);
    }

    #[tokio::test]
    async fn restart_after_stop() {
        let camera = CountingCamera::new();
        let pump = ContinuousFrameProcessor::new(camera.clone(), 100);
        pump.start(|_| async {}).await.unwrap();
        pump.stop().await;
        pump.start(|_| async {}).await.unwrap();
        assert!(pump.is_running().await);
        assert_eq!(camera.started.load(Ordering::SeqCst), 2);
        pump.stop().await;
    }
}
