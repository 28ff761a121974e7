use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};

use waypoint_core::{CameraFrame, CameraSource, DeviceError};

/// Synthetic camera: every grab returns a fresh frame of seeded noise with
/// a monotonically increasing index. Records zoom/torch so tests can
/// assert against them.
pub struct SimCamera {
    width: u32,
    height: u32,
    frame_index: AtomicU64,
    running: AtomicBool,
    has_torch: bool,
    torch_on: AtomicBool,
    zoom: Mutex<f32>,
    rng: Mutex<StdRng>,
}

impl SimCamera {
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Self::build(width, height, true)
    }

    /// A device without a torch; `set_torch` reports `Unavailable`.
    pub fn without_torch(width: u32, height: u32) -> Arc<Self> {
        Self::build(width, height, false)
    }

    fn build(width: u32, height: u32, has_torch: bool) -> Arc<Self> {
        Arc::new(Self {
            width,
            height,
            frame_index: AtomicU64::new(0),
            running: AtomicBool::new(false),
            has_torch,
            torch_on: AtomicBool::new(false),
            zoom: Mutex::new(1.0),
            rng: Mutex::new(StdRng::seed_from_u64(7)),
        })
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on.load(Ordering::SeqCst)
    }

    pub fn zoom(&self) -> f32 {
        *self.zoom.lock()
    }

    pub fn frames_produced(&self) -> u64 {
        self.frame_index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraSource for SimCamera {
    async fn set_up(&self) -> Result<(), DeviceError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), DeviceError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn grab_frame(&self) -> Result<CameraFrame, DeviceError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(DeviceError::Busy("camera not started".into()));
        }
        let index = self.frame_index.fetch_add(1, Ordering::SeqCst);
        let len = (self.width * self.height) as usize;
        let mut pixels = vec![0u8; len];
        self.rng.lock().fill(pixels.as_mut_slice());
        Ok(CameraFrame::new(
            index,
            self.width,
            self.height,
            Bytes::from(pixels),
        ))
    }

    async fn set_zoom(&self, factor: f32) -> Result<(), DeviceError> {
        *self.zoom.lock() = factor;
        Ok(())
    }

    async fn set_torch(&self, on: bool) -> Result<(), DeviceError> {
        if !self.has_torch {
            return Err(DeviceError::Unavailable("torch".into()));
        }
        self.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_have_increasing_indices() {
        let camera = SimCamera::new(8, 8);
        camera.start().await.unwrap();
        let a = camera.grab_frame().await.unwrap();
        let b = camera.grab_frame().await.unwrap();
        assert!(b.index > a.index);
        assert_eq!(a.pixels.len(), 64);
    }

    #[tokio::test]
    async fn grab_before_start_fails() {
        let camera = SimCamera::new(8, 8);
        assert!(camera.grab_frame().await.is_err());
    }

    #[tokio::test]
    async fn torchless_device_degrades() {
        let camera = SimCamera::without_torch(8, 8);
        let err = camera.set_torch(true).await.unwrap_err();
        assert!(err.is_degradable());
    }

    #[tokio::test]
    async fn torch_and_zoom_are_recorded() {
        let camera = SimCamera::new(8, 8);
        camera.set_torch(true).await.unwrap();
        camera.set_zoom(2.0).await.unwrap();
        assert!(camera.torch_on());
        assert_eq!(camera.zoom(), 2.0);
    }
}
