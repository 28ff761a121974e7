use async_trait::async_trait;

use crate::detection::CameraFrame;
use crate::errors::DeviceError;

/// Trait implemented by the camera integration. The engine never talks to
/// capture hardware directly; it pulls one-shot frames through this seam so
/// a slow consumer naturally drops frames instead of queuing them.
///
/// Only one continuous consumer (the frame pump) is expected at a time.
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Prepare the capture pipeline. Idempotent.
    async fn set_up(&self) -> Result<(), DeviceError>;

    /// Begin producing frames. Idempotent.
    async fn start(&self) -> Result<(), DeviceError>;

    /// Stop producing frames. Idempotent.
    async fn stop(&self);

    /// Retrieve the most recent frame. Never blocks on the sensor cadence:
    /// returns the latest frame already captured.
    async fn grab_frame(&self) -> Result<CameraFrame, DeviceError>;

    /// Set the zoom factor (1.0 = no zoom).
    async fn set_zoom(&self, factor: f32) -> Result<(), DeviceError>;

    /// Toggle the torch. `Err(DeviceError::Unavailable)` when the device
    /// has none; callers degrade rather than fail.
    async fn set_torch(&self, on: bool) -> Result<(), DeviceError>;
}
