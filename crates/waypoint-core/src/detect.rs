use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::detection::{CameraFrame, DetectionBatch, TextBatch};
use crate::errors::DeviceError;

/// Trait implemented by the object-detection integration. Inference runs
/// elsewhere; the engine submits frames and consumes batches from the
/// multi-consumer broadcast stream.
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Load the named model. May take long enough that the session has
    /// moved on by the time it completes — callers must re-check.
    async fn initialize(&self, model_name: &str) -> Result<(), DeviceError>;

    fn set_confidence_threshold(&self, value: f32);
    fn set_iou_threshold(&self, value: f32);

    /// Submit one frame for inference. Results arrive on the batch stream,
    /// not as a return value.
    async fn submit(&self, frame: CameraFrame);

    /// Subscribe to detection batches. Multiple consumers are allowed;
    /// each gets every batch from the point of subscription.
    fn subscribe(&self) -> broadcast::Receiver<DetectionBatch>;
}

/// Trait implemented by the text-recognition integration. Mirrors
/// [`ObjectDetector`] with text blocks instead of object boxes.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn submit(&self, frame: CameraFrame);

    fn subscribe(&self) -> broadcast::Receiver<TextBatch>;
}
