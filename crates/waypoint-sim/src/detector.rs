use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use waypoint_core::{
    CameraFrame, DetectedObject, DetectionBatch, DeviceError, ObjectDetector, RecognizedText,
    TextBatch, TextRecognizer,
};

const CHANNEL_CAPACITY: usize = 64;

/// Scripted object detector. Each submitted frame consumes the next script
/// entry and broadcasts it as that frame's batch; with the script empty,
/// submissions produce nothing. `publish` injects a batch directly,
/// bypassing frame pacing entirely.
pub struct SimObjectDetector {
    script: Mutex<VecDeque<Vec<DetectedObject>>>,
    tx: broadcast::Sender<DetectionBatch>,
    model: Mutex<Option<String>>,
    confidence_threshold: Mutex<f32>,
    iou_threshold: Mutex<f32>,
    submissions: AtomicU64,
}

impl SimObjectDetector {
    pub fn new() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Vec<DetectedObject>>) -> Arc<Self> {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            script: Mutex::new(script.into()),
            tx,
            model: Mutex::new(None),
            confidence_threshold: Mutex::new(0.0),
            iou_threshold: Mutex::new(0.0),
            submissions: AtomicU64::new(0),
        })
    }

    pub fn publish(&self, batch: DetectionBatch) {
        let _ = self.tx.send(batch);
    }

    pub fn initialized_model(&self) -> Option<String> {
        self.model.lock().clone()
    }

    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectDetector for SimObjectDetector {
    async fn initialize(&self, model_name: &str) -> Result<(), DeviceError> {
        *self.model.lock() = Some(model_name.to_string());
        Ok(())
    }

    fn set_confidence_threshold(&self, value: f32) {
        *self.confidence_threshold.lock() = value;
    }

    fn set_iou_threshold(&self, value: f32) {
        *self.iou_threshold.lock() = value;
    }

    async fn submit(&self, frame: CameraFrame) {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let objects = self.script.lock().pop_front();
        if let Some(objects) = objects {
            let _ = self.tx.send(DetectionBatch {
                frame_index: frame.index,
                objects,
            });
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<DetectionBatch> {
        self.tx.subscribe()
    }
}

/// Scripted text recognizer, mirroring [`SimObjectDetector`] with text
/// blocks.
pub struct SimTextRecognizer {
    script: Mutex<VecDeque<Vec<RecognizedText>>>,
    tx: broadcast::Sender<TextBatch>,
    submissions: AtomicU64,
}

impl SimTextRecognizer {
    pub fn new() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Vec<RecognizedText>>) -> Arc<Self> {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            script: Mutex::new(script.into()),
            tx,
            submissions: AtomicU64::new(0),
        })
    }

    pub fn publish(&self, batch: TextBatch) {
        let _ = self.tx.send(batch);
    }

    pub fn submissions(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextRecognizer for SimTextRecognizer {
    async fn submit(&self, frame: CameraFrame) {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        let blocks = self.script.lock().pop_front();
        if let Some(blocks) = blocks {
            let _ = self.tx.send(TextBatch {
                frame_index: frame.index,
                blocks,
            });
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<TextBatch> {
        self.tx.subscribe()
    }
}
