use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// One camera frame as handed to detectors. The pixel buffer is shared,
/// never copied, between the pump and whatever consumers it reaches.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    /// Monotonic frame counter assigned by the source.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Bytes,
}

impl CameraFrame {
    pub fn new(index: u64, width: u32, height: u32, pixels: Bytes) -> Self {
        Self { index, width, height, pixels }
    }
}

/// A single detected object in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    /// Model label, e.g. "Keys".
    pub label: String,
    /// Model confidence in `[0, 1]`.
    pub confidence: f32,
    pub bounds: BoundingBox,
}

/// All objects the detector reported for one frame. An empty `objects`
/// list is meaningful: the target was looked for and not seen.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub frame_index: u64,
    pub objects: Vec<DetectedObject>,
}

impl DetectionBatch {
    pub fn empty(frame_index: u64) -> Self {
        Self { frame_index, objects: Vec::new() }
    }

    /// Objects whose label matches, case-insensitively.
    pub fn matching<'a>(&'a self, label: &str) -> impl Iterator<Item = &'a DetectedObject> {
        let needle = label.to_lowercase();
        self.objects
            .iter()
            .filter(move |o| o.label.to_lowercase() == needle)
    }
}

/// One block of text the recognizer found in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub text: String,
    pub confidence: f32,
    pub bounds: BoundingBox,
}

/// Text blocks recognized in one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextBatch {
    pub frame_index: u64,
    pub blocks: Vec<RecognizedText>,
}

impl TextBatch {
    /// Blocks containing the query, case-insensitively.
    pub fn containing<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a RecognizedText> {
        let needle = query.to_lowercase();
        self.blocks
            .iter()
            .filter(move |b| b.text.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(label: &str, x: f32) -> DetectedObject {
        DetectedObject {
            label: label.into(),
            confidence: 0.9,
            bounds: BoundingBox::new(x, 0.4, 0.2, 0.2),
        }
    }

    #[test]
    fn matching_is_case_insensitive() {
        let batch = DetectionBatch {
            frame_index: 3,
            objects: vec![obj("Keys", 0.1), obj("cup", 0.5), obj("KEYS", 0.7)],
        };
        assert_eq!(batch.matching("keys").count(), 2);
    }

    #[test]
    fn empty_batch_matches_nothing() {
        let batch = DetectionBatch::empty(0);
        assert_eq!(batch.matching("keys").count(), 0);
    }

    #[test]
    fn containing_finds_substrings() {
        let batch = TextBatch {
            frame_index: 1,
            blocks: vec![RecognizedText {
                text: "Exit — Stairs B".into(),
                confidence: 0.8,
                bounds: BoundingBox::new(0.2, 0.2, 0.5, 0.1),
            }],
        };
        assert_eq!(batch.containing("stairs").count(), 1);
        assert_eq!(batch.containing("elevator").count(), 0);
    }
}
