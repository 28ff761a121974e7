//! Shared types and collaborator seams for the Waypoint guided-search
//! engine: ids, geometry, detection payloads, domain events, the error
//! taxonomy, the target catalog, preferences, and the traits the hosting
//! app implements for camera, detection, speech, and feedback hardware.

pub mod capture;
pub mod detect;
pub mod detection;
pub mod errors;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod output;
pub mod prefs;
pub mod speech;
pub mod target;

pub use capture::CameraSource;
pub use detect::{ObjectDetector, TextRecognizer};
pub use detection::{CameraFrame, DetectedObject, DetectionBatch, RecognizedText, TextBatch};
pub use errors::DeviceError;
pub use events::{FeatureKind, GuideEvent, LogLevel, StopReason};
pub use geometry::{BoundingBox, Point, FRAME_CENTRE};
pub use ids::{FeatureId, SessionId};
pub use output::{FeedbackOutput, HapticPattern, ReadingRate};
pub use prefs::{InputMethod, Preferences, AUTO_OFF_DURATIONS};
pub use speech::{SpeechRecognizer, Transcript};
pub use target::{CatalogEntry, SearchTarget, TargetCatalog};
