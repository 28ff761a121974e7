//! The Waypoint session engine: a generic state-machine orchestrator, the
//! bounded-cadence frame pump, detection smoothing and alignment feedback,
//! the feature lifecycle/registry/stop layer, the three concrete feature
//! sessions, and the mode/zoom coordinator the UI observes.
//!
//! Camera frames, detector batches, speech transcripts, timers, and user
//! intents all arrive on independent schedules; everything here funnels
//! them into serialized session state with group cancellation per episode.

pub mod coordinator;
pub mod error;
pub mod feedback;
pub mod lifecycle;
pub mod orchestrator;
pub mod prediction;
pub mod pump;
pub mod session;
pub mod stop;
pub mod tasks;

pub use coordinator::{AppMode, ButtonStates, ModeCoordinator, ProcessingState};
pub use error::EngineError;
pub use feedback::{AlignmentZone, FeedbackDirective, FeedbackPolicy, SearchKind};
pub use lifecycle::{Feature, FeatureManager};
pub use orchestrator::{Phase, PhaseSnapshot, SessionOrchestrator};
pub use prediction::{CentreAlignmentEvaluator, PredictionConfig, PredictionState};
pub use pump::ContinuousFrameProcessor;
pub use session::{
    ItemSearchConfig, ItemSearchSession, ReadTextConfig, ReadTextSession, SearchPhase,
    TextSearchConfig, TextSearchSession,
};
pub use stop::StopController;
pub use tasks::TaskBag;
