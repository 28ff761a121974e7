use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::DeviceError;

/// Haptic vocabulary the actuator understands. Patterns are device
/// gestures, not meanings — the feedback policy decides which pattern a
/// given alignment deserves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticPattern {
    /// Single short tick.
    Tick,
    /// Two quick ticks.
    DoubleTick,
    /// Long continuous buzz.
    Sweep,
    /// Celebratory triple pulse.
    Success,
    /// Attention pattern for notices (auto-off, errors).
    Notice,
}

/// Speech rate for continuous reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingRate {
    #[default]
    Normal,
    Fast,
}

/// Trait implemented by the speech-synthesis + haptic integration.
///
/// The output channel is a shared singleton: any session may be told to
/// silence it abruptly (`stop_and_suspend`) so a newly-activated feature's
/// cues never collide with stale output.
#[async_trait]
pub trait FeedbackOutput: Send + Sync {
    /// Speak a phrase; resolves when the utterance has finished (or was
    /// cut off). While suspended, resolves immediately without speaking.
    async fn speak(&self, phrase: &str) -> Result<(), DeviceError>;

    /// Whether an utterance is currently being rendered.
    fn is_speaking(&self) -> bool;

    /// Play a haptic pattern at the given intensity in `[0, 1]`.
    async fn play_haptic(&self, pattern: HapticPattern, intensity: f32);

    /// Abruptly stop all speech and haptics and swallow further output
    /// until `resume_output` is called.
    fn stop_and_suspend(&self);

    /// Lift a suspension.
    fn resume_output(&self);

    fn set_reading_rate(&self, rate: ReadingRate);
}
