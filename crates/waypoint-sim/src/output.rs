use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use waypoint_core::{DeviceError, FeedbackOutput, HapticPattern, ReadingRate};

/// Feedback output that renders nothing and records everything. Utterances
/// complete instantly; while suspended, output is swallowed exactly like a
/// real channel mid-`stop_and_suspend`.
pub struct RecordingOutput {
    spoken: Mutex<Vec<String>>,
    haptics: Mutex<Vec<(HapticPattern, f32)>>,
    suspended: AtomicBool,
    reading_rate: Mutex<ReadingRate>,
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
            haptics: Mutex::new(Vec::new()),
            suspended: AtomicBool::new(false),
            reading_rate: Mutex::new(ReadingRate::Normal),
        })
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn haptics(&self) -> Vec<(HapticPattern, f32)> {
        self.haptics.lock().clone()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn reading_rate(&self) -> ReadingRate {
        *self.reading_rate.lock()
    }

}

#[async_trait]
impl FeedbackOutput for RecordingOutput {
    async fn speak(&self, phrase: &str) -> Result<(), DeviceError> {
        if self.suspended.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.spoken.lock().push(phrase.to_string());
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        false
    }

    async fn play_haptic(&self, pattern: HapticPattern, intensity: f32) {
        if self.suspended.load(Ordering::SeqCst) {
            return;
        }
        self.haptics.lock().push((pattern, intensity));
    }

    fn stop_and_suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    fn resume_output(&self) {
        self.suspended.store(false, Ordering::SeqCst);
    }

    fn set_reading_rate(&self, rate: ReadingRate) {
        *self.reading_rate.lock() = rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_speech_and_haptics() {
        let output = RecordingOutput::new();
        output.speak("Move left").await.unwrap();
        output.play_haptic(HapticPattern::Tick, 0.5).await;
        assert_eq!(output.spoken(), vec!["Move left".to_string()]);
        assert_eq!(output.haptics(), vec![(HapticPattern::Tick, 0.5)]);
    }

    #[tokio::test]
    async fn suspension_swallows_output() {
        let output = RecordingOutput::new();
        output.stop_and_suspend();
        output.speak("stale cue").await.unwrap();
        output.play_haptic(HapticPattern::Success, 1.0).await;
        assert!(output.spoken().is_empty());
        assert!(output.haptics().is_empty());

        output.resume_output();
        output.speak("fresh cue").await.unwrap();
        assert_eq!(output.spoken(), vec!["fresh cue".to_string()]);
    }

    #[tokio::test]
    async fn reading_rate_is_recorded() {
        let output = RecordingOutput::new();
        output.set_reading_rate(ReadingRate::Fast);
        assert_eq!(output.reading_rate(), ReadingRate::Fast);
    }
}
