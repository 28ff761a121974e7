use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::errors::DeviceError;

/// One hypothesis from the speech recognizer. Partial transcripts stream
/// with `is_final == false`; the query flow acts only on the final one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    pub is_final: bool,
}

impl Transcript {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_final: true }
    }

    pub fn partial(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_final: false }
    }
}

/// Trait implemented by the speech-recognition integration.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin listening. Idempotent.
    async fn start(&self) -> Result<(), DeviceError>;

    /// Stop listening and release the microphone. Idempotent.
    async fn stop(&self);

    /// BCP-47 language tag for subsequent recognition.
    fn set_language(&self, tag: &str);

    /// Subscribe to the transcript stream.
    fn transcripts(&self) -> broadcast::Receiver<Transcript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_and_partial_constructors() {
        assert!(Transcript::final_text("keys").is_final);
        assert!(!Transcript::partial("ke").is_final);
    }
}
