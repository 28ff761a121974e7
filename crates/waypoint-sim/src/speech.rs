use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use waypoint_core::{DeviceError, SpeechRecognizer, Transcript};

const CHANNEL_CAPACITY: usize = 16;

enum Script {
    /// Emit a partial then the final transcript after the delay.
    Respond { text: String, delay: Duration },
    /// Never produce a transcript; lets timeout paths run.
    Silent,
}

/// Scripted speech recognizer. Each `start` replays the script into the
/// transcript stream.
pub struct SimSpeechRecognizer {
    script: Script,
    tx: broadcast::Sender<Transcript>,
    language: Mutex<String>,
    starts: Mutex<u32>,
}

impl SimSpeechRecognizer {
    pub fn with_final_transcript(text: &str, delay: Duration) -> Arc<Self> {
        Self::build(Script::Respond {
            text: text.to_string(),
            delay,
        })
    }

    pub fn silent() -> Arc<Self> {
        Self::build(Script::Silent)
    }

    fn build(script: Script) -> Arc<Self> {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            script,
            tx,
            language: Mutex::new(String::new()),
            starts: Mutex::new(0),
        })
    }

    pub fn language(&self) -> String {
        self.language.lock().clone()
    }

    pub fn starts(&self) -> u32 {
        *self.starts.lock()
    }
}

#[async_trait]
impl SpeechRecognizer for SimSpeechRecognizer {
    async fn start(&self) -> Result<(), DeviceError> {
        *self.starts.lock() += 1;
        if let Script::Respond { text, delay } = &self.script {
            let tx = self.tx.clone();
            let text = text.clone();
            let delay = *delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay / 2).await;
                let partial: String = text.chars().take(text.chars().count() / 2).collect();
                let _ = tx.send(Transcript::partial(partial));
                tokio::time::sleep(delay / 2).await;
                let _ = tx.send(Transcript::final_text(text));
            });
        }
        Ok(())
    }

    async fn stop(&self) {}

    fn set_language(&self, tag: &str) {
        *self.language.lock() = tag.to_string();
    }

    fn transcripts(&self) -> broadcast::Receiver<Transcript> {
        self.tx.subscribe()
    }
}
