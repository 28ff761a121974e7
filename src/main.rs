use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast;

use waypoint_core::{
    BoundingBox, DetectedObject, DetectionBatch, GuideEvent, Preferences, RecognizedText,
    TargetCatalog, TextBatch,
};
use waypoint_engine::{
    AppMode, FeatureManager, ItemSearchConfig, ItemSearchSession, ModeCoordinator, ReadTextConfig,
    ReadTextSession, StopController, TextSearchConfig, TextSearchSession,
};
use waypoint_sim::{
    RecordingOutput, SimCamera, SimObjectDetector, SimSpeechRecognizer, SimTextRecognizer,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Voice-search for keys, guided to centre.
    ItemSearch,
    /// Search for the word "exit" in recognized text.
    TextSearch,
    /// Continuous reading of passing signage.
    ReadText,
}

/// Scripted demonstration of the guided-search engine against simulated
/// camera, detector, and speech collaborators.
#[derive(Parser, Debug)]
#[command(name = "waypoint", version)]
struct Cli {
    #[arg(long, value_enum, default_value_t = Scenario::ItemSearch)]
    scenario: Scenario,

    /// Emit JSON log lines.
    #[arg(long)]
    json_logs: bool,

    /// Skip the SQLite warn+ log sink.
    #[arg(long)]
    no_log_db: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _telemetry = waypoint_telemetry::init_telemetry(waypoint_telemetry::TelemetryConfig {
        json_output: cli.json_logs,
        log_to_sqlite: !cli.no_log_db,
        ..Default::default()
    });

    tracing::info!(scenario = ?cli.scenario, "starting waypoint demo");

    // Simulated collaborators stand in for the excluded hardware layers.
    let camera = SimCamera::new(640, 480);
    let detector = SimObjectDetector::new();
    let text_recognizer = SimTextRecognizer::new();
    let speech = match cli.scenario {
        Scenario::ItemSearch => {
            SimSpeechRecognizer::with_final_transcript("ключи", Duration::from_millis(300))
        }
        Scenario::TextSearch => {
            SimSpeechRecognizer::with_final_transcript("exit", Duration::from_millis(300))
        }
        Scenario::ReadText => SimSpeechRecognizer::silent(),
    };
    let output = RecordingOutput::new();
    let prefs = Arc::new(Preferences::default());

    // Engine services, composition-root style: everything injected, no
    // ambient singletons.
    let manager = Arc::new(FeatureManager::new());
    let (events_tx, events_rx) = broadcast::channel::<GuideEvent>(256);
    let stop = Arc::new(StopController::new(Arc::clone(&manager), events_tx.clone()));

    let item = ItemSearchSession::new(
        camera.clone(),
        detector.clone(),
        speech.clone(),
        output.clone(),
        Arc::clone(&prefs),
        TargetCatalog::builtin(),
        Arc::clone(&manager),
        events_tx.clone(),
        ItemSearchConfig::default(),
    );
    let text = TextSearchSession::new(
        camera.clone(),
        text_recognizer.clone(),
        speech,
        output.clone(),
        Arc::clone(&prefs),
        Arc::clone(&manager),
        events_tx.clone(),
        TextSearchConfig::default(),
    );
    let read = ReadTextSession::new(
        camera.clone(),
        text_recognizer.clone(),
        output.clone(),
        prefs,
        Arc::clone(&manager),
        events_tx.clone(),
        ReadTextConfig::default(),
    );

    let coordinator = ModeCoordinator::new(stop, camera.clone(), output.clone(), item, text, read);
    let _projection = coordinator.spawn_projection(events_tx.subscribe());

    // Surface domain events as log lines while the scenario runs.
    let mut event_feed = events_rx;
    let event_task = tokio::spawn(async move {
        loop {
            match event_feed.recv().await {
                Ok(event) => tracing::info!(?event, "domain event"),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    match cli.scenario {
        Scenario::ItemSearch => {
            coordinator.activate(AppMode::ItemSearch).await?;
            // Speech resolves "ключи" → Keys, then the session warms up
            // and starts searching.
            tokio::time::sleep(Duration::from_millis(800)).await;

            // Drift a detection from the left edge into the centre.
            for (i, x) in [0.12f32, 0.22, 0.32, 0.42, 0.5].iter().enumerate() {
                detector.publish(DetectionBatch {
                    frame_index: i as u64,
                    objects: vec![DetectedObject {
                        label: "Keys".into(),
                        confidence: 0.92,
                        bounds: BoundingBox::new(x - 0.05, 0.45, 0.1, 0.1),
                    }],
                });
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
        Scenario::TextSearch => {
            coordinator.activate(AppMode::TextSearch).await?;
            tokio::time::sleep(Duration::from_millis(800)).await;

            for (i, x) in [0.8f32, 0.65, 0.5].iter().enumerate() {
                text_recognizer.publish(TextBatch {
                    frame_index: i as u64,
                    blocks: vec![RecognizedText {
                        text: "EXIT".into(),
                        confidence: 0.95,
                        bounds: BoundingBox::new(x - 0.1, 0.4, 0.2, 0.1),
                    }],
                });
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
        Scenario::ReadText => {
            coordinator.activate(AppMode::Reading).await?;
            tokio::time::sleep(Duration::from_millis(200)).await;

            for (i, passage) in ["Gate 12", "Gate 12", "Baggage claim →"].iter().enumerate() {
                text_recognizer.publish(TextBatch {
                    frame_index: i as u64,
                    blocks: vec![RecognizedText {
                        text: passage.to_string(),
                        confidence: 0.9,
                        bounds: BoundingBox::new(0.2, 0.3, 0.6, 0.2),
                    }],
                });
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
        }
    }

    coordinator.stop_everything().await;
    event_task.abort();

    println!("\nspoken feedback, in order:");
    for phrase in output.spoken() {
        println!("  - {phrase}");
    }
    println!("haptic cues: {}", output.haptics().len());
    println!("camera frames produced: {}", camera.frames_produced());

    Ok(())
}
