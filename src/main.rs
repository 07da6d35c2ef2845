//! Application entry point: book reader.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line and load [`AppConfig`] (defaults on first run).
//! 3. Apply command-line overrides and validate.
//! 4. Create the [`tokio`] runtime (multi-thread, 2 workers).
//! 5. Build the collaborators: camera, classifier, OCR client, cue player.
//! 6. Install the Ctrl-C handler.
//! 7. Spawn the trigger-listener thread.
//! 8. Run the [`TriggerCoordinator`] on the main thread until stopped.
//! 9. Join the listener (bounded) and shut the runtime down.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;

use book_reader::{
    audio::{AudioPlayer, CpalCuePlayer, SilentPlayer},
    camera::{Camera, CommandCamera, FileCamera},
    config::{AppConfig, AppPaths},
    ocr::HttpOcrClient,
    pipeline::{Collaborators, CoordinatorSettings, Pipeline, PipelineSettings, TriggerCoordinator},
    trigger::{ClickEvent, DebounceSettings, SignalSource, StopFlag, TriggerGate},
    vision::{OpenAiVisionClassifier, VisionClassifier},
};

/// How long shutdown waits for the listener thread.
const LISTENER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "book-reader")]
#[command(about = "Button-triggered book reader: capture, OCR, audio cue", long_about = None)]
struct Cli {
    /// Settings file (default: the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fire a simulated trigger periodically instead of reading the button
    #[arg(long)]
    simulate: bool,

    /// Simulated trigger interval in seconds
    #[arg(long, value_name = "SECS")]
    interval: Option<f64>,

    /// Skip the vision pre-classification step
    #[arg(long)]
    no_classify: bool,

    /// Write the default settings file and exit
    #[arg(long)]
    write_default_config: bool,
}

impl Cli {
    fn settings_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| AppPaths::new().settings_file)
    }

    fn apply(&self, config: &mut AppConfig) {
        if self.simulate {
            config.trigger.simulation_mode = true;
        }
        if let Some(secs) = self.interval {
            config.trigger.simulation_interval_secs = secs;
        }
        if self.no_classify {
            config.vision.enabled = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

fn build_camera(config: &AppConfig) -> Result<Arc<dyn Camera>> {
    if let Some(path) = &config.camera.still_image {
        log::info!("camera: serving still image {}", path.display());
        return Ok(Arc::new(FileCamera::new(path)));
    }
    let camera = CommandCamera::from_config(&config.camera).context("camera setup failed")?;
    log::info!("camera: capture command {:?}", config.camera.command);
    Ok(Arc::new(camera))
}

fn build_classifier(config: &AppConfig) -> Option<Arc<dyn VisionClassifier>> {
    if !config.vision.enabled {
        log::info!("vision: pre-classification disabled");
        return None;
    }
    match OpenAiVisionClassifier::from_config(&config.vision) {
        Some(classifier) => {
            log::info!("vision: pre-classification with {}", config.vision.model);
            Some(Arc::new(classifier))
        }
        None => {
            log::warn!("vision: enabled but no API key (vision.api_key / OPENAI_API_KEY); disabled");
            None
        }
    }
}

fn build_player(config: &AppConfig) -> Arc<dyn AudioPlayer> {
    if !config.audio.enabled {
        log::info!("audio: cues disabled");
        return Arc::new(SilentPlayer);
    }
    match CpalCuePlayer::new(&config.audio) {
        Ok(player) => Arc::new(player),
        Err(e) => {
            log::warn!("audio: {e}; cues disabled");
            Arc::new(SilentPlayer)
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Command line + configuration
    let cli = Cli::parse();
    let settings_path = cli.settings_path();

    if cli.write_default_config {
        AppConfig::default()
            .save_to(&settings_path)
            .with_context(|| format!("cannot write {}", settings_path.display()))?;
        println!("wrote default settings to {}", settings_path.display());
        return Ok(());
    }

    let mut config = AppConfig::load_from(&settings_path)
        .with_context(|| format!("cannot load {}", settings_path.display()))?;

    // 3. Overrides + validation
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    log::info!("book reader starting up (settings: {})", settings_path.display());

    // 4. Tokio runtime
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 5. Collaborators
    let ocr = HttpOcrClient::from_config(&config.ocr);
    log::info!("ocr: endpoint {}", ocr.url());
    let pipeline = Pipeline::new(
        Collaborators {
            camera: build_camera(&config)?,
            classifier: build_classifier(&config),
            ocr: Arc::new(ocr),
            player: build_player(&config),
        },
        PipelineSettings::from_config(&config),
    );

    // 6. Ctrl-C
    let stop = StopFlag::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::info!("interrupt received, shutting down");
            stop.request_stop();
        })
        .context("failed to install Ctrl-C handler")?;
    }

    // 7. Trigger listener
    let (events_tx, events_rx) = crossbeam_channel::bounded::<ClickEvent>(1);
    let gate = TriggerGate::new();
    gate.disarm();

    let source = SignalSource::from_config(&config.trigger);
    log::info!("trigger: source {}", source.describe());
    let listener = source
        .spawn(
            DebounceSettings::from_config(&config.trigger),
            events_tx,
            gate.clone(),
            stop.clone(),
        )
        .context("failed to spawn trigger listener")?;

    // 8. Foreground loop
    let mut coordinator = TriggerCoordinator::new(
        Arc::new(pipeline),
        runtime.handle().clone(),
        events_rx,
        gate,
        stop.clone(),
        CoordinatorSettings::from_config(&config.coordinator),
    );
    coordinator.run();

    // 9. Shutdown
    stop.request_stop();
    drop(coordinator);

    let deadline = Instant::now() + LISTENER_JOIN_TIMEOUT;
    while !listener.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    if listener.is_finished() {
        if listener.join().is_err() {
            log::warn!("trigger: listener thread panicked");
        }
    } else {
        log::warn!("trigger: listener did not stop in time, leaving it behind");
    }

    runtime.shutdown_timeout(Duration::from_secs(1));
    log::info!("book reader stopped");
    Ok(())
}
