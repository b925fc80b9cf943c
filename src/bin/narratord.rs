//! narratord - scene narration daemon
//!
//! Runs the full app headless:
//! 1. Waits for camera/microphone access
//! 2. Starts the camera worker (capture, detection, overlay)
//! 3. Narrates detections through the configured TTS program
//! 4. Reads gestures and commands from stdin, voice transcripts from a file/FIFO

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use scene_narrator::app::{wait_for_permissions, LogView};
use scene_narrator::camera::{provider_for, CameraWorker};
use scene_narrator::control::spawn_control;
use scene_narrator::gesture::LogHaptics;
use scene_narrator::permissions::{DevicePermissions, PermissionGate};
use scene_narrator::speech::{spawn_voice_listener, LineRecognizer};
use scene_narrator::{pipeline, App, CaptionClient, Event, NarrationMode, NarratorConfig, OnlineSession};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file.
    #[arg(long, env = "NARRATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Start in automatic narration mode.
    #[arg(long)]
    automatic: bool,
    /// Stop after this many camera frames.
    #[arg(long)]
    frames: Option<u64>,
    /// Do not read control lines from stdin.
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = NarratorConfig::load_from(args.config.as_deref())?;
    log::info!(
        "camera {} ({}x{} @ {} fps), caption endpoint {}",
        config.camera.device,
        config.camera.width,
        config.camera.height,
        config.camera.target_fps,
        config.caption.url
    );

    let (event_tx, event_rx) = mpsc::channel();
    {
        let tx = event_tx.clone();
        ctrlc::set_handler(move || {
            let _ = tx.send(Event::Quit);
        })
        .expect("error setting Ctrl-C handler");
    }
    if !args.no_stdin {
        spawn_control(BufReader::new(std::io::stdin()), event_tx.clone())?;
    }

    let mut view = LogView;
    let gate = PermissionGate::new(DevicePermissions::new(
        &config.camera.device,
        config.voice.input_path.as_deref(),
    ));
    if !wait_for_permissions(&gate, &mut view, &event_rx) {
        log::info!("stopped before permissions were granted");
        return Ok(());
    }

    let processor = pipeline::build_processor(&config)?;
    let renderer = pipeline::build_renderer(&config.overlay);
    let sink = pipeline::build_sink(&config.overlay);
    let provider = provider_for(&config.camera)?;
    let (camera_tx, camera_rx) = mpsc::channel();
    let worker = CameraWorker::new(provider, processor, renderer, sink);
    let frames = worker.frame_slot();
    let worker = worker.spawn(camera_rx, event_tx.clone())?;

    if let Some(path) = config.voice.input_path.clone() {
        log::info!("listening for voice commands on {}", path.display());
        let tx = event_tx.clone();
        spawn_voice_listener(
            move || LineRecognizer::open(&path),
            move |results| tx.send(Event::VoiceResults(results)).is_ok(),
        )?;
    }

    let speech = pipeline::build_speech(&config.narration, event_tx.clone());
    let mut narration = pipeline::build_narration(&config.narration);
    if args.automatic {
        narration.set_mode(NarrationMode::Automatic);
    }
    let transport = Arc::new(CaptionClient::new(&config.caption.url)?);
    let online = OnlineSession::new(transport, config.caption.jpeg_quality);

    log::info!(
        "narratord running (mode {}, cooldown {:?})",
        narration.mode().label(),
        narration.cooldown()
    );
    let app = App::new(
        view,
        narration,
        online,
        speech,
        Box::new(LogHaptics::default()),
        camera_tx,
        event_tx,
    )
    .with_frame_slot(frames)
    .with_frame_limit(args.frames);
    app.run(event_rx)?;

    worker
        .join()
        .map_err(|_| anyhow!("camera worker panicked"))?;
    log::info!("narratord stopped");
    Ok(())
}
