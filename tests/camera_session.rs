use anyhow::{anyhow, Result};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use scene_narrator::camera::{
    CameraCharacteristics, CameraDevice, CameraProvider, CameraWorker, CaptureRequest,
    CaptureSession, CaptureSettings, CameraCommand, FlashMode, FrameSlot, SyntheticCamera,
};
use scene_narrator::config::CameraSettings;
use scene_narrator::detect::{Labels, ModelOutput, ScriptedBackend, SharedBackend};
use scene_narrator::overlay::NullSink;
use scene_narrator::{CameraSessionManager, Event, Frame, FrameProcessor, OverlayRenderer};

type Journal = Arc<Mutex<Vec<String>>>;

fn record(journal: &Journal, entry: String) {
    journal.lock().unwrap().push(entry);
}

struct FakeProvider {
    journal: Journal,
    fail_sessions: Arc<Mutex<bool>>,
}

impl CameraProvider for FakeProvider {
    fn camera_ids(&self) -> Result<Vec<String>> {
        Ok(vec!["back".to_string(), "front".to_string()])
    }

    fn characteristics(&self, _id: &str) -> Result<CameraCharacteristics> {
        Ok(CameraCharacteristics {
            active_array: (400, 300),
            max_digital_zoom: 4.0,
        })
    }

    fn open(&mut self, id: &str) -> Result<Box<dyn CameraDevice>> {
        record(&self.journal, format!("open {}", id));
        Ok(Box::new(FakeDevice {
            id: id.to_string(),
            journal: self.journal.clone(),
            fail_sessions: self.fail_sessions.clone(),
        }))
    }
}

struct FakeDevice {
    id: String,
    journal: Journal,
    fail_sessions: Arc<Mutex<bool>>,
}

impl CameraDevice for FakeDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_session(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureSession>> {
        if *self.fail_sessions.lock().unwrap() {
            record(&self.journal, "session failed".to_string());
            return Err(anyhow!("configure failed"));
        }
        record(
            &self.journal,
            format!("session flash={:?} crop_width={}", request.flash, request.crop.width),
        );
        Ok(Box::new(FakeSession {
            journal: self.journal.clone(),
        }))
    }

    fn close(&mut self) {
        record(&self.journal, "close device".to_string());
    }
}

struct FakeSession {
    journal: Journal,
}

impl CaptureSession for FakeSession {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Frame::from_rgb(vec![0; 4 * 4 * 3], 4, 4).map(Some)
    }

    fn close(&mut self) {
        record(&self.journal, "close session".to_string());
    }
}

fn fake() -> (FakeProvider, Journal, Arc<Mutex<bool>>) {
    let journal = Journal::default();
    let fail = Arc::new(Mutex::new(false));
    (
        FakeProvider {
            journal: journal.clone(),
            fail_sessions: fail.clone(),
        },
        journal,
        fail,
    )
}

fn take(journal: &Journal) -> Vec<String> {
    std::mem::take(&mut *journal.lock().unwrap())
}

#[test]
fn opens_first_camera_and_starts_preview() -> Result<()> {
    let (mut provider, journal, _) = fake();
    let mut manager = CameraSessionManager::new(CaptureSettings::default());

    let characteristics = manager.open_first(&mut provider)?;
    assert_eq!(characteristics.active_array, (400, 300));
    assert!(manager.is_open());
    assert!(manager.is_previewing());
    assert_eq!(
        take(&journal),
        vec!["open back", "session flash=Off crop_width=400"]
    );
    assert!(manager.next_frame()?.is_some());
    Ok(())
}

#[test]
fn flash_toggle_replaces_the_session() -> Result<()> {
    let (mut provider, journal, _) = fake();
    let mut manager = CameraSessionManager::new(CaptureSettings::default());
    manager.open_first(&mut provider)?;
    take(&journal);

    assert!(manager.toggle_flash());
    assert_eq!(
        take(&journal),
        vec!["close session", "session flash=Torch crop_width=400"]
    );
    assert_eq!(manager.active_request().map(|r| r.flash), Some(FlashMode::Torch));

    assert!(manager.toggle_flash());
    assert_eq!(manager.active_request().map(|r| r.flash), Some(FlashMode::Off));
    assert_eq!(manager.sessions_opened(), 3);
    Ok(())
}

#[test]
fn zoom_reconfigures_with_crop() -> Result<()> {
    let (mut provider, journal, _) = fake();
    let mut manager = CameraSessionManager::new(CaptureSettings::default());
    manager.open_first(&mut provider)?;
    take(&journal);

    assert!(manager.set_zoom(2.0));
    assert_eq!(
        take(&journal),
        vec!["close session", "session flash=Off crop_width=200"]
    );
    Ok(())
}

#[test]
fn failed_configuration_stalls_until_next_change() -> Result<()> {
    let (mut provider, journal, fail) = fake();
    let mut manager = CameraSessionManager::new(CaptureSettings::default());
    manager.open_first(&mut provider)?;

    *fail.lock().unwrap() = true;
    assert!(!manager.toggle_flash());
    assert!(!manager.is_previewing());
    assert!(manager.next_frame()?.is_none());

    *fail.lock().unwrap() = false;
    take(&journal);
    assert!(manager.toggle_flash());
    assert!(manager.is_previewing());
    assert_eq!(take(&journal), vec!["session flash=Off crop_width=400"]);
    Ok(())
}

#[test]
fn shutdown_closes_session_then_device() -> Result<()> {
    let (mut provider, journal, _) = fake();
    let mut manager = CameraSessionManager::new(CaptureSettings::default());
    manager.open_first(&mut provider)?;
    take(&journal);

    manager.shutdown();
    assert_eq!(take(&journal), vec!["close session", "close device"]);
    assert!(!manager.is_open());
    Ok(())
}

fn synthetic_worker(width: u32, height: u32) -> Result<CameraWorker> {
    let camera = SyntheticCamera::new(CameraSettings {
        device: "stub://rear_camera".to_string(),
        width,
        height,
        target_fps: 0,
    })?;
    let labels = Labels::coco();
    let person = labels.index_of("person").ok_or_else(|| anyhow!("no person label"))?;
    // one person in every frame
    let output = ModelOutput {
        locations: vec![0.1, 0.3, 0.9, 0.7],
        classes: vec![person as f32],
        scores: vec![0.9],
    };
    let backend: SharedBackend = Arc::new(Mutex::new(ScriptedBackend::new(vec![output], (32, 32))));
    let processor = FrameProcessor::new(backend, labels);
    Ok(CameraWorker::new(
        Box::new(camera),
        processor,
        OverlayRenderer::new(),
        Box::new(NullSink),
    ))
}

fn expect_ready(event_rx: &mpsc::Receiver<Event>) -> Result<()> {
    match event_rx.recv_timeout(Duration::from_secs(5))? {
        Event::FrameReady => Ok(()),
        other => Err(anyhow!("expected FrameReady, got {:?}", other)),
    }
}

#[test]
fn worker_streams_analysed_frames_from_synthetic_camera() -> Result<()> {
    let worker = synthetic_worker(64, 48)?;
    let slot: FrameSlot = worker.frame_slot();
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    let handle = worker.spawn(command_rx, event_tx)?;

    match event_rx.recv_timeout(Duration::from_secs(5))? {
        Event::CameraReady(characteristics) => {
            assert_eq!(characteristics.active_array, (64, 48));
        }
        other => panic!("expected CameraReady, got {:?}", other),
    }
    expect_ready(&event_rx)?;
    let captured = slot.take().expect("frame in slot");
    assert_eq!((captured.frame.width, captured.frame.height), (64, 48));
    let analysis = captured.analysis.expect("analysis");
    assert_eq!(analysis.tally.count("person"), 1);

    command_tx.send(CameraCommand::SetDetection(false))?;
    let mut undetected = false;
    for _ in 0..50 {
        expect_ready(&event_rx)?;
        if let Some(captured) = slot.take() {
            if captured.analysis.is_none() {
                undetected = true;
                break;
            }
        }
    }
    assert!(undetected);

    command_tx.send(CameraCommand::Shutdown)?;
    handle.join().map_err(|_| anyhow!("camera worker panicked"))?;
    Ok(())
}

#[test]
fn stalled_consumer_holds_at_most_one_frame() -> Result<()> {
    let worker = synthetic_worker(640, 480)?;
    let slot = worker.frame_slot();
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();
    let handle = worker.spawn(command_rx, event_tx)?;

    thread::sleep(Duration::from_secs(1));

    let pending: Vec<Event> = event_rx.try_iter().collect();
    let ready = pending
        .iter()
        .filter(|event| matches!(event, Event::FrameReady))
        .count();
    assert_eq!(ready, 1, "pending events: {:?}", pending);

    let captured = slot.take().expect("frame in slot");
    assert!(captured.frame.age() < Duration::from_millis(500));
    assert!(slot.take().is_none());

    expect_ready(&event_rx)?;
    assert!(slot.take().is_some());

    command_tx.send(CameraCommand::Shutdown)?;
    handle.join().map_err(|_| anyhow!("camera worker panicked"))?;
    Ok(())
}
