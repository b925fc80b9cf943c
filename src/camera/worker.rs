use anyhow::{Context, Result};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::device::CameraProvider;
use super::request::CaptureSettings;
use super::session::CameraSessionManager;
use crate::app::Event;
use crate::frame::Frame;
use crate::overlay::{DisplaySink, OverlayRenderer};
use crate::processor::{FrameAnalysis, FrameProcessor};

const STALLED_POLL: Duration = Duration::from_millis(200);
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Commands sent from the main thread to the camera worker.
#[derive(Clone, Debug, PartialEq)]
pub enum CameraCommand {
    /// Reconfigure the preview with new flash/zoom settings.
    Apply(CaptureSettings),
    /// Enable or disable on-device detection for subsequent frames.
    SetDetection(bool),
    Shutdown,
}

/// A captured frame and, when detection ran, its analysis.
#[derive(Debug)]
pub struct CapturedFrame {
    pub frame: Frame,
    pub analysis: Option<FrameAnalysis>,
}

/// Single-entry mailbox between the camera worker and the main thread.
///
/// A newer frame overwrites one the consumer has not taken yet, so a slow
/// consumer holds at most one frame in memory.
#[derive(Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<CapturedFrame>>>,
}

impl FrameSlot {
    /// Store `captured`. Returns true when the slot was empty, i.e. the
    /// consumer needs a fresh `Event::FrameReady`.
    pub fn put(&self, captured: CapturedFrame) -> bool {
        self.lock().replace(captured).is_none()
    }

    pub fn take(&self) -> Option<CapturedFrame> {
        self.lock().take()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CapturedFrame>> {
        self.latest
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Background camera context.
///
/// Owns the session manager and runs detection synchronously for each frame it
/// pulls. Frames are handed over through a `FrameSlot`: if the main thread is
/// slower than the preview rate, only the newest frame waits for it.
pub struct CameraWorker {
    provider: Box<dyn CameraProvider>,
    manager: CameraSessionManager,
    processor: FrameProcessor,
    renderer: OverlayRenderer,
    sink: Box<dyn DisplaySink>,
    slot: FrameSlot,
    detection_enabled: bool,
    frames_seen: u64,
    frames_replaced: u64,
    last_latency: Duration,
}

impl CameraWorker {
    pub fn new(
        provider: Box<dyn CameraProvider>,
        processor: FrameProcessor,
        renderer: OverlayRenderer,
        sink: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            provider,
            manager: CameraSessionManager::new(CaptureSettings::default()),
            processor,
            renderer,
            sink,
            slot: FrameSlot::default(),
            detection_enabled: true,
            frames_seen: 0,
            frames_replaced: 0,
            last_latency: Duration::ZERO,
        }
    }

    /// The slot this worker delivers frames into.
    pub fn frame_slot(&self) -> FrameSlot {
        self.slot.clone()
    }

    pub fn spawn(
        self,
        commands: Receiver<CameraCommand>,
        events: Sender<Event>,
    ) -> Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("camera".to_string())
            .spawn(move || self.run(commands, events))
            .context("spawn camera worker thread")
    }

    fn run(mut self, commands: Receiver<CameraCommand>, events: Sender<Event>) {
        match self.manager.open_first(self.provider.as_mut()) {
            Ok(characteristics) => {
                if events.send(Event::CameraReady(characteristics)).is_err() {
                    return;
                }
            }
            Err(err) => log::error!("camera open failed: {:#}", err),
        }

        let mut last_health_log = Instant::now();
        loop {
            loop {
                match commands.try_recv() {
                    Ok(command) => {
                        if !self.handle(command) {
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        self.manager.shutdown();
                        return;
                    }
                }
            }

            if !self.manager.is_previewing() {
                match commands.recv_timeout(STALLED_POLL) {
                    Ok(command) => {
                        if !self.handle(command) {
                            return;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        self.manager.shutdown();
                        return;
                    }
                }
                continue;
            }

            if !self.step(&events) {
                self.manager.shutdown();
                return;
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = self.processor.stats();
                log::info!(
                    "camera frames={} processed={} failed={} replaced={} latency={}ms sessions={}",
                    self.frames_seen,
                    stats.frames_processed,
                    stats.frames_failed,
                    self.frames_replaced,
                    self.last_latency.as_millis(),
                    self.manager.sessions_opened()
                );
                last_health_log = Instant::now();
            }
        }
    }

    /// Returns false once the worker should exit.
    fn handle(&mut self, command: CameraCommand) -> bool {
        match command {
            CameraCommand::Apply(settings) => {
                self.manager.apply(settings);
                true
            }
            CameraCommand::SetDetection(enabled) => {
                self.detection_enabled = enabled;
                log::debug!("on-device detection enabled={}", enabled);
                true
            }
            CameraCommand::Shutdown => {
                self.manager.shutdown();
                false
            }
        }
    }

    /// Pull one frame, analyse it, publish the overlay. Returns false when the main
    /// thread is gone.
    fn step(&mut self, events: &Sender<Event>) -> bool {
        let frame = match self.manager.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return true,
            Err(err) => {
                log::warn!("frame capture failed: {:#}", err);
                return true;
            }
        };
        self.frames_seen += 1;

        let analysis = if self.detection_enabled {
            self.processor.process_snapshot(Some(&frame))
        } else {
            None
        };

        if let Some(analysis) = &analysis {
            match self.renderer.render(&frame, &analysis.detections) {
                Ok(annotated) => {
                    if let Err(err) = self.sink.publish(&annotated) {
                        log::warn!("overlay publish failed: {:#}", err);
                    }
                }
                Err(err) => log::warn!("overlay render failed: {:#}", err),
            }
        }

        self.last_latency = frame.age();
        if self.slot.put(CapturedFrame { frame, analysis }) {
            events.send(Event::FrameReady).is_ok()
        } else {
            self.frames_replaced += 1;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captured(width: u32) -> CapturedFrame {
        CapturedFrame {
            frame: Frame::from_rgb(vec![0; width as usize * 2 * 3], width, 2).unwrap(),
            analysis: None,
        }
    }

    #[test]
    fn slot_keeps_only_the_newest_frame() {
        let slot = FrameSlot::default();
        assert!(slot.take().is_none());

        assert!(slot.put(captured(1)));
        assert!(!slot.put(captured(2)));
        assert!(!slot.clone().put(captured(3)));

        let latest = slot.take().expect("frame");
        assert_eq!(latest.frame.width, 3);
        assert!(slot.take().is_none());
        assert!(slot.put(captured(4)));
    }
}
