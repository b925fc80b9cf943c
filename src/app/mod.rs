//! Main-thread application state and event loop.
//!
//! Every piece of mutable UI state (screen, narration mode and cooldown, flash
//! and zoom, the caption in-flight flag) lives in `App` and is touched only from
//! the thread running `App::run`. Background threads talk to it exclusively by
//! posting `Event`s.

mod view;

use anyhow::Result;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::camera::{
    CameraCharacteristics, CameraCommand, CapturedFrame, CaptureSettings, FrameSlot, ZoomState,
};
use crate::caption::{CaptionOutcome, OnlineSession};
use crate::frame::Frame;
use crate::gesture::{dispatch, Action, Gesture, Haptics, TAP_PULSE};
use crate::narration::{caption_label, NarrationController};
use crate::permissions::{PermissionChecker, PermissionGate};
use crate::processor::FrameAnalysis;
use crate::speech::{SpeechEngine, UtteranceEvent, VoiceCommand};

pub use crate::gesture::Screen;
pub use view::{LogView, MemoryView, StatusView};

/// Spoken when returning from the captioning screen.
pub const OFFLINE_ANNOUNCEMENT: &str = "Now in Offline Mode";

const PERMISSION_RECHECK: Duration = Duration::from_secs(1);

/// Everything that can happen to the app, posted from any thread.
#[derive(Debug)]
pub enum Event {
    CameraReady(CameraCharacteristics),
    /// A new frame is waiting in the app's `FrameSlot`.
    FrameReady,
    Gesture(Gesture),
    VoiceResults(Vec<String>),
    Utterance(UtteranceEvent),
    CaptionFinished(CaptionOutcome),
    Quit,
}

pub struct App<V: StatusView> {
    screen: Screen,
    narration: NarrationController,
    online: OnlineSession,
    speech: Box<dyn SpeechEngine>,
    haptics: Box<dyn Haptics>,
    view: V,
    camera: Sender<CameraCommand>,
    events: Sender<Event>,
    incoming: FrameSlot,
    capture: CaptureSettings,
    zoom: ZoomState,
    last_frame: Option<Frame>,
    frames: u64,
    frame_limit: Option<u64>,
}

impl<V: StatusView> App<V> {
    pub fn new(
        view: V,
        narration: NarrationController,
        online: OnlineSession,
        speech: Box<dyn SpeechEngine>,
        haptics: Box<dyn Haptics>,
        camera: Sender<CameraCommand>,
        events: Sender<Event>,
    ) -> Self {
        Self {
            screen: Screen::Detection,
            narration,
            online,
            speech,
            haptics,
            view,
            camera,
            events,
            incoming: FrameSlot::default(),
            capture: CaptureSettings::default(),
            zoom: ZoomState::default(),
            last_frame: None,
            frames: 0,
            frame_limit: None,
        }
    }

    /// Read frames from the camera worker's slot.
    pub fn with_frame_slot(mut self, slot: FrameSlot) -> Self {
        self.incoming = slot;
        self
    }

    /// Quit after `limit` camera frames.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn narration(&self) -> &NarrationController {
        &self.narration
    }

    pub fn online(&self) -> &OnlineSession {
        &self.online
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        self.capture
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_frame.as_ref()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Handle one event. Returns false when the app should quit.
    pub fn handle(&mut self, event: Event, now: Instant) -> bool {
        match event {
            Event::CameraReady(characteristics) => {
                self.zoom.set_max(characteristics.max_digital_zoom);
                log::debug!("zoom range 1.0..={:.1}", self.zoom.max());
            }
            Event::FrameReady => {
                let Some(CapturedFrame { frame, analysis }) = self.incoming.take() else {
                    return true;
                };
                self.on_frame(frame, analysis, now);
                if self.frame_limit.is_some_and(|limit| self.frames >= limit) {
                    log::info!("frame limit of {} reached", self.frames);
                    return false;
                }
            }
            Event::Gesture(gesture) => {
                if let Some(action) = dispatch(self.screen, gesture) {
                    if action.pulses() {
                        self.haptics.vibrate(&[TAP_PULSE]);
                    }
                    self.perform(action);
                }
            }
            Event::VoiceResults(results) => {
                if self.screen == Screen::Detection
                    && VoiceCommand::first_match(&results).is_some()
                {
                    log::debug!("voice command recognised");
                    self.perform(Action::Narrate);
                }
            }
            Event::Utterance(event) => self.narration.on_utterance(&event),
            Event::CaptionFinished(outcome) => self.online.finish(
                outcome,
                self.speech.as_mut(),
                self.haptics.as_mut(),
                &mut self.view,
            ),
            Event::Quit => return false,
        }
        true
    }

    fn on_frame(&mut self, frame: Frame, analysis: Option<FrameAnalysis>, now: Instant) {
        self.frames += 1;
        self.last_frame = Some(frame);
        if self.screen != Screen::Detection {
            return;
        }
        let Some(analysis) = analysis else {
            return;
        };
        if let Some(text) = self
            .narration
            .on_frame(analysis.tally, now, self.speech.as_mut())
        {
            self.view.set_caption(&caption_label(&text));
        }
    }

    pub fn perform(&mut self, action: Action) {
        match action {
            Action::Narrate => {
                let text = self.narration.narrate_now(self.speech.as_mut());
                self.view.set_caption(&caption_label(&text));
            }
            Action::ToggleMode => {
                let mode = self.narration.toggle_mode();
                self.view.set_mode(mode);
            }
            Action::OpenCaptioning => {
                log::info!("switching to online captioning");
                self.screen = Screen::Online;
                self.send_camera(CameraCommand::SetDetection(false));
            }
            Action::OpenDetection => {
                log::info!("switching to on-device detection");
                self.screen = Screen::Detection;
                self.send_camera(CameraCommand::SetDetection(true));
                self.narration
                    .announce(OFFLINE_ANNOUNCEMENT, self.speech.as_mut());
            }
            Action::ToggleFlash => {
                self.capture.flash_on = !self.capture.flash_on;
                log::debug!("flash {}", if self.capture.flash_on { "on" } else { "off" });
                self.send_camera(CameraCommand::Apply(self.capture));
            }
            Action::Zoom(scale) => {
                let before = self.zoom.level();
                let level = self.zoom.apply_scale(scale);
                if level != before {
                    self.capture.zoom = level;
                    self.send_camera(CameraCommand::Apply(self.capture));
                }
            }
            Action::RequestCaption => {
                let events = self.events.clone();
                self.online.trigger(
                    self.last_frame.as_ref(),
                    move |outcome| {
                        let _ = events.send(Event::CaptionFinished(outcome));
                    },
                    &mut self.view,
                );
            }
        }
    }

    fn send_camera(&self, command: CameraCommand) {
        if self.camera.send(command).is_err() {
            log::warn!("camera worker is not running");
        }
    }

    /// Process events until `Quit` or until every sender is gone, then tear down.
    pub fn run(mut self, events: Receiver<Event>) -> Result<()> {
        while let Ok(event) = events.recv() {
            if !self.handle(event, Instant::now()) {
                break;
            }
        }
        self.shutdown();
        Ok(())
    }

    pub fn shutdown(&mut self) {
        let _ = self.camera.send(CameraCommand::Shutdown);
        self.speech.shutdown();
        log::info!("app stopped after {} frames", self.frames);
    }
}

/// Block until every required permission is granted, toasting the missing ones
/// and re-checking every second. Returns false if `Quit` arrives first.
pub fn wait_for_permissions<C: PermissionChecker>(
    gate: &PermissionGate<C>,
    view: &mut dyn StatusView,
    events: &Receiver<Event>,
) -> bool {
    let mut last_message: Option<String> = None;
    loop {
        let Some(message) = gate.denial_message() else {
            return true;
        };
        if last_message.as_deref() != Some(message.as_str()) {
            view.toast(&message);
            last_message = Some(message);
        }
        match events.recv_timeout(PERMISSION_RECHECK) {
            Ok(Event::Quit) | Err(RecvTimeoutError::Disconnected) => return false,
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
