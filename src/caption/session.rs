use anyhow::Context;
use std::sync::Arc;

use super::client::{CaptionOutcome, CaptionTransport};
use crate::app::StatusView;
use crate::frame::Frame;
use crate::gesture::{Haptics, CAPTION_PATTERN};
use crate::speech::SpeechEngine;

/// Label shown while a caption is requested.
pub const GENERATING_LABEL: &str = "GENERATING....";

pub const CAPTION_UTTERANCE: &str = "caption";

/// Online captioning screen state. At most one request is in flight.
pub struct OnlineSession {
    transport: Arc<dyn CaptionTransport>,
    jpeg_quality: u8,
    in_flight: bool,
    requests: u64,
}

impl OnlineSession {
    pub fn new(transport: Arc<dyn CaptionTransport>, jpeg_quality: u8) -> Self {
        Self {
            transport,
            jpeg_quality,
            in_flight: false,
            requests: 0,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Start a caption request for `frame`.
    ///
    /// The label always switches to the generating text. Returns false without
    /// further effect when a request is already in flight, no frame is available or
    /// the frame cannot be encoded. `deliver` runs on the request thread with the
    /// outcome and must hand it back to the main thread.
    pub fn trigger<F>(&mut self, frame: Option<&Frame>, deliver: F, view: &mut dyn StatusView) -> bool
    where
        F: FnOnce(CaptionOutcome) + Send + 'static,
    {
        view.set_caption(GENERATING_LABEL);
        if self.in_flight {
            log::debug!("caption request already in flight");
            return false;
        }
        let Some(frame) = frame else {
            log::debug!("no frame available for captioning");
            return false;
        };
        let jpeg = match frame.encode_jpeg(self.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                log::warn!("frame capture failed: {:#}", err);
                return false;
            }
        };

        let transport = Arc::clone(&self.transport);
        let spawned = std::thread::Builder::new()
            .name("caption".to_string())
            .spawn(move || deliver(transport.request_caption(&jpeg)))
            .context("spawn caption request thread");
        match spawned {
            Ok(_) => {
                self.in_flight = true;
                self.requests += 1;
                true
            }
            Err(err) => {
                log::error!("{:#}", err);
                false
            }
        }
    }

    /// Apply a finished request. Clears the in-flight flag whatever the outcome.
    pub fn finish(
        &mut self,
        outcome: CaptionOutcome,
        speech: &mut dyn SpeechEngine,
        haptics: &mut dyn Haptics,
        view: &mut dyn StatusView,
    ) {
        self.in_flight = false;
        view.set_caption(&outcome.display_text());
        match outcome {
            CaptionOutcome::Caption(caption) => {
                if let Err(err) = speech.speak(&caption, CAPTION_UTTERANCE) {
                    log::warn!("speech failed: {:#}", err);
                }
                haptics.vibrate(&CAPTION_PATTERN);
            }
            CaptionOutcome::Rejected(error) => log::warn!("caption rejected: {}", error),
            CaptionOutcome::Failed(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::MemoryView;
    use crate::gesture::LogHaptics;
    use crate::speech::SilentSpeech;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FixedTransport(CaptionOutcome);

    impl CaptionTransport for FixedTransport {
        fn request_caption(&self, jpeg: &[u8]) -> CaptionOutcome {
            assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
            self.0.clone()
        }
    }

    fn frame() -> Frame {
        Frame::from_rgb(vec![90; 8 * 8 * 3], 8, 8).unwrap()
    }

    #[test]
    fn trigger_without_frame_only_sets_label() {
        let transport = Arc::new(FixedTransport(CaptionOutcome::Caption("x".into())));
        let mut session = OnlineSession::new(transport, 90);
        let mut view = MemoryView::default();
        assert!(!session.trigger(None, |_| {}, &mut view));
        assert!(!session.in_flight());
        assert_eq!(view.caption.as_deref(), Some(GENERATING_LABEL));
    }

    #[test]
    fn second_trigger_is_noop_until_finished() {
        let transport = Arc::new(FixedTransport(CaptionOutcome::Caption("a cat".into())));
        let mut session = OnlineSession::new(transport, 90);
        let mut view = MemoryView::default();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);

        assert!(session.trigger(
            Some(&frame()),
            move |outcome| {
                let _ = tx.lock().unwrap().send(outcome);
            },
            &mut view
        ));
        assert!(session.in_flight());
        assert!(!session.trigger(Some(&frame()), |_| {}, &mut view));
        assert_eq!(session.requests(), 1);

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let mut haptics = LogHaptics::default();
        session.finish(outcome, &mut SilentSpeech::default(), &mut haptics, &mut view);
        assert!(!session.in_flight());
        assert_eq!(view.caption.as_deref(), Some("a cat"));
        assert_eq!(haptics.pulses(), 1);
    }

    #[test]
    fn failures_clear_flag_and_show_error() {
        let transport = Arc::new(FixedTransport(CaptionOutcome::Failed("timeout".into())));
        let mut session = OnlineSession::new(transport, 90);
        let mut view = MemoryView::default();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        session.trigger(
            Some(&frame()),
            move |outcome| {
                let _ = tx.lock().unwrap().send(outcome);
            },
            &mut view,
        );
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let mut haptics = LogHaptics::default();
        session.finish(outcome, &mut SilentSpeech::default(), &mut haptics, &mut view);
        assert!(!session.in_flight());
        assert_eq!(view.caption.as_deref(), Some("Error: timeout"));
        assert_eq!(haptics.pulses(), 0);
    }
}
