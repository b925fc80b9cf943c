use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

use super::phrases::{compose_sentence, Sentence};
use super::tally::DetectionTally;
use crate::speech::{SpeechEngine, UtteranceEvent};

/// Minimum spacing between automatic narrations.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(5000);

/// Prefix of the on-screen caption label.
pub const CAPTION_PREFIX: &str = "CAPTION:\n";

pub fn caption_label(sentence: &str) -> String {
    format!("{}{}", CAPTION_PREFIX, sentence)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NarrationMode {
    Automatic,
    #[default]
    Manual,
}

impl NarrationMode {
    pub fn label(self) -> &'static str {
        match self {
            NarrationMode::Automatic => "AUTOMATIC",
            NarrationMode::Manual => "MANUAL",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            NarrationMode::Automatic => NarrationMode::Manual,
            NarrationMode::Manual => NarrationMode::Automatic,
        }
    }
}

/// Decides when and what to speak about the latest frame.
///
/// Automatic narrations are spaced at least `cooldown` apart and never start
/// while an utterance is playing. Manual narrations bypass both checks and do
/// not reset the cooldown.
pub struct NarrationController<R = StdRng> {
    mode: NarrationMode,
    cooldown: Duration,
    last_spoken: Option<Instant>,
    speaking: bool,
    latest: DetectionTally,
    current_utterance: Option<String>,
    utterance_seq: u64,
    rng: R,
}

impl NarrationController<StdRng> {
    pub fn new(cooldown: Duration) -> Self {
        Self::with_rng(cooldown, StdRng::from_entropy())
    }

    pub fn seeded(cooldown: Duration, seed: u64) -> Self {
        Self::with_rng(cooldown, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> NarrationController<R> {
    pub fn with_rng(cooldown: Duration, rng: R) -> Self {
        Self {
            mode: NarrationMode::default(),
            cooldown,
            last_spoken: None,
            speaking: false,
            latest: DetectionTally::default(),
            current_utterance: None,
            utterance_seq: 0,
            rng,
        }
    }

    pub fn mode(&self) -> NarrationMode {
        self.mode
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn last_spoken(&self) -> Option<Instant> {
        self.last_spoken
    }

    pub fn latest(&self) -> &DetectionTally {
        &self.latest
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn toggle_mode(&mut self) -> NarrationMode {
        self.mode = self.mode.toggled();
        log::info!("narration mode {}", self.mode.label());
        self.mode
    }

    pub fn set_mode(&mut self, mode: NarrationMode) {
        self.mode = mode;
    }

    /// Whether a frame with `tally` at `now` would trigger automatic narration.
    pub fn should_auto_narrate(&self, tally: &DetectionTally, now: Instant) -> bool {
        if self.mode != NarrationMode::Automatic || tally.is_empty() || self.speaking {
            return false;
        }
        match self.last_spoken {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        }
    }

    /// Record the latest tally and narrate it if automatic narration is due.
    ///
    /// Returns the spoken sentence.
    pub fn on_frame(
        &mut self,
        tally: DetectionTally,
        now: Instant,
        speech: &mut dyn SpeechEngine,
    ) -> Option<String> {
        let fire = self.should_auto_narrate(&tally, now);
        self.latest = tally;
        if !fire {
            return None;
        }
        self.last_spoken = Some(now);
        Some(self.speak_latest(speech))
    }

    /// Narrate the latest tally immediately (tap or voice command).
    pub fn narrate_now(&mut self, speech: &mut dyn SpeechEngine) -> String {
        self.speak_latest(speech)
    }

    /// Speak arbitrary text, interrupting any current utterance.
    pub fn announce(&mut self, text: &str, speech: &mut dyn SpeechEngine) {
        let id = self.next_utterance_id("announcement");
        if let Err(err) = speech.speak(text, &id) {
            log::warn!("speech failed: {:#}", err);
            return;
        }
        self.current_utterance = Some(id);
    }

    pub fn on_utterance(&mut self, event: &UtteranceEvent) {
        if self.current_utterance.as_deref() != Some(event.utterance_id()) {
            return;
        }
        self.speaking = matches!(event, UtteranceEvent::Started(_));
    }

    fn speak_latest(&mut self, speech: &mut dyn SpeechEngine) -> String {
        let Sentence { text, utterance_id } = compose_sentence(&self.latest, &mut self.rng);
        let id = self.next_utterance_id(utterance_id);
        match speech.speak(&text, &id) {
            Ok(()) => self.current_utterance = Some(id),
            Err(err) => log::warn!("speech failed: {:#}", err),
        }
        text
    }

    fn next_utterance_id(&mut self, kind: &str) -> String {
        self.utterance_seq += 1;
        format!("{}-{}", kind, self.utterance_seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[derive(Default)]
    struct RecordingSpeech {
        spoken: Vec<(String, String)>,
    }

    impl SpeechEngine for RecordingSpeech {
        fn speak(&mut self, text: &str, utterance_id: &str) -> Result<()> {
            self.spoken.push((text.to_string(), utterance_id.to_string()));
            Ok(())
        }
        fn stop(&mut self) {}
        fn shutdown(&mut self) {}
    }

    fn cat() -> DetectionTally {
        let mut tally = DetectionTally::new();
        tally.add("cat");
        tally
    }

    #[test]
    fn manual_mode_never_auto_narrates() {
        let mut speech = RecordingSpeech::default();
        let mut controller = NarrationController::seeded(DEFAULT_COOLDOWN, 1);
        assert_eq!(controller.mode(), NarrationMode::Manual);
        assert!(controller.on_frame(cat(), Instant::now(), &mut speech).is_none());
        assert!(speech.spoken.is_empty());
        assert_eq!(controller.latest().count("cat"), 1);
    }

    #[test]
    fn automatic_mode_respects_cooldown() {
        let mut speech = RecordingSpeech::default();
        let mut controller = NarrationController::seeded(DEFAULT_COOLDOWN, 1);
        controller.toggle_mode();
        let t0 = Instant::now();
        assert!(controller.on_frame(cat(), t0, &mut speech).is_some());
        assert!(controller
            .on_frame(cat(), t0 + Duration::from_millis(4999), &mut speech)
            .is_none());
        assert!(controller
            .on_frame(cat(), t0 + Duration::from_millis(5000), &mut speech)
            .is_some());
        assert_eq!(speech.spoken.len(), 2);
    }

    #[test]
    fn empty_tally_is_not_auto_narrated() {
        let mut speech = RecordingSpeech::default();
        let mut controller = NarrationController::seeded(DEFAULT_COOLDOWN, 1);
        controller.set_mode(NarrationMode::Automatic);
        assert!(controller
            .on_frame(DetectionTally::new(), Instant::now(), &mut speech)
            .is_none());
    }

    #[test]
    fn speaking_blocks_automatic_narration() {
        let mut speech = RecordingSpeech::default();
        let mut controller = NarrationController::seeded(DEFAULT_COOLDOWN, 1);
        controller.set_mode(NarrationMode::Automatic);
        let t0 = Instant::now();
        controller.on_frame(cat(), t0, &mut speech);
        let id = speech.spoken[0].1.clone();
        controller.on_utterance(&UtteranceEvent::Started(id.clone()));
        assert!(controller.is_speaking());

        let later = t0 + Duration::from_secs(10);
        assert!(controller.on_frame(cat(), later, &mut speech).is_none());

        controller.on_utterance(&UtteranceEvent::Done(id));
        assert!(!controller.is_speaking());
        assert!(controller.on_frame(cat(), later, &mut speech).is_some());
    }

    #[test]
    fn stale_utterance_events_are_ignored() {
        let mut speech = RecordingSpeech::default();
        let mut controller = NarrationController::seeded(DEFAULT_COOLDOWN, 1);
        controller.narrate_now(&mut speech);
        let first = speech.spoken[0].1.clone();
        controller.narrate_now(&mut speech);
        let second = speech.spoken[1].1.clone();
        controller.on_utterance(&UtteranceEvent::Started(second.clone()));
        controller.on_utterance(&UtteranceEvent::Failed(first));
        assert!(controller.is_speaking());
        controller.on_utterance(&UtteranceEvent::Done(second));
        assert!(!controller.is_speaking());
    }

    #[test]
    fn manual_narration_bypasses_cooldown_without_resetting_it() {
        let mut speech = RecordingSpeech::default();
        let mut controller = NarrationController::seeded(DEFAULT_COOLDOWN, 1);
        controller.set_mode(NarrationMode::Automatic);
        let t0 = Instant::now();
        controller.on_frame(cat(), t0, &mut speech);
        controller.narrate_now(&mut speech);
        controller.narrate_now(&mut speech);
        assert_eq!(controller.last_spoken(), Some(t0));
        assert_eq!(speech.spoken.len(), 3);
    }

    #[test]
    fn narrate_now_with_nothing_seen() {
        let mut speech = RecordingSpeech::default();
        let mut controller = NarrationController::seeded(DEFAULT_COOLDOWN, 1);
        let text = controller.narrate_now(&mut speech);
        assert!(!text.is_empty());
        assert!(speech.spoken[0].1.starts_with("nothing_detected"));
    }

    #[test]
    fn mode_labels() {
        assert_eq!(NarrationMode::Manual.label(), "MANUAL");
        assert_eq!(NarrationMode::Manual.toggled(), NarrationMode::Automatic);
        assert_eq!(caption_label("hi"), "CAPTION:\nhi");
    }
}
