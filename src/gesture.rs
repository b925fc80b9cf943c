//! Touch gesture routing and haptic feedback.

use std::time::Duration;

/// Recognised touch gestures, as delivered by the platform gesture detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    Down,
    SingleTapConfirmed,
    DoubleTap,
    LongPress,
    Fling { velocity_x: f32, velocity_y: f32 },
    Pinch { scale: f32 },
}

/// Which screen is in front.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Screen {
    #[default]
    Detection,
    Online,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    Narrate,
    ToggleMode,
    OpenCaptioning,
    OpenDetection,
    ToggleFlash,
    Zoom(f32),
    RequestCaption,
}

impl Action {
    /// Whether the action is acknowledged with a short vibration.
    pub fn pulses(&self) -> bool {
        matches!(
            self,
            Action::Narrate | Action::ToggleMode | Action::OpenCaptioning
        )
    }
}

fn is_horizontal(velocity_x: f32, velocity_y: f32) -> bool {
    velocity_x.abs() > velocity_y.abs()
}

/// Map a gesture to an action for the given screen. `None` means ignored.
pub fn dispatch(screen: Screen, gesture: Gesture) -> Option<Action> {
    match (screen, gesture) {
        (Screen::Detection, Gesture::SingleTapConfirmed) => Some(Action::Narrate),
        (Screen::Detection, Gesture::DoubleTap) => Some(Action::ToggleMode),
        (Screen::Detection, Gesture::LongPress) => Some(Action::OpenCaptioning),
        (Screen::Detection, Gesture::Pinch { scale }) => Some(Action::Zoom(scale)),
        (Screen::Online, Gesture::Down) => Some(Action::RequestCaption),
        (Screen::Online, Gesture::LongPress) => Some(Action::OpenDetection),
        (_, Gesture::Fling {
            velocity_x,
            velocity_y,
        }) if is_horizontal(velocity_x, velocity_y) => Some(Action::ToggleFlash),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// Haptics
// ----------------------------------------------------------------------------

/// Acknowledgement pulse for taps and long presses.
pub const TAP_PULSE: Duration = Duration::from_millis(100);

/// Vibrate, pause, vibrate: a caption has arrived.
pub const CAPTION_PATTERN: [Duration; 3] = [
    Duration::from_millis(200),
    Duration::from_millis(100),
    Duration::from_millis(200),
];

/// Vibration motor. `pattern` alternates on and off durations, starting on.
pub trait Haptics: Send {
    fn vibrate(&mut self, pattern: &[Duration]);
}

/// Logs vibrations; used where no motor exists.
#[derive(Default)]
pub struct LogHaptics {
    pulses: u64,
}

impl LogHaptics {
    pub fn pulses(&self) -> u64 {
        self.pulses
    }
}

impl Haptics for LogHaptics {
    fn vibrate(&mut self, pattern: &[Duration]) {
        self.pulses += 1;
        let millis: Vec<u128> = pattern.iter().map(Duration::as_millis).collect();
        log::debug!("vibrate {:?} ms", millis);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_screen_routes() {
        let s = Screen::Detection;
        assert_eq!(dispatch(s, Gesture::SingleTapConfirmed), Some(Action::Narrate));
        assert_eq!(dispatch(s, Gesture::DoubleTap), Some(Action::ToggleMode));
        assert_eq!(dispatch(s, Gesture::LongPress), Some(Action::OpenCaptioning));
        assert_eq!(dispatch(s, Gesture::Pinch { scale: 1.5 }), Some(Action::Zoom(1.5)));
        assert_eq!(dispatch(s, Gesture::Down), None);
    }

    #[test]
    fn online_screen_routes() {
        let s = Screen::Online;
        assert_eq!(dispatch(s, Gesture::Down), Some(Action::RequestCaption));
        assert_eq!(dispatch(s, Gesture::LongPress), Some(Action::OpenDetection));
        assert_eq!(dispatch(s, Gesture::SingleTapConfirmed), None);
        assert_eq!(dispatch(s, Gesture::DoubleTap), None);
        assert_eq!(dispatch(s, Gesture::Pinch { scale: 2.0 }), None);
    }

    #[test]
    fn only_horizontal_flings_toggle_flash() {
        for screen in [Screen::Detection, Screen::Online] {
            let horizontal = Gesture::Fling {
                velocity_x: -900.0,
                velocity_y: 100.0,
            };
            let vertical = Gesture::Fling {
                velocity_x: 100.0,
                velocity_y: 900.0,
            };
            let diagonal = Gesture::Fling {
                velocity_x: 500.0,
                velocity_y: -500.0,
            };
            assert_eq!(dispatch(screen, horizontal), Some(Action::ToggleFlash));
            assert_eq!(dispatch(screen, vertical), None);
            assert_eq!(dispatch(screen, diagonal), None);
        }
    }

    #[test]
    fn pulse_actions() {
        assert!(Action::Narrate.pulses());
        assert!(Action::OpenCaptioning.pulses());
        assert!(!Action::OpenDetection.pulses());
        assert!(!Action::ToggleFlash.pulses());
        assert!(!Action::RequestCaption.pulses());
    }
}
