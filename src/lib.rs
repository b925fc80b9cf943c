//! Scene Narrator
//!
//! Real-time object detection on a camera preview, with a box overlay, spoken
//! descriptions of what is in view, gesture and voice control, and an online mode
//! that sends a single frame to a remote captioning service.
//!
//! # Threads
//!
//! - main thread: `app::App` owns all UI state and handles `app::Event`s
//! - camera worker: session lifecycle plus per-frame detection and overlay
//! - helpers: speech playback, voice listening, caption requests, control input
//!
//! Helpers never share state with the main thread; they post events.
//!
//! # Module Structure
//!
//! - `frame`: RGB preview frames and pixel format conversion
//! - `camera`: camera sessions, flash and zoom, the camera worker
//! - `detect`: model backends, labels, output decoding
//! - `processor`: frame → detections + tally
//! - `overlay`: box drawing and display sinks
//! - `narration`: sentences, cooldown, narration mode
//! - `speech`: TTS and voice command seams
//! - `gesture`: gesture → action routing, haptics
//! - `caption`: remote captioning client and online screen state
//! - `permissions`: camera/microphone checks
//! - `app`: event loop and screens
//! - `control`: text control lines for headless runs
//! - `pipeline`: builds the above from `config::NarratorConfig`

pub mod app;
pub mod camera;
pub mod caption;
pub mod config;
pub mod control;
pub mod detect;
pub mod frame;
pub mod gesture;
pub mod narration;
pub mod overlay;
pub mod permissions;
pub mod pipeline;
pub mod processor;
pub mod speech;

pub use app::{App, Event, Screen, StatusView};
pub use camera::{CameraSessionManager, CaptureSettings, ZoomState};
pub use caption::{CaptionClient, CaptionOutcome, OnlineSession};
pub use config::NarratorConfig;
pub use detect::{Detection, DetectorBackend, Labels, ModelOutput};
pub use frame::Frame;
pub use gesture::{Action, Gesture};
pub use narration::{DetectionTally, NarrationController, NarrationMode};
pub use overlay::OverlayRenderer;
pub use processor::{FrameAnalysis, FrameProcessor};
pub use speech::{SpeechEngine, UtteranceEvent};
