//! Builds the running pieces from configuration.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use crate::app::Event;
use crate::config::{
    CameraSettings, DetectorSettings, NarrationSettings, NarratorConfig, OverlaySettings,
};
use crate::detect::{BackendRegistry, Labels, ScriptedBackend, SharedBackend};
use crate::narration::NarrationController;
use crate::overlay::{DisplaySink, JpegFileSink, NullSink, OverlayRenderer};
use crate::processor::FrameProcessor;
use crate::speech::{CommandSpeech, SilentSpeech, SpeechEngine, UtteranceCallback};

const OVERLAY_JPEG_QUALITY: u8 = 85;

pub fn load_labels(settings: &DetectorSettings) -> Result<Labels> {
    match &settings.labels_path {
        Some(path) => Labels::load(path),
        None => Ok(Labels::coco()),
    }
}

/// Pick the detector backend. A configured model wins; synthetic cameras
/// without one replay a demo script; real cameras need a model.
pub fn build_backend(detector: &DetectorSettings, camera: &CameraSettings) -> Result<SharedBackend> {
    let size = (detector.input_width, detector.input_height);
    let mut registry = BackendRegistry::new();
    if let Some(path) = &detector.model_path {
        register_model(&mut registry, path, detector)?;
    }
    if camera.device.starts_with("stub://") {
        registry.register(ScriptedBackend::demo(size));
    }

    let preferred = if detector.model_path.is_some() {
        "tract"
    } else {
        "scripted"
    };
    registry
        .set_default(preferred)
        .with_context(|| format!("no detector model configured for camera {}", camera.device))?;
    if preferred == "scripted" {
        log::info!("no model configured; using scripted detections");
    }
    registry.warm_up_all()?;

    let backend = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend registered"))?;
    log::info!(
        "detector backend {} ({}x{}), available: {}",
        preferred,
        size.0,
        size.1,
        registry.list().join(", ")
    );
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn register_model(
    registry: &mut BackendRegistry,
    path: &Path,
    detector: &DetectorSettings,
) -> Result<()> {
    let backend = crate::detect::TractBackend::new(path, detector.input_width, detector.input_height)?
        .with_layout(detector.output_layout);
    registry.register(backend);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_model(
    _registry: &mut BackendRegistry,
    path: &Path,
    _detector: &DetectorSettings,
) -> Result<()> {
    Err(anyhow!(
        "model {} requires the backend-tract feature",
        path.display()
    ))
}

pub fn build_processor(config: &NarratorConfig) -> Result<FrameProcessor> {
    let labels = load_labels(&config.detector)?;
    let backend = build_backend(&config.detector, &config.camera)?;
    Ok(FrameProcessor::new(backend, labels).with_threshold(config.detector.threshold))
}

/// A missing or broken font only disables label text.
pub fn build_renderer(settings: &OverlaySettings) -> OverlayRenderer {
    match &settings.font_path {
        Some(path) => OverlayRenderer::with_font_file(path).unwrap_or_else(|err| {
            log::warn!("overlay font unavailable: {:#}", err);
            OverlayRenderer::new()
        }),
        None => OverlayRenderer::new(),
    }
}

pub fn build_sink(settings: &OverlaySettings) -> Box<dyn DisplaySink> {
    match &settings.output_path {
        Some(path) => Box::new(JpegFileSink::new(path.clone(), OVERLAY_JPEG_QUALITY)),
        None => Box::new(NullSink),
    }
}

/// Speech engine reporting utterance progress as events. Falls back to silence
/// when the configured program cannot be used.
pub fn build_speech(settings: &NarrationSettings, events: Sender<Event>) -> Box<dyn SpeechEngine> {
    let Some(command) = &settings.speech_command else {
        return Box::new(SilentSpeech::default());
    };
    let events = Mutex::new(events);
    let notify: UtteranceCallback = Arc::new(move |event| {
        if let Ok(events) = events.lock() {
            let _ = events.send(Event::Utterance(event));
        }
    });
    match CommandSpeech::new(command, notify) {
        Ok(speech) => Box::new(speech),
        Err(err) => {
            log::error!("speech engine init failed: {:#}", err);
            Box::new(SilentSpeech::default())
        }
    }
}

pub fn build_narration(settings: &NarrationSettings) -> NarrationController {
    match settings.seed {
        Some(seed) => NarrationController::seeded(settings.cooldown, seed),
        None => NarrationController::new(settings.cooldown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::path::PathBuf;

    fn config() -> NarratorConfig {
        NarratorConfig::load_from(None).unwrap()
    }

    #[test]
    fn stub_camera_gets_scripted_backend() -> Result<()> {
        let config = config();
        let backend = build_backend(&config.detector, &config.camera)?;
        assert_eq!(backend.lock().unwrap().name(), "scripted");
        assert_eq!(backend.lock().unwrap().input_size(), (300, 300));
        Ok(())
    }

    #[test]
    fn real_camera_without_model_is_an_error() {
        let mut config = config();
        config.camera.device = "/dev/video0".to_string();
        let err = build_backend(&config.detector, &config.camera)
            .err()
            .expect("expected build_backend to fail");
        let message = format!("{:#}", err);
        assert!(message.contains("no detector model configured for camera /dev/video0"));
        assert!(message.contains("backend 'scripted' not registered"));
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn model_without_tract_feature_is_an_error() {
        let mut config = config();
        config.detector.model_path = Some(PathBuf::from("ssd.onnx"));
        let err = build_backend(&config.detector, &config.camera)
            .err()
            .expect("expected build_backend to fail");
        assert!(err.to_string().contains("requires the backend-tract feature"));
    }

    #[test]
    fn default_processor_detects_demo_person() -> Result<()> {
        let mut processor = build_processor(&config())?;
        let frame = Frame::from_rgb(vec![0; 64 * 48 * 3], 64, 48)?;
        let analysis = processor.process(&frame)?;
        assert_eq!(analysis.tally.count("person"), 1);
        Ok(())
    }

    #[test]
    fn missing_font_falls_back() {
        let renderer = build_renderer(&OverlaySettings {
            output_path: None,
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
        });
        assert!(!renderer.has_font());
    }

    #[test]
    fn speech_defaults_to_silent() {
        let (tx, _rx) = std::sync::mpsc::channel();
        let mut speech = build_speech(&config().narration, tx);
        assert!(speech.speak("hello", "u1").is_ok());
    }

    #[test]
    fn narration_uses_configured_cooldown() {
        let mut settings = config().narration;
        settings.cooldown = std::time::Duration::from_millis(1500);
        settings.seed = Some(1);
        let narration = build_narration(&settings);
        assert_eq!(narration.cooldown(), std::time::Duration::from_millis(1500));
    }
}
