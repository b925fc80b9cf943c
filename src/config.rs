use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::caption::{parse_caption_url, DEFAULT_CAPTION_URL};
use crate::detect::{OutputLayout, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::narration::DEFAULT_COOLDOWN;

const DEFAULT_CAMERA_DEVICE: &str = "stub://rear_camera";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_INPUT_SIZE: u32 = 300;
const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Deserialize, Default)]
struct NarratorConfigFile {
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    narration: Option<NarrationConfigFile>,
    caption: Option<CaptionConfigFile>,
    overlay: Option<OverlayConfigFile>,
    voice: Option<VoiceConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    threshold: Option<f32>,
    output_layout: Option<OutputLayout>,
}

#[derive(Debug, Deserialize, Default)]
struct NarrationConfigFile {
    cooldown_ms: Option<u64>,
    speech_command: Option<String>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptionConfigFile {
    url: Option<String>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    output_path: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct VoiceConfigFile {
    input_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct NarratorConfig {
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub narration: NarrationSettings,
    pub caption: CaptionSettings,
    pub overlay: OverlaySettings,
    pub voice: VoiceSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub model_path: Option<PathBuf>,
    pub labels_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub threshold: f32,
    /// Which model output holds locations, classes and scores.
    pub output_layout: OutputLayout,
}

#[derive(Debug, Clone)]
pub struct NarrationSettings {
    pub cooldown: Duration,
    pub speech_command: Option<String>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CaptionSettings {
    pub url: String,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Default)]
pub struct OverlaySettings {
    pub output_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct VoiceSettings {
    pub input_path: Option<PathBuf>,
}

impl NarratorConfig {
    /// Load from the file named by `NARRATOR_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NARRATOR_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: NarratorConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            model_path: detector_file.model_path,
            labels_path: detector_file.labels_path,
            input_width: detector_file.input_width.unwrap_or(DEFAULT_INPUT_SIZE),
            input_height: detector_file.input_height.unwrap_or(DEFAULT_INPUT_SIZE),
            threshold: detector_file
                .threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            output_layout: detector_file.output_layout.unwrap_or_default(),
        };

        let narration_file = file.narration.unwrap_or_default();
        let narration = NarrationSettings {
            cooldown: narration_file
                .cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COOLDOWN),
            speech_command: narration_file.speech_command,
            seed: narration_file.seed,
        };

        let caption_file = file.caption.unwrap_or_default();
        let caption = CaptionSettings {
            url: caption_file
                .url
                .unwrap_or_else(|| DEFAULT_CAPTION_URL.to_string()),
            jpeg_quality: caption_file.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        };

        let overlay_file = file.overlay.unwrap_or_default();
        let overlay = OverlaySettings {
            output_path: overlay_file.output_path,
            font_path: overlay_file.font_path,
        };

        let voice = VoiceSettings {
            input_path: file.voice.and_then(|voice| voice.input_path),
        };

        Self {
            camera,
            detector,
            narration,
            caption,
            overlay,
            voice,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = env_value("NARRATOR_CAMERA") {
            self.camera.device = device;
        }
        if let Some(path) = env_value("NARRATOR_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("NARRATOR_LABELS_PATH") {
            self.detector.labels_path = Some(PathBuf::from(path));
        }
        if let Some(threshold) = env_value("NARRATOR_THRESHOLD") {
            self.detector.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("NARRATOR_THRESHOLD must be a number"))?;
        }
        if let Some(cooldown) = env_value("NARRATOR_COOLDOWN_MS") {
            let millis: u64 = cooldown.parse().map_err(|_| {
                anyhow!("NARRATOR_COOLDOWN_MS must be an integer number of milliseconds")
            })?;
            self.narration.cooldown = Duration::from_millis(millis);
        }
        if let Some(url) = env_value("NARRATOR_CAPTION_URL") {
            self.caption.url = url;
        }
        if let Some(command) = env_value("NARRATOR_SPEECH_CMD") {
            self.narration.speech_command = Some(command);
        }
        if let Some(path) = env_value("NARRATOR_OVERLAY_PATH") {
            self.overlay.output_path = Some(PathBuf::from(path));
        }
        if let Some(path) = env_value("NARRATOR_VOICE_INPUT") {
            self.voice.input_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input dimensions must be non-zero"));
        }
        let threshold = self.detector.threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(anyhow!(
                "detector threshold must be between 0 and 1, got {}",
                threshold
            ));
        }
        self.detector.output_layout.validate()?;
        if self.narration.cooldown.is_zero() {
            return Err(anyhow!("narration cooldown must be greater than zero"));
        }
        if !(1..=100).contains(&self.caption.jpeg_quality) {
            return Err(anyhow!(
                "caption jpeg_quality must be 1..=100, got {}",
                self.caption.jpeg_quality
            ));
        }
        parse_caption_url(&self.caption.url)?;
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<NarratorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
