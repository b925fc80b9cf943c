//! Synthetic camera for `stub://` devices.
//!
//! Produces a moving test pattern at the configured frame rate. The request's
//! crop rectangle is honoured (digital zoom) and torch mode brightens the scene,
//! so reconfiguration is observable in the output frames.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::device::{CameraDevice, CameraProvider, CaptureSession};
use super::request::{CameraCharacteristics, CaptureRequest, FlashMode};
use crate::config::CameraSettings;
use crate::frame::Frame;

const SYNTHETIC_MAX_ZOOM: f32 = 4.0;
const TORCH_BOOST: u8 = 60;

pub struct SyntheticCamera {
    settings: CameraSettings,
    frames: Arc<AtomicU64>,
}

impl SyntheticCamera {
    pub fn new(settings: CameraSettings) -> Result<Self> {
        if !settings.device.starts_with("stub://") {
            return Err(anyhow!(
                "synthetic camera requires a stub:// device, got {}",
                settings.device
            ));
        }
        Ok(Self {
            settings,
            frames: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Frames generated across all sessions.
    pub fn frames_generated(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl CameraProvider for SyntheticCamera {
    fn camera_ids(&self) -> Result<Vec<String>> {
        Ok(vec![self.settings.device.clone()])
    }

    fn characteristics(&self, id: &str) -> Result<CameraCharacteristics> {
        if id != self.settings.device {
            return Err(anyhow!("unknown camera {}", id));
        }
        Ok(CameraCharacteristics {
            active_array: (self.settings.width, self.settings.height),
            max_digital_zoom: SYNTHETIC_MAX_ZOOM,
        })
    }

    fn open(&mut self, id: &str) -> Result<Box<dyn CameraDevice>> {
        if id != self.settings.device {
            return Err(anyhow!("unknown camera {}", id));
        }
        log::info!("SyntheticCamera: opened {}", id);
        Ok(Box::new(SyntheticDevice {
            settings: self.settings.clone(),
            frames: self.frames.clone(),
            closed: false,
        }))
    }
}

struct SyntheticDevice {
    settings: CameraSettings,
    frames: Arc<AtomicU64>,
    closed: bool,
}

impl CameraDevice for SyntheticDevice {
    fn id(&self) -> &str {
        &self.settings.device
    }

    fn create_session(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureSession>> {
        if self.closed {
            return Err(anyhow!("camera {} is closed", self.settings.device));
        }
        Ok(Box::new(SyntheticSession {
            width: self.settings.width,
            height: self.settings.height,
            interval: frame_interval(self.settings.target_fps),
            request: *request,
            frames: self.frames.clone(),
            frame_count: 0,
            scene_state: 0,
            last_frame_at: None,
            open: true,
        }))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

struct SyntheticSession {
    width: u32,
    height: u32,
    interval: Duration,
    request: CaptureRequest,
    frames: Arc<AtomicU64>,
    frame_count: u64,
    scene_state: u8,
    last_frame_at: Option<Instant>,
    open: bool,
}

impl SyntheticSession {
    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width * self.height * 3) as usize;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let boost = match self.request.flash {
            FlashMode::Torch => TORCH_BOOST,
            FlashMode::Off => 0,
        };
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            let base = ((i as u64 + self.frame_count + self.scene_state as u64) % 196) as u8;
            *pixel = base.saturating_add(boost);
        }
        pixels
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl CaptureSession for SyntheticSession {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Ok(None);
        }
        self.pace();
        self.frame_count += 1;
        self.frames.fetch_add(1, Ordering::Relaxed);

        let pixels = self.generate_pixels();
        let frame = Frame::from_rgb(pixels, self.width, self.height)?;
        if self.request.crop.is_full(self.width, self.height) {
            Ok(Some(frame))
        } else {
            frame.crop(&self.request.crop).map(Some)
        }
    }

    fn close(&mut self) {
        self.open = false;
    }
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}
