use anyhow::{anyhow, Context, Result};

use super::device::{CameraDevice, CameraProvider, CaptureSession};
use super::request::{CameraCharacteristics, CaptureRequest, CaptureSettings};
use crate::frame::Frame;

/// Owns the camera device and its single preview session.
///
/// Any settings change closes the running session and configures a new one; the
/// active request is never mutated in place. Configuration failures are logged and
/// leave the preview stalled until the next reconfiguration.
pub struct CameraSessionManager {
    device: Option<Box<dyn CameraDevice>>,
    characteristics: Option<CameraCharacteristics>,
    session: Option<Box<dyn CaptureSession>>,
    request: Option<CaptureRequest>,
    settings: CaptureSettings,
    sessions_opened: u64,
}

impl CameraSessionManager {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            device: None,
            characteristics: None,
            session: None,
            request: None,
            settings,
            sessions_opened: 0,
        }
    }

    /// Open the first enumerated camera and start the preview.
    ///
    /// Returns the camera characteristics once the device is open. A session that
    /// fails to configure does not fail this call; see `is_previewing`.
    pub fn open_first(&mut self, provider: &mut dyn CameraProvider) -> Result<CameraCharacteristics> {
        self.shutdown();

        let ids = provider.camera_ids().context("enumerate cameras")?;
        let id = ids
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("no camera available"))?;
        let characteristics = provider
            .characteristics(&id)
            .with_context(|| format!("read characteristics of camera {}", id))?;
        let device = provider
            .open(&id)
            .with_context(|| format!("open camera {}", id))?;
        log::info!(
            "camera {} opened (active array {}x{}, max zoom {:.1})",
            id,
            characteristics.active_array.0,
            characteristics.active_array.1,
            characteristics.max_digital_zoom
        );

        self.device = Some(device);
        self.characteristics = Some(characteristics);
        self.start_preview();
        Ok(characteristics)
    }

    /// Replace the capture settings and restart the preview with them.
    pub fn apply(&mut self, settings: CaptureSettings) -> bool {
        self.settings = settings;
        self.start_preview()
    }

    pub fn toggle_flash(&mut self) -> bool {
        let mut settings = self.settings;
        settings.flash_on = !settings.flash_on;
        self.apply(settings)
    }

    pub fn set_zoom(&mut self, level: f32) -> bool {
        let mut settings = self.settings;
        settings.zoom = level;
        self.apply(settings)
    }

    /// Close any running session and configure a new one from the current settings.
    pub fn start_preview(&mut self) -> bool {
        self.close_session();

        let (Some(device), Some(characteristics)) = (self.device.as_mut(), self.characteristics)
        else {
            log::warn!("camera not open; preview not started");
            return false;
        };

        let request = CaptureRequest::preview(&self.settings, &characteristics);
        match device.create_session(&request) {
            Ok(session) => {
                self.sessions_opened += 1;
                self.session = Some(session);
                self.request = Some(request);
                log::debug!(
                    "camera {} preview configured (flash={:?}, crop={:?})",
                    device.id(),
                    request.flash,
                    request.crop
                );
                true
            }
            Err(err) => {
                log::error!(
                    "camera {} preview configuration failed: {:#}",
                    device.id(),
                    err
                );
                false
            }
        }
    }

    /// Next frame from the running session; `None` while stalled.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.session.as_mut() {
            Some(session) => session.next_frame(),
            None => Ok(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn is_previewing(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_request(&self) -> Option<CaptureRequest> {
        self.request
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    pub fn characteristics(&self) -> Option<CameraCharacteristics> {
        self.characteristics
    }

    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    /// Close the session and the device.
    pub fn shutdown(&mut self) {
        self.close_session();
        if let Some(mut device) = self.device.take() {
            device.close();
            log::info!("camera {} closed", device.id());
        }
        self.characteristics = None;
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.request = None;
    }
}

impl Drop for CameraSessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
