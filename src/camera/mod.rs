//! Camera session management.
//!
//! - `device`: provider/device/session traits implemented by each camera backend
//! - `session`: `CameraSessionManager`, the single owner of the preview session
//! - `request`: flash mode, crop region, preview request construction
//! - `zoom`: clamped digital zoom state
//! - `worker`: the background camera context (capture + per-frame processing)
//!
//! Backends:
//! - `stub://` devices: synthetic test pattern
//! - V4L2 device nodes (feature: camera-v4l2)

mod device;
mod request;
mod session;
mod synthetic;
#[cfg(feature = "camera-v4l2")]
mod v4l2;
pub mod worker;
mod zoom;

use anyhow::Result;

use crate::config::CameraSettings;

pub use device::{CameraDevice, CameraProvider, CaptureSession};
pub use request::{CameraCharacteristics, CaptureRequest, CaptureSettings, CropRect, FlashMode};
pub use session::CameraSessionManager;
pub use synthetic::SyntheticCamera;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;
pub use worker::{CameraCommand, CameraWorker, CapturedFrame, FrameSlot};
pub use zoom::{ZoomState, MIN_ZOOM};

/// Pick a camera backend for the configured device.
pub fn provider_for(settings: &CameraSettings) -> Result<Box<dyn CameraProvider>> {
    if settings.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticCamera::new(settings.clone())?));
    }
    #[cfg(feature = "camera-v4l2")]
    {
        Ok(Box::new(V4l2Camera::new(settings.clone())))
    }
    #[cfg(not(feature = "camera-v4l2"))]
    {
        Err(anyhow::anyhow!(
            "camera device {} requires the camera-v4l2 feature",
            settings.device
        ))
    }
}
