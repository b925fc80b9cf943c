use anyhow::Result;

use super::request::{CameraCharacteristics, CaptureRequest};
use crate::frame::Frame;

/// Enumerates and opens cameras.
pub trait CameraProvider: Send {
    /// Camera identifiers in enumeration order.
    fn camera_ids(&self) -> Result<Vec<String>>;

    fn characteristics(&self, id: &str) -> Result<CameraCharacteristics>;

    fn open(&mut self, id: &str) -> Result<Box<dyn CameraDevice>>;
}

/// An opened camera. Owns at most one capture session at a time.
pub trait CameraDevice: Send {
    fn id(&self) -> &str;

    /// Configure a new session running `request` as a repeating preview request.
    ///
    /// Callers must close any previous session first.
    fn create_session(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureSession>>;

    fn close(&mut self);
}

/// A configured, repeating preview session.
pub trait CaptureSession: Send {
    /// Next preview frame. `Ok(None)` means no frame is available right now.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Stop the repeating request and release the session.
    fn close(&mut self);
}
