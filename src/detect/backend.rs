use anyhow::Result;

use super::output::ModelOutput;

/// Object detection model backend.
///
/// A backend consumes one fixed-size RGB24 image and returns the raw parallel
/// output buffers of the model. Thresholding and label lookup happen in
/// `ModelOutput::detections`, not in the backend.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Input image dimensions the model expects (width, height).
    fn input_size(&self) -> (u32, u32);

    /// Run one synchronous inference.
    ///
    /// `pixels` is tightly packed RGB24 of exactly `input_size()` dimensions.
    fn infer(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<ModelOutput>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
