#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::output::{ModelOutput, OutputLayout};

/// Tract-based backend for SSD-style ONNX detectors.
///
/// The model takes one `u8` NHWC image `[1, height, width, 3]` and returns box
/// locations, class indices and scores as separate outputs.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    layout: OutputLayout,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    u8::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            layout: OutputLayout::default(),
        })
    }

    /// Override the output buffer order.
    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        if width != self.width || height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                width,
                height,
                self.width,
                self.height
            ));
        }

        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, height as usize, width, 3),
            |(_, y, x, channel)| pixels[(y * width + x) * 3 + channel],
        );

        Ok(input.into_tensor())
    }

    fn extract(outputs: &TVec<TValue>, index: usize, what: &str) -> Result<Vec<f32>> {
        let output = outputs
            .get(index)
            .ok_or_else(|| anyhow!("model produced no output #{} ({})", index, what))?;
        let values = output
            .cast_to::<f32>()
            .with_context(|| format!("model {} output is not numeric", what))?;
        Ok(values
            .as_slice::<f32>()
            .with_context(|| format!("model {} output is not contiguous", what))?
            .to_vec())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn infer(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<ModelOutput> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        Ok(ModelOutput {
            locations: Self::extract(&outputs, self.layout.locations, "locations")?,
            classes: Self::extract(&outputs, self.layout.classes, "classes")?,
            scores: Self::extract(&outputs, self.layout.scores, "scores")?,
        })
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = vec![0u8; (self.width as usize) * (self.height as usize) * 3];
        self.infer(&blank, self.width, self.height).map(|_| ())
    }
}
