use anyhow::{anyhow, Context, Result};
use std::sync::{Arc, Mutex};

use crate::detect::{Detection, DetectorBackend, Labels, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::frame::Frame;
use crate::narration::DetectionTally;

/// Result of analysing one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameAnalysis {
    pub detections: Vec<Detection>,
    pub tally: DetectionTally,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub frames_skipped: u64,
}

/// Runs one synchronous inference per frame and turns the output into detections
/// plus a per-label tally.
pub struct FrameProcessor {
    backend: Arc<Mutex<dyn DetectorBackend>>,
    labels: Labels,
    threshold: f32,
    stats: ProcessorStats,
}

impl FrameProcessor {
    pub fn new(backend: Arc<Mutex<dyn DetectorBackend>>, labels: Labels) -> Self {
        Self {
            backend,
            labels,
            threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            stats: ProcessorStats::default(),
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Resize, infer, filter, tally.
    pub fn process(&mut self, frame: &Frame) -> Result<FrameAnalysis> {
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| anyhow!("detector backend lock poisoned"))?;
        let (width, height) = backend.input_size();
        let input = frame
            .resize(width, height)
            .with_context(|| format!("resize frame to model input {}x{}", width, height))?;
        let output = backend
            .infer(input.pixels(), input.width, input.height)
            .with_context(|| format!("{} inference", backend.name()))?;
        drop(backend);

        let detections = output.detections(&self.labels, self.threshold)?;
        let tally = DetectionTally::from_detections(&detections);
        Ok(FrameAnalysis { detections, tally })
    }

    /// Process a frame if one is available.
    ///
    /// A missing frame is skipped silently. Failures are logged and the frame is
    /// dropped.
    pub fn process_snapshot(&mut self, frame: Option<&Frame>) -> Option<FrameAnalysis> {
        let Some(frame) = frame else {
            self.stats.frames_skipped += 1;
            return None;
        };
        match self.process(frame) {
            Ok(analysis) => {
                self.stats.frames_processed += 1;
                Some(analysis)
            }
            Err(err) => {
                self.stats.frames_failed += 1;
                log::warn!("frame processing failed: {:#}", err);
                None
            }
        }
    }
}
