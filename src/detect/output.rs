use anyhow::{anyhow, Result};
use serde::Deserialize;

use super::labels::Labels;
use super::result::{BoundingBox, Detection};

/// Default confidence threshold. Only scores strictly above it survive.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.65;

/// Raw model output: three parallel buffers indexed by detection slot.
///
/// Slot `i` owns `locations[4 * i..4 * i + 4]` as `[top, left, bottom, right]`,
/// `classes[i]` (label index) and `scores[i]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelOutput {
    pub locations: Vec<f32>,
    pub classes: Vec<f32>,
    pub scores: Vec<f32>,
}

/// Positions of the three parallel buffers in a model's output list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputLayout {
    pub locations: usize,
    pub classes: usize,
    pub scores: usize,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            locations: 0,
            classes: 1,
            scores: 2,
        }
    }
}

impl OutputLayout {
    /// Each buffer must come from its own output.
    pub fn validate(&self) -> Result<()> {
        let OutputLayout {
            locations,
            classes,
            scores,
        } = *self;
        if locations == classes || locations == scores || classes == scores {
            return Err(anyhow!(
                "output layout reuses an index (locations={} classes={} scores={})",
                locations,
                classes,
                scores
            ));
        }
        Ok(())
    }
}

impl ModelOutput {
    pub fn slots(&self) -> usize {
        self.scores.len()
    }

    /// Filter slots by confidence and resolve labels.
    ///
    /// Inconsistent buffers or a class index outside the label list fail the whole
    /// output rather than producing a partial result.
    pub fn detections(&self, labels: &Labels, threshold: f32) -> Result<Vec<Detection>> {
        let slots = self.slots();
        if self.classes.len() < slots {
            return Err(anyhow!(
                "model returned {} scores but only {} classes",
                slots,
                self.classes.len()
            ));
        }
        if self.locations.len() < slots * 4 {
            return Err(anyhow!(
                "model returned {} scores but only {} location values",
                slots,
                self.locations.len()
            ));
        }

        let mut detections = Vec::new();
        for (slot, &score) in self.scores.iter().enumerate() {
            if score.is_nan() || score <= threshold {
                continue;
            }
            let class = self.classes[slot];
            if !class.is_finite() || class < 0.0 {
                return Err(anyhow!("slot {} has invalid class index {}", slot, class));
            }
            let label = labels.get(class as usize).ok_or_else(|| {
                anyhow!(
                    "slot {} class index {} outside label list ({} labels)",
                    slot,
                    class as usize,
                    labels.len()
                )
            })?;
            let loc = &self.locations[slot * 4..slot * 4 + 4];
            detections.push(Detection {
                slot,
                label: label.to_string(),
                score,
                bbox: BoundingBox {
                    x1: loc[1],
                    y1: loc[0],
                    x2: loc[3],
                    y2: loc[2],
                },
            });
        }
        Ok(detections)
    }
}
