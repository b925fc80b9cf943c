use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::Labels;
use crate::detect::output::ModelOutput;

/// Backend that replays a fixed list of model outputs, cycling forever.
///
/// Used with synthetic cameras and in tests where the model contract matters but
/// a real network does not.
pub struct ScriptedBackend {
    outputs: Vec<ModelOutput>,
    input_size: (u32, u32),
    cursor: usize,
}

impl ScriptedBackend {
    pub fn new(outputs: Vec<ModelOutput>, input_size: (u32, u32)) -> Self {
        Self {
            outputs,
            input_size,
            cursor: 0,
        }
    }

    /// A short scene loop over the COCO label list: a person, then a cat and a
    /// dog, then three people, then nothing.
    pub fn demo(input_size: (u32, u32)) -> Self {
        let labels = Labels::coco();
        let class = |name: &str| labels.index_of(name).unwrap_or(0) as f32;
        let person = class("person");
        let cat = class("cat");
        let dog = class("dog");
        let outputs = vec![
            ModelOutput {
                locations: vec![0.1, 0.3, 0.9, 0.7, 0.0, 0.0, 0.1, 0.1],
                classes: vec![person, dog],
                scores: vec![0.92, 0.21],
            },
            ModelOutput {
                locations: vec![0.5, 0.1, 0.9, 0.4, 0.4, 0.5, 0.95, 0.9],
                classes: vec![cat, dog],
                scores: vec![0.81, 0.77],
            },
            ModelOutput {
                locations: vec![
                    0.1, 0.05, 0.8, 0.3, 0.15, 0.35, 0.85, 0.6, 0.2, 0.65, 0.9, 0.95,
                ],
                classes: vec![person, person, person],
                scores: vec![0.88, 0.74, 0.69],
            },
            ModelOutput::default(),
        ];
        Self::new(outputs, input_size)
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn infer(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<ModelOutput> {
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            ));
        }
        if self.outputs.is_empty() {
            return Ok(ModelOutput::default());
        }
        let output = self.outputs[self.cursor % self.outputs.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DEFAULT_CONFIDENCE_THRESHOLD;

    #[test]
    fn replays_outputs_in_order() -> Result<()> {
        let first = ModelOutput {
            scores: vec![0.1],
            classes: vec![0.0],
            locations: vec![0.0; 4],
        };
        let second = ModelOutput::default();
        let mut backend = ScriptedBackend::new(vec![first.clone(), second.clone()], (1, 1));
        assert_eq!(backend.infer(&[0; 3], 1, 1)?, first);
        assert_eq!(backend.infer(&[0; 3], 1, 1)?, second);
        assert_eq!(backend.infer(&[0; 3], 1, 1)?, first);
        Ok(())
    }

    #[test]
    fn rejects_wrong_input_length() {
        let mut backend = ScriptedBackend::new(vec![], (2, 2));
        assert!(backend.infer(&[0; 5], 2, 2).is_err());
    }

    #[test]
    fn demo_script_resolves_against_coco_labels() -> Result<()> {
        let mut backend = ScriptedBackend::demo((4, 4));
        let labels = Labels::coco();
        let first = backend.infer(&[0; 48], 4, 4)?;
        let detections = first.detections(&labels, DEFAULT_CONFIDENCE_THRESHOLD)?;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "person");
        Ok(())
    }
}
