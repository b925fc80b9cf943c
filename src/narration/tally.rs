use std::fmt;

use crate::detect::Detection;

/// Per-label detection counts for one frame, in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionTally {
    entries: Vec<(String, usize)>,
}

impl DetectionTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut tally = Self::new();
        for detection in detections {
            tally.add(&detection.label);
        }
        tally
    }

    pub fn add(&mut self, label: &str) {
        match self.entries.iter_mut().find(|(name, _)| name == label) {
            Some((_, count)) => *count += 1,
            None => self.entries.push((label.to_string(), 1)),
        }
    }

    pub fn count(&self, label: &str) -> usize {
        self.entries
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Number of detections counted.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

/// `"1 cat, 2 person"`
impl fmt::Display for DetectionTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, count)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", count, name)?;
        }
        Ok(())
    }
}
