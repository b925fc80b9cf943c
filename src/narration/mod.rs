//! Spoken descriptions of what the camera sees.
//!
//! - `tally`: per-label counts for one frame
//! - `phrases`: sentence templates by count band
//! - `controller`: mode, cooldown and speaking state

mod controller;
mod phrases;
mod tally;

pub use controller::{
    caption_label, NarrationController, NarrationMode, CAPTION_PREFIX, DEFAULT_COOLDOWN,
};
pub use phrases::{compose_sentence, Sentence, NOTHING_DETECTED, OBJECT_DETECTED};
pub use tally::DetectionTally;
