//! Object detection: model backends, label lists and output decoding.

mod backend;
mod backends;
mod labels;
mod output;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::Labels;
pub use output::{ModelOutput, OutputLayout, DEFAULT_CONFIDENCE_THRESHOLD};
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{BoundingBox, Detection};
