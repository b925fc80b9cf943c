//! Online captioning: upload one frame, speak the returned caption.

mod client;
mod session;

pub use client::{
    outcome_from_body, parse_caption_url, CaptionClient, CaptionOutcome, CaptionTransport,
    DEFAULT_CAPTION_URL, IMAGE_FIELD, IMAGE_FILENAME,
};
pub use session::{OnlineSession, CAPTION_UTTERANCE, GENERATING_LABEL};
