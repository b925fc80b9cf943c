use anyhow::{anyhow, Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Hosted captioning endpoint.
pub const DEFAULT_CAPTION_URL: &str = "https://icadio-server.vercel.app/caption";

pub const IMAGE_FIELD: &str = "image";
pub const IMAGE_FILENAME: &str = "webcam_image.jpg";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How a caption request ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptionOutcome {
    /// 2xx with a `caption` field.
    Caption(String),
    /// Non-2xx with an `error` field.
    Rejected(String),
    /// Transport failure or a body that could not be understood.
    Failed(String),
}

impl CaptionOutcome {
    /// Text shown in the caption label.
    pub fn display_text(&self) -> String {
        match self {
            CaptionOutcome::Caption(caption) => caption.clone(),
            CaptionOutcome::Rejected(error) | CaptionOutcome::Failed(error) => {
                format!("Error: {}", error)
            }
        }
    }
}

/// Uploads one JPEG and reports the outcome. Never fails: every error becomes
/// an outcome.
pub trait CaptionTransport: Send + Sync {
    fn request_caption(&self, jpeg: &[u8]) -> CaptionOutcome;
}

#[derive(Deserialize)]
struct CaptionBody {
    caption: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Interpret a response body according to the HTTP status class.
pub fn outcome_from_body(success: bool, body: &str) -> CaptionOutcome {
    if success {
        match serde_json::from_str::<CaptionBody>(body) {
            Ok(parsed) => CaptionOutcome::Caption(parsed.caption),
            Err(err) => CaptionOutcome::Failed(format!("invalid caption response: {}", err)),
        }
    } else {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => CaptionOutcome::Rejected(parsed.error),
            Err(err) => CaptionOutcome::Failed(format!("invalid error response: {}", err)),
        }
    }
}

/// HTTP client for the captioning endpoint.
pub struct CaptionClient {
    url: Url,
    http: reqwest::blocking::Client,
}

impl CaptionClient {
    pub fn new(url: &str) -> Result<Self> {
        let url = parse_caption_url(url)?;
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .context("build caption http client")?;
        Ok(Self { url, http })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn post(&self, jpeg: &[u8]) -> CaptionOutcome {
        let part = match Part::bytes(jpeg.to_vec())
            .file_name(IMAGE_FILENAME)
            .mime_str("image/jpeg")
        {
            Ok(part) => part,
            Err(err) => return CaptionOutcome::Failed(format!("build upload: {}", err)),
        };
        let form = Form::new().part(IMAGE_FIELD, part);

        let response = match self.http.post(self.url.clone()).multipart(form).send() {
            Ok(response) => response,
            Err(err) => return CaptionOutcome::Failed(format!("{:#}", anyhow::Error::new(err))),
        };

        let status = response.status();
        if !status.is_success() {
            log::warn!("caption endpoint returned HTTP {}", status);
        }
        match response.text() {
            Ok(text) => outcome_from_body(status.is_success(), &text),
            Err(err) => CaptionOutcome::Failed(format!("read caption response: {}", err)),
        }
    }
}

impl CaptionTransport for CaptionClient {
    fn request_caption(&self, jpeg: &[u8]) -> CaptionOutcome {
        log::debug!("uploading {} byte frame to {}", jpeg.len(), self.url);
        let outcome = self.post(jpeg);
        if let CaptionOutcome::Failed(message) = &outcome {
            log::warn!("caption request failed: {}", message);
        }
        outcome
    }
}

pub fn parse_caption_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).with_context(|| format!("invalid caption url {}", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("caption url must be http or https, got {}", other)),
    }
}
