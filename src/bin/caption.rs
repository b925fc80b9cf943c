//! caption - upload one JPEG to the captioning endpoint and print the caption.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use scene_narrator::caption::{CaptionClient, CaptionOutcome, CaptionTransport, DEFAULT_CAPTION_URL};
use scene_narrator::Frame;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JPEG image to caption.
    image: PathBuf,
    /// Captioning endpoint.
    #[arg(long, env = "NARRATOR_CAPTION_URL", default_value = DEFAULT_CAPTION_URL)]
    url: String,
    /// Re-encode the image at this JPEG quality before upload.
    #[arg(long)]
    quality: Option<u8>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("failed to read {}", args.image.display()))?;
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return Err(anyhow!("{} is not a JPEG file", args.image.display()));
    }
    let jpeg = match args.quality {
        Some(quality) => {
            let image = image::load_from_memory(&bytes)
                .with_context(|| format!("decode {}", args.image.display()))?;
            Frame::from_image(image.into_rgb8()).encode_jpeg(quality)?
        }
        None => bytes,
    };

    let client = CaptionClient::new(&args.url)?;
    log::info!("uploading {} bytes to {}", jpeg.len(), client.url());
    match client.request_caption(&jpeg) {
        CaptionOutcome::Caption(caption) => {
            println!("{}", caption);
            Ok(())
        }
        CaptionOutcome::Rejected(error) => Err(anyhow!("caption rejected: {}", error)),
        CaptionOutcome::Failed(message) => Err(anyhow!("caption request failed: {}", message)),
    }
}
