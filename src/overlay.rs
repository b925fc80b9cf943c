//! Detection overlay rendering and publishing.
//!
//! The renderer never mutates the preview frame; it draws onto a copy so the
//! unannotated frame can still be uploaded for captioning.

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::detect::{BoundingBox, Detection};
use crate::frame::Frame;

/// Box colors indexed by model output slot (wraps after ten).
pub const PALETTE: [[u8; 3]; 10] = [
    [0, 0, 255],     // blue
    [0, 255, 0],     // green
    [255, 0, 0],     // red
    [0, 255, 255],   // cyan
    [136, 136, 136], // gray
    [0, 0, 0],       // black
    [68, 68, 68],    // dark gray
    [255, 0, 255],   // magenta
    [255, 255, 0],   // yellow
    [255, 0, 0],     // red
];

const LABEL_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

pub fn slot_color(slot: usize) -> Rgb<u8> {
    Rgb(PALETTE[slot % PALETTE.len()])
}

/// One box as drawn, in pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawnBox {
    pub slot: usize,
    pub label: String,
    pub rect: Rect,
    pub color: Rgb<u8>,
}

/// Annotated copy of a frame.
pub struct Annotated {
    pub image: RgbImage,
    pub boxes: Vec<DrawnBox>,
}

impl Annotated {
    pub fn labels(&self) -> Vec<&str> {
        self.boxes.iter().map(|b| b.label.as_str()).collect()
    }
}

pub struct OverlayRenderer {
    font: Option<FontVec>,
}

impl OverlayRenderer {
    /// Renderer without a font: boxes and label tags are drawn, text is not.
    pub fn new() -> Self {
        Self { font: None }
    }

    pub fn with_font_file(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|_| anyhow!("invalid font file {}", path.display()))?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, frame: &Frame, detections: &[Detection]) -> Result<Annotated> {
        let mut image = frame.to_rgb_image()?;
        let (width, height) = image.dimensions();
        let stroke = (height / 85).max(1);
        let text_height = (height / 15).max(1);
        let scale = PxScale::from(text_height as f32);

        let mut boxes = Vec::with_capacity(detections.len());
        for detection in detections {
            let Some(rect) = pixel_rect(&detection.bbox, width, height) else {
                log::debug!("slot {} box outside frame, skipped", detection.slot);
                continue;
            };
            let color = slot_color(detection.slot);

            for inset in 0..stroke {
                let w = rect.width().saturating_sub(2 * inset);
                let h = rect.height().saturating_sub(2 * inset);
                if w == 0 || h == 0 {
                    break;
                }
                let ring = Rect::at(rect.left() + inset as i32, rect.top() + inset as i32)
                    .of_size(w, h);
                draw_hollow_rect_mut(&mut image, ring, color);
            }

            let tag_width = match &self.font {
                Some(font) => text_size(scale, font, &detection.label).0 + 2 * stroke,
                None => rect.width(),
            };
            let tag_top = (rect.top() - text_height as i32).max(0);
            let tag = Rect::at(rect.left(), tag_top).of_size(tag_width.max(1), text_height);
            draw_filled_rect_mut(&mut image, tag, color);
            if let Some(font) = &self.font {
                draw_text_mut(
                    &mut image,
                    LABEL_TEXT,
                    rect.left() + stroke as i32,
                    tag_top,
                    scale,
                    font,
                    &detection.label,
                );
            }

            boxes.push(DrawnBox {
                slot: detection.slot,
                label: detection.label.clone(),
                rect,
                color,
            });
        }

        Ok(Annotated { image, boxes })
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale a normalized box to pixels, clamped to the frame. `None` when nothing
/// of the box is visible.
fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    let clamp = |v: f32, max: u32| -> i32 {
        if v.is_nan() {
            return 0;
        }
        (v * max as f32).round().clamp(0.0, max as f32) as i32
    };
    let left = clamp(bbox.x1.min(bbox.x2), width);
    let right = clamp(bbox.x1.max(bbox.x2), width);
    let top = clamp(bbox.y1.min(bbox.y2), height);
    let bottom = clamp(bbox.y1.max(bbox.y2), height);
    if right <= left || bottom <= top {
        return None;
    }
    Some(Rect::at(left, top).of_size((right - left) as u32, (bottom - top) as u32))
}

// ----------------------------------------------------------------------------
// Display sinks
// ----------------------------------------------------------------------------

/// Destination for annotated frames (the on-screen overlay).
pub trait DisplaySink: Send {
    fn publish(&mut self, annotated: &Annotated) -> Result<()>;
}

/// Discards annotated frames.
#[derive(Default)]
pub struct NullSink;

impl DisplaySink for NullSink {
    fn publish(&mut self, _annotated: &Annotated) -> Result<()> {
        Ok(())
    }
}

/// Writes each annotated frame to a JPEG file, replacing it atomically.
pub struct JpegFileSink {
    path: PathBuf,
    quality: u8,
    published: u64,
}

impl JpegFileSink {
    pub fn new(path: PathBuf, quality: u8) -> Self {
        Self {
            path,
            quality,
            published: 0,
        }
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl DisplaySink for JpegFileSink {
    fn publish(&mut self, annotated: &Annotated) -> Result<()> {
        let frame = Frame::from_image(annotated.image.clone());
        let jpeg = frame.encode_jpeg(self.quality)?;

        let tmp = self.path.with_extension("jpg.tmp");
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            file.write_all(&jpeg)
                .with_context(|| format!("write {}", tmp.display()))?;
            file.sync_all().ok();
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        self.published += 1;
        Ok(())
    }
}
