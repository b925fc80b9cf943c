/// Bounding box in normalized 0..1 image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

/// One model output entry that survived the confidence filter.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Output slot index in the model's buffers.
    pub slot: usize,
    pub label: String,
    /// Confidence in 0..1.
    pub score: f32,
    pub bbox: BoundingBox,
}
