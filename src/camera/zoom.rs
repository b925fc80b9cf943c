use super::request::CropRect;

pub const MIN_ZOOM: f32 = 1.0;

/// Digital zoom level, always within `[1.0, max]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomState {
    level: f32,
    max: f32,
}

impl ZoomState {
    pub fn new(max: f32) -> Self {
        Self {
            level: MIN_ZOOM,
            max: sanitize_max(max),
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Update the device maximum. The current level is re-clamped.
    pub fn set_max(&mut self, max: f32) {
        self.max = sanitize_max(max);
        self.level = self.level.clamp(MIN_ZOOM, self.max);
    }

    pub fn set_level(&mut self, level: f32) -> f32 {
        if level.is_finite() {
            self.level = level.clamp(MIN_ZOOM, self.max);
        }
        self.level
    }

    /// Apply one pinch step. Non-finite or non-positive factors are ignored.
    pub fn apply_scale(&mut self, factor: f32) -> f32 {
        if factor.is_finite() && factor > 0.0 {
            self.set_level(self.level * factor);
        }
        self.level
    }

    /// Centered crop proportional to the active array.
    pub fn crop_rect(&self, active_array: (u32, u32)) -> CropRect {
        let (width, height) = active_array;
        let crop_w = ((width as f32 / self.level) as u32).clamp(1.min(width), width);
        let crop_h = ((height as f32 / self.level) as u32).clamp(1.min(height), height);
        CropRect {
            x: (width - crop_w) / 2,
            y: (height - crop_h) / 2,
            width: crop_w,
            height: crop_h,
        }
    }
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new(MIN_ZOOM)
    }
}

fn sanitize_max(max: f32) -> f32 {
    if max.is_finite() {
        max.max(MIN_ZOOM)
    } else {
        MIN_ZOOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn pinch_sequences_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut zoom = ZoomState::new(8.0);
        for _ in 0..10_000 {
            let factor: f32 = rng.gen_range(0.2..5.0);
            let level = zoom.apply_scale(factor);
            assert!((MIN_ZOOM..=8.0).contains(&level), "level {} out of range", level);
        }
    }

    #[test]
    fn hostile_factors_are_ignored() {
        let mut zoom = ZoomState::new(4.0);
        zoom.apply_scale(2.0);
        assert_eq!(zoom.apply_scale(f32::NAN), 2.0);
        assert_eq!(zoom.apply_scale(-3.0), 2.0);
        assert_eq!(zoom.apply_scale(0.0), 2.0);
        assert_eq!(zoom.apply_scale(f32::INFINITY), 2.0);
    }

    #[test]
    fn device_without_zoom_stays_at_one() {
        let mut zoom = ZoomState::default();
        assert_eq!(zoom.apply_scale(3.0), 1.0);
        zoom.set_max(0.5);
        assert_eq!(zoom.max(), 1.0);
    }

    #[test]
    fn lowering_max_reclamps_level() {
        let mut zoom = ZoomState::new(6.0);
        zoom.set_level(5.0);
        zoom.set_max(3.0);
        assert_eq!(zoom.level(), 3.0);
    }

    #[test]
    fn crop_rect_is_centered() {
        let mut zoom = ZoomState::new(4.0);
        zoom.set_level(4.0);
        assert_eq!(
            zoom.crop_rect((640, 480)),
            CropRect {
                x: 240,
                y: 180,
                width: 160,
                height: 120
            }
        );
        assert!(ZoomState::default().crop_rect((640, 480)).is_full(640, 480));
    }
}
