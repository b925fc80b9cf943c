use super::zoom::ZoomState;

/// Flash behaviour carried by a preview request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlashMode {
    #[default]
    Off,
    Torch,
}

/// Crop region in active-array coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn is_full(&self, width: u32, height: u32) -> bool {
        *self == Self::full(width, height)
    }
}

/// Static properties reported by a camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraCharacteristics {
    /// Active pixel array (width, height).
    pub active_array: (u32, u32),
    /// Maximum digital zoom factor; 1.0 means no zoom.
    pub max_digital_zoom: f32,
}

/// User-controlled capture settings. Owned by the main thread and pushed to the
/// camera worker whenever they change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureSettings {
    pub flash_on: bool,
    pub zoom: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            flash_on: false,
            zoom: 1.0,
        }
    }
}

/// Repeating preview request built from settings and camera characteristics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureRequest {
    pub flash: FlashMode,
    pub crop: CropRect,
}

impl CaptureRequest {
    pub fn preview(settings: &CaptureSettings, characteristics: &CameraCharacteristics) -> Self {
        let mut zoom = ZoomState::new(characteristics.max_digital_zoom);
        zoom.set_level(settings.zoom);
        Self {
            flash: if settings.flash_on {
                FlashMode::Torch
            } else {
                FlashMode::Off
            },
            crop: zoom.crop_rect(characteristics.active_array),
        }
    }
}
