//! V4L2 camera.
//!
//! Opens a local device node (e.g. /dev/video0) and streams frames through
//! memory-mapped buffers. Each capture session owns its own device handle and
//! stream; closing the session releases both, so reconfiguration reopens the node.
//!
//! V4L2 has no portable crop-region request, so digital zoom is applied to each
//! captured frame. Torch control is not exposed by most UVC devices; a torch
//! request is logged and otherwise ignored.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::device::{CameraDevice, CameraProvider, CaptureSession};
use super::request::{CameraCharacteristics, CaptureRequest, FlashMode};
use crate::config::CameraSettings;
use crate::frame::{normalize_to_rgb, Frame, PixelFormat};

const V4L2_MAX_DIGITAL_ZOOM: f32 = 4.0;

pub struct V4l2Camera {
    settings: CameraSettings,
}

impl V4l2Camera {
    pub fn new(settings: CameraSettings) -> Self {
        Self { settings }
    }
}

impl CameraProvider for V4l2Camera {
    fn camera_ids(&self) -> Result<Vec<String>> {
        Ok(vec![self.settings.device.clone()])
    }

    fn characteristics(&self, id: &str) -> Result<CameraCharacteristics> {
        use v4l::video::Capture;

        let device =
            v4l::Device::with_path(id).with_context(|| format!("open v4l2 device {}", id))?;
        let format = device.format().context("read v4l2 format")?;
        Ok(CameraCharacteristics {
            active_array: (format.width, format.height),
            max_digital_zoom: V4L2_MAX_DIGITAL_ZOOM,
        })
    }

    fn open(&mut self, id: &str) -> Result<Box<dyn CameraDevice>> {
        if id != self.settings.device {
            return Err(anyhow!("unknown camera {}", id));
        }
        Ok(Box::new(V4l2Device {
            settings: self.settings.clone(),
        }))
    }
}

struct V4l2Device {
    settings: CameraSettings,
}

impl CameraDevice for V4l2Device {
    fn id(&self) -> &str {
        &self.settings.device
    }

    fn create_session(&mut self, request: &CaptureRequest) -> Result<Box<dyn CaptureSession>> {
        Ok(Box::new(V4l2Session::start(&self.settings, *request)?))
    }

    fn close(&mut self) {
        log::debug!("V4l2Camera: device {} released", self.settings.device);
    }
}

#[self_referencing]
struct StreamState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

struct V4l2Session {
    device_path: String,
    state: Option<StreamState>,
    width: u32,
    height: u32,
    format: PixelFormat,
    request: CaptureRequest,
    frame_count: u64,
}

impl V4l2Session {
    fn start(settings: &CameraSettings, request: CaptureRequest) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&settings.device)
            .with_context(|| format!("open v4l2 device {}", settings.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    settings.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = pixel_format_for(format.fourcc)?;

        if settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Camera: failed to set fps on {}: {}",
                    settings.device,
                    err
                );
            }
        }

        if request.flash == FlashMode::Torch {
            log::warn!(
                "V4l2Camera: torch requested but not supported on {}",
                settings.device
            );
        }

        let state = StreamStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Camera: session started on {} ({}x{} {:?})",
            settings.device,
            format.width,
            format.height,
            pixel_format
        );

        Ok(Self {
            device_path: settings.device.clone(),
            state: Some(state),
            width: format.width,
            height: format.height,
            format: pixel_format,
            request,
            frame_count: 0,
        })
    }
}

impl CaptureSession for V4l2Session {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let (width, height, format) = (self.width, self.height, self.format);
        let pixels = state.with_stream_mut(|stream| -> Result<Vec<u8>> {
            let (buf, meta) = stream.next().context("capture v4l2 frame")?;
            let used = (meta.bytesused as usize).min(buf.len());
            let data = if used > 0 { &buf[..used] } else { buf };
            normalize_to_rgb(data, width, height, format)
        })?;

        self.frame_count += 1;
        let frame = Frame::from_rgb(pixels, self.width, self.height)?;
        if self.request.crop.is_full(self.width, self.height) {
            Ok(Some(frame))
        } else {
            frame.crop(&self.request.crop).map(Some)
        }
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::debug!(
                "V4l2Camera: session on {} closed after {} frames",
                self.device_path,
                self.frame_count
            );
        }
    }
}

fn pixel_format_for(fourcc: v4l::FourCC) -> Result<PixelFormat> {
    if fourcc == v4l::FourCC::new(b"RGB3") {
        Ok(PixelFormat::Rgb24)
    } else if fourcc == v4l::FourCC::new(b"YUYV") {
        Ok(PixelFormat::Yuyv)
    } else if fourcc == v4l::FourCC::new(b"NV12") {
        Ok(PixelFormat::Nv12)
    } else {
        Err(anyhow!("unsupported v4l2 pixel format {}", fourcc))
    }
}
