// THEORY:
// The `frame` module is the boundary between the engine and whatever captures or
// decodes video. A frame is a "dumb" container: a flat byte buffer plus the three
// numbers needed to walk it (width, stride, pixel format). The engine never owns
// pixel data it did not receive and never writes into a frame.
//
// Key architectural principles:
// 1.  **Trait Boundary**: `Frame` is a trait so callers can hand the engine whatever
//     handle suits them: an owned `RawFrame`, an `Arc` shared with a renderer, a
//     plain reference, or an `image` buffer straight from a decoder.
// 2.  **Row Geometry**: Rows are `stride` bytes apart and the height is implied by
//     the buffer length. Only the first `width * bytes_per_pixel` bytes of a row
//     carry pixels; padding is still averaged like any other byte.
// 3.  **Shape Snapshot**: `FrameShape` captures everything about a frame's layout
//     that must stay constant for the lifetime of a stream.

use crate::error::MotionError;
use std::fmt;
use std::sync::Arc;

/// Pixel encodings a frame can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// One byte of luma per pixel.
    Luma,
    /// Packed 4:2:2 YUV, byte order Y0 Cb Y1 Cr, two pixels per group.
    Yuyv,
    /// Packed 3-byte RGB.
    Rgb,
    /// Packed 4-byte RGBA. Recognized but not scored by the engine.
    Rgba,
    /// Any other capture format, tagged with its fourcc.
    Unknown(u32),
}

impl PixelFormat {
    /// Bytes occupied by a single pixel, if the layout is known.
    pub fn bytes_per_pixel(&self) -> Option<usize> {
        match self {
            PixelFormat::Luma => Some(1),
            PixelFormat::Yuyv => Some(2),
            PixelFormat::Rgb => Some(3),
            PixelFormat::Rgba => Some(4),
            PixelFormat::Unknown(_) => None,
        }
    }
}

/// A raster frame as seen by the motion engine.
pub trait Frame {
    fn bytes(&self) -> &[u8];
    /// Width in pixels.
    fn width(&self) -> usize;
    /// Distance in bytes between the starts of two consecutive rows.
    fn stride(&self) -> usize;
    fn format(&self) -> PixelFormat;

    fn height(&self) -> usize {
        match self.stride() {
            0 => 0,
            stride => self.bytes().len() / stride,
        }
    }

    fn shape(&self) -> FrameShape {
        FrameShape {
            byte_len: self.bytes().len(),
            width: self.width(),
            stride: self.stride(),
            format: self.format(),
        }
    }
}

/// The layout of a frame, fixed for a stream once the first frame is seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameShape {
    pub byte_len: usize,
    pub width: usize,
    pub stride: usize,
    pub format: PixelFormat,
}

impl FrameShape {
    pub fn height(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.byte_len / self.stride
        }
    }

    /// Checks that the numbers describe a walkable buffer.
    pub fn check_geometry(&self) -> Result<(), MotionError> {
        if self.width == 0 || self.stride == 0 || self.byte_len == 0 {
            return Err(MotionError::InvalidGeometry(format!("empty frame {self}")));
        }
        if self.byte_len % self.stride != 0 {
            return Err(MotionError::InvalidGeometry(format!(
                "{} bytes is not a whole number of {}-byte rows",
                self.byte_len, self.stride
            )));
        }
        if let Some(bpp) = self.format.bytes_per_pixel() {
            if self.stride < self.width * bpp {
                return Err(MotionError::InvalidGeometry(format!(
                    "stride {} is shorter than {} pixels of {:?}",
                    self.stride, self.width, self.format
                )));
            }
        }
        if self.format == PixelFormat::Yuyv && self.width % 2 != 0 {
            return Err(MotionError::InvalidGeometry(format!(
                "YUYV width must be even, got {}",
                self.width
            )));
        }
        Ok(())
    }
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {}px wide, stride {}, {} bytes",
            self.format, self.width, self.stride, self.byte_len
        )
    }
}

/// An owned frame with validated geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    bytes: Vec<u8>,
    width: usize,
    stride: usize,
    format: PixelFormat,
}

impl RawFrame {
    pub fn new(
        bytes: Vec<u8>,
        width: usize,
        stride: usize,
        format: PixelFormat,
    ) -> Result<Self, MotionError> {
        let frame = Self {
            bytes,
            width,
            stride,
            format,
        };
        frame.shape().check_geometry()?;
        Ok(frame)
    }

    /// Builds a frame whose rows carry no padding.
    pub fn packed(bytes: Vec<u8>, width: usize, format: PixelFormat) -> Result<Self, MotionError> {
        let bpp = format
            .bytes_per_pixel()
            .ok_or(MotionError::UnsupportedPixelFormat(format))?;
        Self::new(bytes, width, width * bpp, format)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Frame for RawFrame {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn width(&self) -> usize {
        self.width
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

impl<T: Frame + ?Sized> Frame for &T {
    fn bytes(&self) -> &[u8] {
        (**self).bytes()
    }

    fn width(&self) -> usize {
        (**self).width()
    }

    fn stride(&self) -> usize {
        (**self).stride()
    }

    fn format(&self) -> PixelFormat {
        (**self).format()
    }
}

impl<T: Frame + ?Sized> Frame for Arc<T> {
    fn bytes(&self) -> &[u8] {
        (**self).bytes()
    }

    fn width(&self) -> usize {
        (**self).width()
    }

    fn stride(&self) -> usize {
        (**self).stride()
    }

    fn format(&self) -> PixelFormat {
        (**self).format()
    }
}

impl Frame for image::GrayImage {
    fn bytes(&self) -> &[u8] {
        self.as_raw()
    }

    fn width(&self) -> usize {
        image::ImageBuffer::width(self) as usize
    }

    fn stride(&self) -> usize {
        image::ImageBuffer::width(self) as usize
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Luma
    }
}

impl Frame for image::RgbImage {
    fn bytes(&self) -> &[u8] {
        self.as_raw()
    }

    fn width(&self) -> usize {
        image::ImageBuffer::width(self) as usize
    }

    fn stride(&self) -> usize {
        image::ImageBuffer::width(self) as usize * 3
    }

    fn format(&self) -> PixelFormat {
        PixelFormat::Rgb
    }
}
