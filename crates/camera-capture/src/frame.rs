//! Video frame types and pixel access

use crate::CameraError;
use image::RgbImage;

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Three bytes per pixel, red first
    Rgb24,
    /// One intensity byte per pixel
    Gray8,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Decoded video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel data, row-major (width * height * bytes_per_pixel)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame, checking the buffer against the geometry
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        timestamp_ns: u64,
        sequence: u32,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "{}x{} {:?} frame needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                data.len()
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            format,
            timestamp_ns,
            sequence,
        })
    }

    /// Wrap a decoded RGB image
    pub fn from_rgb_image(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            format: PixelFormat::Rgb24,
            timestamp_ns,
            sequence,
        }
    }

    /// Get pixel at (x, y) as RGB; grayscale pixels are replicated
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Rgb24 => Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]]),
            PixelFormat::Gray8 => {
                let v = self.data[idx];
                Some([v, v, v])
            }
        }
    }

    /// Integer average of the three channels at (x, y)
    pub fn gray_at(&self, x: u32, y: u32) -> Option<u8> {
        self.get_pixel(x, y).map(|[r, g, b]| {
            // (r + g + b) / 3 never exceeds 255
            ((r as u16 + g as u16 + b as u16) / 3) as u8
        })
    }

    /// Grayscale values of `width` pixels starting at (x, y), or None if the
    /// span leaves the frame
    pub fn gray_row(&self, x: u32, y: u32, width: u32) -> Option<Vec<u8>> {
        if y >= self.height || x.checked_add(width)? > self.width {
            return None;
        }
        (x..x + width).map(|col| self.gray_at(col, y)).collect()
    }
}
