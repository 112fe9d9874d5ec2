//! Upscaled strip image of an extracted row, for display only

use crate::features::GrayRow;
use crate::FeatureError;
use image::{GrayImage, Luma};
use std::path::Path;

/// Number of times the row is stacked vertically in a rendered strip
pub const STRIP_REPEAT: u32 = 10;

/// Stack the row `repeat` times into a grayscale image
pub fn render_strip(row: &GrayRow, repeat: u32) -> GrayImage {
    let pixels = row.as_slice();
    GrayImage::from_fn(pixels.len() as u32, repeat.max(1), |x, _| {
        Luma([pixels[x as usize]])
    })
}

/// Render the strip and write it to `path` (format from the extension)
pub fn save_strip(row: &GrayRow, repeat: u32, path: &Path) -> Result<(), FeatureError> {
    if row.is_empty() {
        return Err(FeatureError::Render("cannot render an empty row".to_string()));
    }
    render_strip(row, repeat)
        .save(path)
        .map_err(|e| FeatureError::Render(format!("{}: {}", path.display(), e)))
}
