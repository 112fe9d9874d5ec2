//! Scan-line extraction and feature vector assembly

use crate::region::{BoundingBox, RegionOfInterest, SourceRegion};
use crate::FeatureError;
use camera_capture::{VideoFrame, ViewGeometry};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Grayscale intensities (0-255) of one extracted scan-line
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GrayRow(pub Vec<u8>);

impl GrayRow {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The row reversed end to end
    pub fn mirrored(&self) -> GrayRow {
        GrayRow(self.0.iter().rev().copied().collect())
    }

    /// Bias-prefixed feature vector for this row
    pub fn features(&self) -> FeatureVector {
        FeatureVector::from_gray(&self.0)
    }
}

impl From<Vec<u8>> for GrayRow {
    fn from(pixels: Vec<u8>) -> Self {
        GrayRow(pixels)
    }
}

/// Model input: `[1.0, gray_0 / 255, gray_1 / 255, ...]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// Build from raw grayscale values, prepending the bias term
    pub fn from_gray(pixels: &[u8]) -> Self {
        let mut values = Vec::with_capacity(pixels.len() + 1);
        values.push(1.0);
        values.extend(pixels.iter().map(|&p| p as f64 / 255.0));
        Self { values }
    }

    /// Wrap already-assembled values (bias included)
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Total length, bias included
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of pixel features (length without the bias)
    pub fn pixel_count(&self) -> usize {
        self.values.len().saturating_sub(1)
    }
}

/// Result of extracting one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    /// Region in view coordinates the row was taken from
    pub region: SourceRegion,
    /// Width of the extracted row in frame pixels
    pub processed_width: u32,
    /// Always 1: only a single scan-line is used
    pub processed_height: u32,
    /// Grayscale pixels of the row
    pub pixels: GrayRow,
}

impl ExtractedRow {
    pub fn features(&self) -> FeatureVector {
        self.pixels.features()
    }
}

/// Extracts the scan-line under a fixed region of interest
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    view: ViewGeometry,
    bounds: BoundingBox,
}

impl FeatureExtractor {
    /// Create an extractor for a region drawn on a view of the given size
    pub fn new(view: ViewGeometry, roi: &RegionOfInterest) -> Self {
        let bounds = roi.bounding_box(view);
        debug!(
            "Feature extractor over view {}x{}, box x={}..{} y={}..{}",
            view.width, view.height, bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y
        );
        Self { view, bounds }
    }

    /// Recreate the extractor a model was trained with
    pub fn from_source_region(view: ViewGeometry, region: &SourceRegion) -> Self {
        Self::new(view, &RegionOfInterest::from_source_region(region))
    }

    pub fn region(&self) -> SourceRegion {
        self.bounds.source_region()
    }

    /// Extract the single grayscale row at the top of the region
    pub fn extract(&self, frame: &VideoFrame) -> Result<ExtractedRow, FeatureError> {
        if self.view.width == 0 || frame.width == 0 {
            return Err(FeatureError::Geometry(format!(
                "cannot scale view width {} onto frame width {}",
                self.view.width, frame.width
            )));
        }

        // View and frame share an aspect ratio, so one factor covers both axes
        let scale = self.view.width as f64 / frame.width as f64;
        let min_x = (self.bounds.min_x as f64 / scale) as u32;
        let max_x = (self.bounds.max_x as f64 / scale) as u32;
        let min_y = (self.bounds.min_y as f64 / scale) as u32;
        let width = max_x.saturating_sub(min_x);

        if width == 0 {
            return Err(FeatureError::Geometry(format!(
                "region x={}..{} collapses to zero width on a {}px frame",
                self.bounds.min_x, self.bounds.max_x, frame.width
            )));
        }

        let pixels = frame.gray_row(min_x, min_y, width).ok_or_else(|| {
            FeatureError::Geometry(format!(
                "row x={}..{} y={} lies outside {}x{} frame",
                min_x,
                min_x + width,
                min_y,
                frame.width,
                frame.height
            ))
        })?;

        debug!(
            "Extracted {} pixels from frame {} at y={}",
            pixels.len(),
            frame.sequence,
            min_y
        );

        Ok(ExtractedRow {
            region: self.bounds.source_region(),
            processed_width: width,
            processed_height: 1,
            pixels: GrayRow(pixels),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Point;
    use camera_capture::PixelFormat;
    use proptest::prelude::*;

    fn ramp_frame(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let v = (x * 10 + y) as u8;
                data.extend_from_slice(&[v, v, v]);
            }
        }
        VideoFrame::new(data, width, height, PixelFormat::Rgb24, 0, 7).unwrap()
    }

    fn rect(left: i32, top: i32, right: i32, bottom: i32) -> RegionOfInterest {
        RegionOfInterest::new([
            Point::new(left, top),
            Point::new(right, top),
            Point::new(left, bottom),
            Point::new(right, bottom),
        ])
    }

    #[test]
    fn test_features_start_with_bias() {
        let features = FeatureVector::from_gray(&[0, 255, 51]);
        assert_eq!(features.values(), &[1.0, 0.0, 1.0, 0.2]);
        assert_eq!(features.pixel_count(), 3);
    }

    #[test]
    fn test_extract_scales_view_to_frame() {
        // View is 4x the frame
        let extractor = FeatureExtractor::new(ViewGeometry::new(80, 40), &rect(8, 12, 40, 36));
        let frame = ramp_frame(20, 10);

        let row = extractor.extract(&frame).unwrap();
        assert_eq!(row.processed_width, 8);
        assert_eq!(row.processed_height, 1);
        // x = 2..10 at y = 3
        assert_eq!(row.pixels.as_slice()[0], 23);
        assert_eq!(row.pixels.as_slice()[7], 93);
        assert_eq!(
            row.region,
            SourceRegion {
                x: 8,
                y: 12,
                width: 32,
                height: 24
            }
        );
        assert_eq!(row.features().len(), 9);
    }

    #[test]
    fn test_zero_width_region_fails() {
        let extractor = FeatureExtractor::new(ViewGeometry::new(80, 40), &rect(10, 10, 10, 20));
        let result = extractor.extract(&ramp_frame(20, 10));
        assert!(matches!(result, Err(FeatureError::Geometry(_))));
    }

    #[test]
    fn test_region_collapsing_after_scaling_fails() {
        // 2 view pixels become less than one frame pixel
        let extractor = FeatureExtractor::new(ViewGeometry::new(80, 40), &rect(9, 10, 11, 20));
        assert!(extractor.extract(&ramp_frame(20, 10)).is_err());
    }

    #[test]
    fn test_region_below_frame_fails() {
        // Bottom edge of the view maps to row 10 of a 10-row frame
        let extractor = FeatureExtractor::new(ViewGeometry::new(80, 40), &rect(0, 40, 40, 40));
        assert!(matches!(
            extractor.extract(&ramp_frame(20, 10)),
            Err(FeatureError::Geometry(_))
        ));
    }

    #[test]
    fn test_from_source_region_matches_drawn_region() {
        let view = ViewGeometry::new(80, 40);
        let drawn = FeatureExtractor::new(view, &rect(8, 12, 40, 36));
        let rebuilt = FeatureExtractor::from_source_region(view, &drawn.region());

        let frame = ramp_frame(20, 10);
        assert_eq!(
            drawn.extract(&frame).unwrap(),
            rebuilt.extract(&frame).unwrap()
        );
    }

    proptest! {
        #[test]
        fn prop_mirror_is_involution(pixels in proptest::collection::vec(any::<u8>(), 0..64)) {
            let row = GrayRow(pixels);
            prop_assert_eq!(row.mirrored().mirrored(), row);
        }

        #[test]
        fn prop_features_in_unit_range(pixels in proptest::collection::vec(any::<u8>(), 1..64)) {
            let features = FeatureVector::from_gray(&pixels);
            prop_assert_eq!(features.len(), pixels.len() + 1);
            prop_assert!(features.values()[1..].iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
