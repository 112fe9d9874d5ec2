//! Region of interest geometry

use camera_capture::ViewGeometry;
use serde::{Deserialize, Serialize};

/// A point in camera-view coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Quadrilateral drawn by the user over the camera preview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub corners: [Point; 4],
}

impl RegionOfInterest {
    pub fn new(corners: [Point; 4]) -> Self {
        Self { corners }
    }

    /// Rebuild the rectangle a model was trained on
    pub fn from_source_region(region: &SourceRegion) -> Self {
        let left = region.x as i32;
        let top = region.y as i32;
        let right = left + region.width as i32;
        let bottom = top + region.height as i32;
        Self {
            corners: [
                Point::new(left, top),
                Point::new(right, top),
                Point::new(left, bottom),
                Point::new(right, bottom),
            ],
        }
    }

    /// Axis-aligned bounding box, with corners clamped to the view
    pub fn bounding_box(&self, view: ViewGeometry) -> BoundingBox {
        let clamp_x = |v: i32| v.clamp(0, view.width as i32) as u32;
        let clamp_y = |v: i32| v.clamp(0, view.height as i32) as u32;

        let mut bounds = BoundingBox {
            min_x: view.width,
            max_x: 0,
            min_y: view.height,
            max_y: 0,
        };
        for corner in &self.corners {
            let x = clamp_x(corner.x);
            let y = clamp_y(corner.y);
            bounds.min_x = bounds.min_x.min(x);
            bounds.max_x = bounds.max_x.max(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_y = bounds.max_y.max(y);
        }
        bounds
    }
}

/// Bounding box in view coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn source_region(&self) -> SourceRegion {
        SourceRegion {
            x: self.min_x,
            y: self.min_y,
            width: self.width(),
            height: self.height(),
        }
    }
}

/// Position and size of the region in view coordinates, as persisted with
/// every sample and every model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_of_skewed_quad() {
        let roi = RegionOfInterest::new([
            Point::new(120, 300),
            Point::new(900, 280),
            Point::new(100, 420),
            Point::new(950, 410),
        ]);
        let bounds = roi.bounding_box(ViewGeometry::new(1080, 1440));
        assert_eq!(
            bounds,
            BoundingBox {
                min_x: 100,
                max_x: 950,
                min_y: 280,
                max_y: 420
            }
        );
        assert_eq!(bounds.width(), 850);
        assert_eq!(bounds.height(), 140);
    }

    #[test]
    fn test_corners_clamped_to_view() {
        let roi = RegionOfInterest::new([
            Point::new(-40, -5),
            Point::new(2000, 10),
            Point::new(10, 50),
            Point::new(500, 3000),
        ]);
        let bounds = roi.bounding_box(ViewGeometry::new(1080, 1440));
        assert_eq!(bounds.min_x, 0);
        assert_eq!(bounds.max_x, 1080);
        assert_eq!(bounds.min_y, 0);
        assert_eq!(bounds.max_y, 1440);
    }

    #[test]
    fn test_source_region_round_trip() {
        let region = SourceRegion {
            x: 40,
            y: 600,
            width: 800,
            height: 120,
        };
        let roi = RegionOfInterest::from_source_region(&region);
        let bounds = roi.bounding_box(ViewGeometry::new(1080, 1440));
        assert_eq!(bounds.source_region(), region);
    }
}
