use std::ops::Range;

use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Single-channel float image. Width is the column (radius) axis, height the
/// row (angle) axis when the image is polar.
pub type FloatImage = image::ImageBuffer<image::Luma<f32>, Vec<f32>>;

/// Half-open column interval `[lo, hi)` of legal candidates in one row.
pub type RowRange = Range<usize>;

/// One threshold per row.
pub type Thresholds = Vec<f32>;

/// Center and radius of a polar resampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarFrame {
    pub center: Coord<f32>,
    pub radius: f32,
}

impl PolarFrame {
    pub fn new(cx: f32, cy: f32, radius: f32) -> Self {
        Self {
            center: Coord { x: cx, y: cy },
            radius,
        }
    }
}

/// One column index per angular row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<usize>);

impl Contour {
    pub fn new(columns: Vec<usize>) -> Self {
        Self(columns)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Column at `row` shifted by `delta`, clamped to `[0, cols)`.
    pub fn shifted(&self, row: usize, delta: i32, cols: usize) -> usize {
        let x = self.0[row] as i64 + delta as i64;
        x.clamp(0, cols as i64 - 1) as usize
    }

    /// Closed outline of the contour in Cartesian coordinates.
    ///
    /// `cols` is the radial resolution of the polar image the contour was
    /// traced on.
    pub fn outline(&self, frame: &PolarFrame, cols: usize) -> Polygon<f32> {
        let rows = self.0.len();
        let coords: Vec<Coord<f32>> = self
            .0
            .iter()
            .enumerate()
            .map(|(y, &x)| {
                let phi = std::f64::consts::TAU * y as f64 / rows as f64;
                let rho = x as f64 * frame.radius as f64 / cols as f64;
                Coord {
                    x: frame.center.x + (rho * phi.cos()) as f32,
                    y: frame.center.y + (rho * phi.sin()) as f32,
                }
            })
            .collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    /// Area enclosed by [`Contour::outline`].
    pub fn outline_area(&self, frame: &PolarFrame, cols: usize) -> f32 {
        use geo::Area;
        self.outline(frame, cols).unsigned_area()
    }
}

impl From<Vec<usize>> for Contour {
    fn from(columns: Vec<usize>) -> Self {
        Self(columns)
    }
}

/// Axis-aligned pixel box, `x..x+width` by `y..y+height`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoxRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    /// Grow by `margin` on every side.
    pub fn expand(&self, margin: i32) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + 2 * margin,
            self.height + 2 * margin,
        )
    }

    pub fn intersect(&self, other: &BoxRect) -> Self {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            return Self::default();
        }
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Radial search band of the refinement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    /// Estimated bright→dark transition offset relative to the contour
    pub inner_offset: i32,
    /// Radial half-width of the refinement search band
    pub bound: usize,
}

/// Scalar measurements written back to a slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SliceMeasurements {
    /// Pixel sum of the Cartesian label mask
    pub area: f32,
    /// Pixel sum of the back-mapped pass-1 band
    pub band_area: f32,
    /// Mean inside color minus mean color of the surrounding ring
    pub color_contrast: f32,
    /// Overlap of the label with its own bounding box
    pub polar_score: f32,
    /// Overlap of the label with the externally supplied box
    pub box_score: f32,
}
