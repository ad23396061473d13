use image::{GenericImageView, Luma};

use crate::{
    error::{ContourError, Result},
    types::FloatImage,
};

/// Produces a per-pixel probability map for a polar image.
///
/// Implementations may hold expensive model state; the batch runner builds
/// one per worker and reuses it for every slice that worker handles.
pub trait Detector: Send {
    fn apply(&mut self, polar: &FloatImage) -> Result<FloatImage>;
}

impl<F> Detector for F
where
    F: FnMut(&FloatImage) -> Result<FloatImage> + Send,
{
    fn apply(&mut self, polar: &FloatImage) -> Result<FloatImage> {
        self(polar)
    }
}

/// Run `detector` on a polar image padded with a quarter of its rows from
/// the opposite end on each side, so the map is continuous across the
/// angular seam. The padding is cropped from the result.
pub fn detect_wrapped<D: Detector + ?Sized>(detector: &mut D, polar: &FloatImage) -> Result<FloatImage> {
    let (cols, rows) = polar.dimensions();
    let m = rows / 4;
    if m == 0 {
        return detector.apply(polar);
    }
    let extended = FloatImage::from_fn(cols, rows + 2 * m, |x, y| {
        let src = (y + rows - m) % rows;
        *polar.get_pixel(x, src)
    });
    let prob = detector.apply(&extended)?;
    if prob.dimensions() != extended.dimensions() {
        return Err(ContourError::DimensionMismatch {
            intensity: extended.dimensions(),
            probability: prob.dimensions(),
        });
    }
    Ok(prob.view(0, m, cols, rows).to_image())
}

/// Reference detector: `high` for pixels at or above `level`, 0 below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDetector {
    pub level: f32,
    pub high: f32,
}

impl Detector for ThresholdDetector {
    fn apply(&mut self, polar: &FloatImage) -> Result<FloatImage> {
        let ThresholdDetector { level, high } = *self;
        Ok(FloatImage::from_fn(polar.width(), polar.height(), |x, y| {
            Luma([if polar.get_pixel(x, y)[0] >= level { high } else { 0.0 }])
        }))
    }
}
