use geo_types::Polygon;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    controller::TwoPassTracer,
    error::{ContourError, Result},
    measure::{bounding_box, box_score, color_contrast, label_area, label_mask},
    polar::to_polar,
    traits::{Detector, detect_wrapped},
    types::{Band, BoxRect, Contour, FloatImage, PolarFrame, SliceMeasurements},
};

/// One image slice and everything traced on it.
#[derive(Debug, Clone)]
pub struct Slice {
    pub id: String,
    /// Cartesian intensity image
    pub image: FloatImage,
    pub frame: PolarFrame,
    pub polar_image: FloatImage,
    pub polar_prob: Option<FloatImage>,
    /// Externally supplied box, e.g. from a region detector
    pub box_hint: Option<BoxRect>,
    pub contour: Contour,
    /// Pass-1 contour when the refinement pass replaced it
    pub initial_contour: Option<Contour>,
    pub band: Option<Band>,
    pub polar_box: Option<BoxRect>,
    pub measurements: SliceMeasurements,
}

impl Slice {
    pub fn new(id: impl Into<String>, image: FloatImage) -> Self {
        let (w, h) = image.dimensions();
        let frame = PolarFrame::new(w as f32 / 2.0, h as f32 / 2.0, w.min(h) as f32 / 2.0);
        Self {
            id: id.into(),
            image,
            frame,
            polar_image: FloatImage::new(0, 0),
            polar_prob: None,
            box_hint: None,
            contour: Contour::default(),
            initial_contour: None,
            band: None,
            polar_box: None,
            measurements: SliceMeasurements::default(),
        }
    }

    pub fn with_box_hint(mut self, bbox: BoxRect) -> Self {
        self.box_hint = Some(bbox);
        self
    }

    pub fn canvas(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Resample the Cartesian image around `frame` into a `rows × cols` polar
    /// image. Any previous probability map no longer matches and is dropped.
    pub fn update_polar(&mut self, frame: PolarFrame, rows: u32, cols: u32) {
        self.frame = frame;
        self.polar_image = to_polar(&self.image, &frame, rows, cols);
        self.polar_prob = None;
    }

    /// Attach a probability map computed elsewhere. It must match the polar image.
    pub fn set_probability(&mut self, prob: FloatImage) -> Result<()> {
        if prob.dimensions() != self.polar_image.dimensions() {
            return Err(ContourError::DimensionMismatch {
                intensity: self.polar_image.dimensions(),
                probability: prob.dimensions(),
            });
        }
        self.polar_prob = Some(prob);
        Ok(())
    }

    /// Compute the probability map with `detector`.
    pub fn detect<D: Detector + ?Sized>(&mut self, detector: &mut D) -> Result<()> {
        let prob = detect_wrapped(detector, &self.polar_image)?;
        self.set_probability(prob)
    }

    /// Final contour as a Cartesian polygon.
    pub fn outline(&self) -> Polygon<f32> {
        self.contour.outline(&self.frame, self.polar_image.width() as usize)
    }

    /// Run both passes and fill in the measurements.
    ///
    /// A slice without a usable probability map is not an error: it gets a
    /// zero area and no contour.
    pub fn trace(&mut self, tracer: &TwoPassTracer) -> Result<()> {
        let prob = match &self.polar_prob {
            Some(prob) if prob.width() > 0 && prob.height() > 0 => prob,
            _ => {
                warn!(slice = %self.id, "no probability map, skipping contour");
                self.contour = Contour::default();
                self.initial_contour = None;
                self.band = None;
                self.polar_box = None;
                self.measurements = SliceMeasurements::default();
                return Ok(());
            }
        };

        let outcome = tracer.trace(&self.polar_image, prob, &self.frame, self.canvas())?;
        self.contour = outcome.contour;
        self.initial_contour = outcome.initial;
        self.band = Some(outcome.band);
        self.measurements = SliceMeasurements {
            band_area: outcome.band_area,
            ..Default::default()
        };
        self.measure();
        debug!(slice = %self.id, area = self.measurements.area, "slice traced");
        Ok(())
    }

    fn measure(&mut self) {
        let cols = self.polar_image.width() as usize;
        let label = label_mask(&self.contour, cols, &self.frame, self.canvas());
        self.polar_box = bounding_box(&label);
        let m = &mut self.measurements;
        m.area = label_area(&label);
        if let Some(bbox) = &self.polar_box {
            m.color_contrast = color_contrast(&self.image, &label, bbox);
            m.polar_score = box_score(&label, bbox);
        }
        m.box_score = self.box_hint.map_or(0.0, |bbox| box_score(&label, &bbox));
    }

    pub fn report(&self) -> SliceReport {
        SliceReport {
            id: self.id.clone(),
            measurements: self.measurements,
            contour: self.contour.clone(),
            initial_contour: self.initial_contour.clone(),
            band: self.band,
            polar_box: self.polar_box,
            error: None,
        }
    }
}

/// Serializable per-slice result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceReport {
    pub id: String,
    pub measurements: SliceMeasurements,
    pub contour: Contour,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_contour: Option<Contour>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<Band>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polar_box: Option<BoxRect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{config::ContourConfig, traits::ThresholdDetector};
    use image::Luma;

    /// Bright disc with a dark rim on a mid-gray, slightly textured background.
    pub(crate) fn disc_slice(id: &str, size: u32, radius: f32) -> Slice {
        let c = size as f32 / 2.0;
        let image = FloatImage::from_fn(size, size, |x, y| {
            let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
            let v = if d < radius {
                200.0
            } else if d < radius + 4.0 {
                20.0
            } else if (x + y) % 3 == 0 {
                70.0
            } else {
                110.0
            };
            Luma([v])
        });
        let mut slice = Slice::new(id, image);
        slice.update_polar(PolarFrame::new(c, c, c), 64, 48);
        slice
    }

    /// Threshold detector producing a 0..255 map.
    pub(crate) fn detect_scaled(slice: &mut Slice) {
        let mut detector = ThresholdDetector {
            level: 150.0,
            high: 255.0,
        };
        slice.detect(&mut detector).expect("Should detect");
    }

    #[test]
    fn test_trace_disc() {
        let mut slice = disc_slice("disc", 96, 16.0);
        detect_scaled(&mut slice);

        slice.trace(&TwoPassTracer::new(ContourConfig::default())).expect("Should trace");
        assert_eq!(slice.contour.len(), 64);
        let m = slice.measurements;
        let expected = std::f32::consts::PI * 16.0 * 16.0;
        assert!((m.area - expected).abs() / expected < 0.25, "area {}", m.area);
        assert!(m.color_contrast > 50.0, "contrast {}", m.color_contrast);
        assert!(m.polar_score > 0.6 && m.polar_score <= 1.0);
        assert_eq!(m.box_score, 0.0);
        assert!(slice.polar_box.is_some());
        // closed ring
        assert_eq!(slice.outline().exterior().0.len(), 65);
    }

    #[test]
    fn test_missing_probability_is_soft() {
        let mut slice = disc_slice("empty", 32, 6.0);
        slice.measurements.area = 5.0;
        slice.trace(&TwoPassTracer::default()).expect("Should not fail");
        assert_eq!(slice.measurements.area, 0.0);
        assert!(slice.contour.is_empty());
        assert!(slice.polar_box.is_none());
    }

    #[test]
    fn test_probability_must_match() {
        let mut slice = disc_slice("bad", 32, 6.0);
        assert!(matches!(
            slice.set_probability(FloatImage::new(3, 3)),
            Err(ContourError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_box_hint_score() {
        let mut slice = disc_slice("hint", 96, 16.0).with_box_hint(BoxRect::new(32, 32, 32, 32));
        detect_scaled(&mut slice);
        slice.trace(&TwoPassTracer::default()).expect("Should trace");
        assert!(slice.measurements.box_score > 0.5, "{:?}", slice.measurements);
    }
}
