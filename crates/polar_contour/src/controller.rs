use tracing::{debug, warn};

use crate::{
    config::ContourConfig,
    error::Result,
    grid::PolarGrid,
    measure::band_area,
    shift::find_band,
    solver::{Channel, SolveParams},
    threshold::{contour_threshold, global_threshold},
    types::{Band, Contour, FloatImage, PolarFrame, RowRange},
};

/// Result of tracing one polar slice.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceOutcome {
    /// Final contour (refined when the second pass ran)
    pub contour: Contour,
    /// Pass-1 contour, present only when the second pass replaced it
    pub initial: Option<Contour>,
    /// Band estimated around the pass-1 contour
    pub band: Band,
    /// Cartesian pixel count of the pass-1 band
    pub band_area: f32,
}

/// Runs the coarse pass and, when enabled, the refinement pass.
#[derive(Debug, Clone, Default)]
pub struct TwoPassTracer {
    config: ContourConfig,
}

impl TwoPassTracer {
    pub fn new(config: ContourConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContourConfig {
        &self.config
    }

    fn coarse_params(&self) -> SolveParams {
        SolveParams {
            channel: Channel::Probability,
            monotonic: false,
            discount: 1.0,
            smoothing: self.config.smooth1,
            max_gap: self.config.gap,
            step_cost: 0.0,
        }
    }

    fn refine_params(&self) -> SolveParams {
        SolveParams {
            channel: Channel::Color,
            monotonic: true,
            discount: self.config.ndisc,
            smoothing: self.config.smooth2,
            max_gap: self.config.gap,
            step_cost: self.config.scost2,
        }
    }

    /// Trace the polar `image` using its probability map `prob`. `canvas` is
    /// the size of the Cartesian image the polar one was sampled from.
    pub fn trace(
        &self,
        image: &FloatImage,
        prob: &FloatImage,
        frame: &PolarFrame,
        canvas: (u32, u32),
    ) -> Result<TraceOutcome> {
        let config = &self.config;
        let mut grid = PolarGrid::new(image, prob, frame.radius)?;
        let rows = grid.rows();
        let cols = grid.cols();

        let full: Vec<RowRange> = vec![0..cols; rows];
        let ths = global_threshold(prob, config.margin1, config.th1)?;
        let contour = grid.solve(&full, &ths, &self.coarse_params())?;

        let band = find_band(image, &contour, config)?;
        let band_area = band_area(&contour, band.bound, cols, frame, canvas);
        debug!(?band, band_area, "coarse pass done");

        if !config.extend {
            return Ok(TraceOutcome {
                contour,
                initial: None,
                band,
                band_area,
            });
        }

        let narrow: Vec<RowRange> = contour
            .iter()
            .map(|c| c.saturating_sub(config.minus)..(c + band.bound).min(cols))
            .collect();
        if let Some(row) = narrow.iter().position(|r| r.is_empty()) {
            warn!(row, bound = band.bound, minus = config.minus, "empty refinement range, keeping the coarse contour");
            return Ok(TraceOutcome {
                contour,
                initial: None,
                band,
                band_area,
            });
        }
        let ths = contour_threshold(image, &contour, config.minus, band.bound, config)?;
        let refined = grid.solve(&narrow, &ths, &self.refine_params())?;

        Ok(TraceOutcome {
            contour: refined,
            initial: Some(contour),
            band,
            band_area,
        })
    }
}
