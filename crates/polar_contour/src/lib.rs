//! # Polar Contour Tracing Library
//!
//! Delineates a closed boundary (e.g. a ventricle wall) in a radially
//! resampled image by a dynamic-programming path search over the polar grid.
//! Rows are angles, columns are radii, and the path picks one column per row.
//!
//! ## Core Features
//!
//! - **Adaptive thresholds**: a coarse threshold from the edge bands of the
//!   probability map, then per-row thresholds relative to the coarse contour
//! - **Two passes**: a full-range coarse solve and a refinement solve inside
//!   an estimated radial band
//! - **Bounded gaps**: adjacent rows may shift by at most `gap` columns
//! - **Measurements**: label mask, bounding box, color contrast and box scores
//! - **Batch processing**: independent slices traced on a rayon pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use polar_contour::{ContourConfig, PolarFrame, Slice, ThresholdDetector, TwoPassTracer};
//!
//! let image = image::open("slice.png")?.to_luma32f();
//! let mut slice = Slice::new("slice-0", image);
//! slice.update_polar(PolarFrame::new(64.0, 64.0, 60.0), 128, 60);
//! slice.detect(&mut ThresholdDetector { level: 0.5, high: 255.0 })?;
//!
//! let tracer = TwoPassTracer::new(ContourConfig::default());
//! slice.trace(&tracer)?;
//! println!("area: {}", slice.measurements.area);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod config;
pub mod types;
pub mod traits;
pub mod polar;
pub mod grid;
pub mod threshold;
pub mod shift;
pub mod solver;
pub mod controller;
pub mod measure;
pub mod slice;
pub mod batch;

// Re-exports for convenience
pub use error::{ContourError, Result};
pub use config::{ContourConfig, ThresholdMode};
pub use types::{Band, BoxRect, Contour, FloatImage, PolarFrame, RowRange, SliceMeasurements, Thresholds};
pub use traits::*;
pub use grid::{Grid, GridCell, PolarGrid};
pub use solver::{Channel, SolveParams};
pub use controller::{TraceOutcome, TwoPassTracer};
pub use slice::{Slice, SliceReport};
pub use batch::{detect_all, reports, trace_all, trace_detected};
