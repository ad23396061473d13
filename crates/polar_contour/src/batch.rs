//! Parallel processing of many slices.
//!
//! Every slice owns its images and its DP workspace, so slices are traced
//! independently on the rayon pool. Results come back in slice order and a
//! failing slice never aborts the others.

use rayon::prelude::*;
use tracing::{error, info};

use crate::{
    controller::TwoPassTracer,
    error::{ContourError, Result},
    slice::{Slice, SliceReport},
    traits::Detector,
};

/// Compute probability maps for all slices.
///
/// `make_detector` is called once per rayon work split, and the detector it
/// returns is reused for every slice of that split.
pub fn detect_all<D, F>(slices: &mut [Slice], make_detector: F) -> Vec<Result<()>>
where
    D: Detector,
    F: Fn() -> D + Sync + Send,
{
    slices
        .par_iter_mut()
        .map_init(make_detector, |detector, slice| {
            slice.detect(detector).map_err(|e| e.in_slice(&slice.id))
        })
        .collect()
}

fn trace_one(slice: &mut Slice, tracer: &TwoPassTracer) -> Result<()> {
    slice.trace(tracer).map_err(|e| {
        error!(slice = %slice.id, error = %e, "tracing failed");
        e.in_slice(&slice.id)
    })
}

/// Trace every slice. The returned vector is indexed like `slices`.
pub fn trace_all(slices: &mut [Slice], tracer: &TwoPassTracer) -> Vec<Result<()>> {
    info!(slices = slices.len(), "tracing");
    slices.par_iter_mut().map(|slice| trace_one(slice, tracer)).collect()
}

/// Trace the slices whose detection succeeded.
///
/// `detected` is the output of [`detect_all`] for the same slices. A failed
/// detection is passed through as that slice's result and the slice is left
/// untraced; missing entries count as successes.
pub fn trace_detected(slices: &mut [Slice], detected: Vec<Result<()>>, tracer: &TwoPassTracer) -> Vec<Result<()>> {
    let mut failures: Vec<Option<ContourError>> = detected.into_iter().map(Result::err).collect();
    failures.resize_with(slices.len(), || None);
    info!(
        slices = slices.len(),
        failed_detections = failures.iter().filter(|f| f.is_some()).count(),
        "tracing"
    );
    slices
        .par_iter_mut()
        .zip(failures)
        .map(|(slice, failure)| match failure {
            Some(e) => {
                error!(slice = %slice.id, error = %e, "detection failed, not tracing");
                Err(e)
            }
            None => trace_one(slice, tracer),
        })
        .collect()
}

/// Reports for all slices, with the failure message of slices that failed.
pub fn reports(slices: &[Slice], results: &[Result<()>]) -> Vec<SliceReport> {
    slices
        .iter()
        .zip(results)
        .map(|(slice, result)| {
            let mut report = slice.report();
            if let Err(e) = result {
                report.error = Some(e.to_string());
            }
            report
        })
        .collect()
}
