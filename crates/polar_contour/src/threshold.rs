//! Per-row thresholds and the signed local cost derived from them.

use std::ops::Range;

use image::Luma;
use tracing::debug;

use crate::{
    config::{ContourConfig, ThresholdMode},
    error::{ContourError, Result},
    types::{Contour, FloatImage, Thresholds},
};

/// Signed cost of the cells of one row, relative to the row threshold.
///
/// Below-threshold values are scaled by `discount`. With `monotonic` the
/// deltas never increase along the scan order of a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowCost {
    pub threshold: f32,
    pub discount: f32,
    pub monotonic: bool,
    pub step_cost: f32,
}

impl RowCost {
    #[inline]
    pub fn delta(&self, value: f32) -> f32 {
        let delta = value - self.threshold;
        if delta < 0.0 { delta * self.discount } else { delta }
    }

    /// Deltas of `values` in scan order, clamped when monotonic.
    pub fn deltas<I>(self, values: I) -> impl Iterator<Item = f32>
    where
        I: IntoIterator<Item = f32>,
    {
        let mut last = f32::INFINITY;
        values.into_iter().map(move |value| {
            let mut delta = self.delta(value);
            if self.monotonic {
                if delta > last {
                    delta = last;
                } else {
                    last = delta;
                }
            }
            delta
        })
    }
}

/// Which extreme the contour average looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Window with the highest mean
    Bright,
    /// Window with the lowest mean
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContourStats {
    pub mean: f32,
    pub sigma: f32,
}

/// Mean of `image` over the column range, all rows.
fn column_mean(image: &FloatImage, cols: Range<u32>) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for y in 0..image.height() {
        for x in cols.clone() {
            sum += image.get_pixel(x, y)[0] as f64;
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { (sum / count as f64) as f32 }
}

/// Mean over the first `margin` columns (the near-radius edge).
fn near_mean(image: &FloatImage, margin: usize) -> f32 {
    let m = (margin as u32).min(image.width());
    column_mean(image, 0..m)
}

/// Pass-1 threshold from the near and far edge bands of the probability map,
/// broadcast to every row.
pub fn global_threshold(probability: &FloatImage, margin: usize, fraction: f32) -> Result<Thresholds> {
    let (cols, rows) = probability.dimensions();
    if cols == 0 || rows == 0 {
        return Err(ContourError::EmptyImage("probability"));
    }
    let m = (margin.max(1) as u32).min(cols);
    let big_mean = column_mean(probability, 0..m);
    let small_mean = column_mean(probability, cols - m..cols);
    let th = if !(small_mean < big_mean) {
        small_mean.max(big_mean)
    } else {
        small_mean + (big_mean - small_mean) * fraction
    };
    debug!(big_mean, small_mean, th, "global threshold");
    Ok(vec![th; rows as usize])
}

/// Average of the pixels at `contour[y] + delta` over the rows.
///
/// With `pct < 1` only the best circular run of `floor(rows·pct)` rows is
/// averaged: the darkest for [`Sign::Dark`], the brightest for
/// [`Sign::Bright`]. The run must cover more than half of the rows.
pub fn contour_avg(
    image: &FloatImage,
    contour: &Contour,
    delta: i32,
    pct: f32,
    sign: Sign,
) -> Result<ContourStats> {
    let rows = image.height() as usize;
    let cols = image.width() as usize;
    if contour.len() != rows {
        return Err(ContourError::ContourLength {
            got: contour.len(),
            rows,
        });
    }
    if rows == 0 || cols == 0 {
        return Err(ContourError::EmptyImage("contour average"));
    }
    let samples: Vec<f64> = (0..rows)
        .map(|y| image.get_pixel(contour.shifted(y, delta, cols) as u32, y as u32)[0] as f64)
        .collect();

    let n = ((rows as f32 * pct) as usize).min(rows);
    if n <= rows / 2 {
        return Err(ContourError::invalid(
            "pct",
            format!("{pct} covers {n} of {rows} rows, need more than half"),
        ));
    }

    let mut begin = 0;
    if n < rows {
        // prefix sums over the sequence repeated once
        let mut prefix = Vec::with_capacity(2 * rows + 1);
        prefix.push(0.0f64);
        for i in 0..2 * rows {
            let last = prefix[i];
            prefix.push(last + samples[i % rows]);
        }
        let mut best = match sign {
            Sign::Dark => f64::INFINITY,
            Sign::Bright => f64::NEG_INFINITY,
        };
        for s in 0..rows {
            let sum = prefix[s + n] - prefix[s];
            let better = match sign {
                Sign::Dark => sum < best,
                Sign::Bright => sum > best,
            };
            if better {
                best = sum;
                begin = s;
            }
        }
    }

    let window = (begin..begin + n).map(|i| samples[i % rows]);
    let mean = window.clone().sum::<f64>() / n as f64;
    let var = window.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    Ok(ContourStats {
        mean: mean as f32,
        sigma: var.sqrt() as f32,
    })
}

/// Grayscale erosion with a `k × k` box; pixels outside the image are ignored.
pub fn erode(image: &FloatImage, k: usize) -> FloatImage {
    let (w, h) = image.dimensions();
    let before = (k / 2) as i64;
    let after = (k as i64 - 1 - before).max(0);
    let window = |c: u32, len: u32| {
        let lo = (c as i64 - before).max(0) as u32;
        let hi = (c as i64 + after).min(len as i64 - 1) as u32;
        lo..=hi
    };
    let horizontal = FloatImage::from_fn(w, h, |x, y| {
        let v = window(x, w)
            .map(|xx| image.get_pixel(xx, y)[0])
            .fold(f32::INFINITY, f32::min);
        Luma([v])
    });
    FloatImage::from_fn(w, h, |x, y| {
        let v = window(y, h)
            .map(|yy| horizontal.get_pixel(x, yy)[0])
            .fold(f32::INFINITY, f32::min);
        Luma([v])
    })
}

/// Pass-2 thresholds relative to a previously traced contour.
///
/// Looks at offsets `-lower_backoff..bound` around the contour for the
/// darkest value and places the threshold `th2` of the way from there to the
/// near-edge mean of the intensity image.
pub fn contour_threshold(
    image: &FloatImage,
    contour: &Contour,
    lower_backoff: usize,
    bound: usize,
    config: &ContourConfig,
) -> Result<Thresholds> {
    let rows = image.height() as usize;
    let cols = image.width() as usize;
    if contour.len() != rows {
        return Err(ContourError::ContourLength {
            got: contour.len(),
            rows,
        });
    }
    if cols == 0 {
        return Err(ContourError::EmptyImage("intensity"));
    }
    let big_mean = near_mean(image, config.margin1);
    let offsets = -(lower_backoff as i32)..bound as i32;

    match config.threshold_mode() {
        ThresholdMode::Global => {
            let mut small = big_mean;
            for delta in offsets {
                let stats = contour_avg(image, contour, delta, config.ctrpct, Sign::Dark)?;
                small = small.min(stats.mean);
            }
            let th = small + (big_mean - small) * config.th2;
            debug!(big_mean, small, th, "global contour threshold");
            Ok(vec![th; rows])
        }
        ThresholdMode::PerRow => {
            let eroded = erode(image, config.mink);
            let ths = (0..rows)
                .map(|y| {
                    let small = offsets
                        .clone()
                        .map(|delta| eroded.get_pixel(contour.shifted(y, delta, cols) as u32, y as u32)[0])
                        .fold(big_mean, f32::min);
                    small + (big_mean - small) * config.th2
                })
                .collect();
            Ok(ths)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(cols: u32, rows: u32, v: f32) -> FloatImage {
        FloatImage::from_pixel(cols, rows, Luma([v]))
    }

    #[test]
    fn test_global_threshold_degenerate_uniform() {
        let prob = uniform(16, 8, 0.3);
        let ths = global_threshold(&prob, 5, 0.7).expect("Should compute threshold");
        assert_eq!(ths.len(), 8);
        assert!(ths.iter().all(|&t| (t - 0.3).abs() < 1e-6));
    }

    #[test]
    fn test_global_threshold_degenerate_inverted() {
        // far edge brighter than near edge
        let prob = FloatImage::from_fn(16, 4, |x, _| Luma([if x < 8 { 0.2 } else { 0.9 }]));
        let ths = global_threshold(&prob, 4, 0.5).expect("Should compute threshold");
        assert!(ths.iter().all(|&t| (t - 0.9).abs() < 1e-6));
    }

    #[test]
    fn test_global_threshold_formula() {
        // near mean 1.0, far mean 0.2
        let prob = FloatImage::from_fn(16, 4, |x, _| Luma([if x < 8 { 1.0 } else { 0.2 }]));
        let ths = global_threshold(&prob, 4, 0.25).expect("Should compute threshold");
        let expected = 0.2 + (1.0 - 0.2) * 0.25;
        assert!(ths.iter().all(|&t| (t - expected).abs() < 1e-6));
    }

    #[test]
    fn test_row_cost_discount_and_monotonic() {
        let cost = RowCost {
            threshold: 5.0,
            discount: 0.5,
            monotonic: false,
            step_cost: 0.0,
        };
        assert_eq!(cost.delta(7.0), 2.0);
        assert_eq!(cost.delta(1.0), -2.0);

        let values = [9.0, 6.0, 8.0, 2.0, 7.0, 5.0];
        let plain: Vec<f32> = cost.deltas(values).collect();
        assert_eq!(plain, vec![4.0, 1.0, 3.0, -1.5, 2.0, 0.0]);

        let mono: Vec<f32> = RowCost { monotonic: true, ..cost }.deltas(values).collect();
        assert_eq!(mono, vec![4.0, 1.0, 1.0, -1.5, -1.5, -1.5]);
        assert!(mono.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_contour_avg_plain_mean() {
        let image = FloatImage::from_fn(8, 4, |x, y| Luma([(x + y) as f32]));
        let contour = Contour::new(vec![2, 2, 2, 2]);
        let stats = contour_avg(&image, &contour, 1, 1.0, Sign::Dark).expect("Should average");
        // samples 3, 4, 5, 6
        assert!((stats.mean - 4.5).abs() < 1e-6);
        assert!((stats.sigma - 1.25f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_contour_avg_clamps_offsets() {
        let image = FloatImage::from_fn(4, 2, |x, _| Luma([x as f32]));
        let contour = Contour::new(vec![0, 3]);
        let low = contour_avg(&image, &contour, -5, 1.0, Sign::Dark).expect("Should average");
        assert_eq!(low.mean, 0.0);
        let high = contour_avg(&image, &contour, 5, 1.0, Sign::Dark).expect("Should average");
        assert_eq!(high.mean, 3.0);
    }

    #[test]
    fn test_contour_avg_window_wraps() {
        // 10 rows, dark values planted at rows 9, 0 and 1 around the wrap point
        let dark_rows = [9, 0, 1];
        let image = FloatImage::from_fn(4, 10, |_, y| {
            Luma([if dark_rows.contains(&(y as usize)) { 0.0 } else { 10.0 }])
        });
        let contour = Contour::new(vec![1; 10]);

        // 0.6 → window of 6 rows; the darkest run must include 9, 0 and 1
        let dark = contour_avg(&image, &contour, 0, 0.6, Sign::Dark).expect("Should average");
        assert!((dark.mean - 30.0 / 6.0).abs() < 1e-5, "mean {}", dark.mean);

        let bright = contour_avg(&image, &contour, 0, 0.6, Sign::Bright).expect("Should average");
        assert!((bright.mean - 10.0).abs() < 1e-5);
        assert_eq!(bright.sigma, 0.0);
    }

    #[test]
    fn test_contour_avg_window_length_rounding() {
        // 10 × 0.9 must give a 9-row window
        let image = FloatImage::from_fn(2, 10, |_, y| Luma([y as f32]));
        let contour = Contour::new(vec![0; 10]);
        let dark = contour_avg(&image, &contour, 0, 0.9, Sign::Dark).expect("Should average");
        // rows 0..9 without the brightest one
        assert!((dark.mean - 4.0).abs() < 1e-5, "mean {}", dark.mean);
        let bright = contour_avg(&image, &contour, 0, 0.9, Sign::Bright).expect("Should average");
        assert!((bright.mean - 5.0).abs() < 1e-5, "mean {}", bright.mean);
    }

    #[test]
    fn test_contour_avg_rejects_small_coverage() {
        let image = uniform(4, 10, 1.0);
        let contour = Contour::new(vec![0; 10]);
        assert!(matches!(
            contour_avg(&image, &contour, 0, 0.5, Sign::Dark),
            Err(ContourError::InvalidParameter { name: "pct", .. })
        ));
        assert!(matches!(
            contour_avg(&image, &Contour::new(vec![0; 3]), 0, 1.0, Sign::Dark),
            Err(ContourError::ContourLength { got: 3, rows: 10 })
        ));
    }

    #[test]
    fn test_erode_removes_salt() {
        let mut image = uniform(7, 7, 10.0);
        image.put_pixel(3, 3, Luma([0.0]));
        let eroded = erode(&image, 3);
        assert_eq!(eroded.get_pixel(2, 2)[0], 0.0);
        assert_eq!(eroded.get_pixel(4, 4)[0], 0.0);
        assert_eq!(eroded.get_pixel(5, 5)[0], 10.0);
        assert_eq!(eroded.get_pixel(0, 0)[0], 10.0);
    }

    #[test]
    fn test_contour_threshold_per_row_and_global() {
        // bright inside (cols < 6), dark band at 6..9, mid beyond
        let image = FloatImage::from_fn(16, 8, |x, _| {
            Luma([if x < 6 {
                100.0
            } else if x < 9 {
                10.0
            } else {
                50.0
            }])
        });
        let contour = Contour::new(vec![5; 8]);
        let config = ContourConfig {
            margin1: 5,
            th2: 0.5,
            mink: 1,
            ..Default::default()
        };
        let ths = contour_threshold(&image, &contour, 0, 3, &config).expect("Should compute");
        assert_eq!(ths.len(), 8);
        assert!(ths.iter().all(|&t| (t - 55.0).abs() < 1e-4));

        let global = ContourConfig { gth2: true, ..config };
        let ths = contour_threshold(&image, &contour, 0, 3, &global).expect("Should compute");
        assert!(ths.iter().all(|&t| (t - 55.0).abs() < 1e-4));
    }
}
