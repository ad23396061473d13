use tracing::debug;

use crate::{
    config::ContourConfig,
    error::Result,
    threshold::{Sign, contour_avg},
    types::{Band, Contour, FloatImage},
};

/// Estimate the radial search band of the refinement pass around `contour`.
///
/// Offsets `-margin1..=margin2` are swept. The bright→dark transition is the
/// offset with the steepest windowed drop between the bright and dark
/// contour averages; the band then runs to the end of the flattest stretch
/// of the dark average's deviation.
pub fn find_band(image: &FloatImage, contour: &Contour, config: &ContourConfig) -> Result<Band> {
    let l1 = config.margin1;
    let l2 = config.margin2;
    let w = config.window;
    let len = l1 + l2 + 1;

    // index i <-> offset i - l1
    let mut white = Vec::with_capacity(len);
    let mut black = Vec::with_capacity(len);
    let mut sigma = Vec::with_capacity(len);
    for i in 0..len {
        let delta = i as i32 - l1 as i32;
        white.push(contour_avg(image, contour, delta, config.wctrpct, Sign::Bright)?.mean);
        let dark = contour_avg(image, contour, delta, config.ctrpct, Sign::Dark)?;
        black.push(dark.mean);
        sigma.push(dark.sigma);
    }

    let mut grad = vec![0.0f32; len];
    let mut p1 = 0;
    for i in w..len.saturating_sub(w) {
        grad[i] = white[i - w] - black[i + w];
        if grad[i] > grad[p1] {
            p1 = i;
        }
    }
    let inner_offset = (p1 + w) as i32 - l1 as i32;

    let mut p2 = p1.max(l1);
    for i in p2..len {
        if sigma[i] < sigma[p2] {
            p2 = i;
        }
    }
    let max_sigma = sigma[p2] + config.eth;
    while p2 + 1 < len && sigma[p2 + 1] <= max_sigma {
        p2 += 1;
    }

    let bound = (p2 as i64 + 1 - l1 as i64 + config.extra as i64).max(0) as usize;
    debug!(p1, p2, inner_offset, bound, "band");
    Ok(Band {
        inner_offset,
        bound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Bright interior up to column `edge`, a dark wall of `wall` columns,
    /// then a noisy background.
    fn walled_image(rows: u32, cols: u32, edge: u32, wall: u32) -> FloatImage {
        FloatImage::from_fn(cols, rows, |x, y| {
            let v = if x < edge {
                200.0
            } else if x < edge + wall {
                20.0
            } else if (x + y) % 2 == 0 {
                60.0
            } else {
                140.0
            };
            Luma([v])
        })
    }

    #[test]
    fn test_band_spans_dark_wall() {
        let image = walled_image(16, 40, 10, 6);
        let contour = Contour::new(vec![10; 16]);
        let config = ContourConfig {
            margin1: 3,
            margin2: 20,
            window: 1,
            ..Default::default()
        };
        let band = find_band(&image, &contour, &config).expect("Should find band");
        // wall covers offsets 0..6
        assert_eq!(band.inner_offset, 0);
        assert_eq!(band.bound, 6);
    }

    #[test]
    fn test_extra_and_clamp() {
        let image = walled_image(16, 40, 10, 6);
        let contour = Contour::new(vec![10; 16]);
        let config = ContourConfig {
            margin1: 3,
            margin2: 20,
            window: 1,
            extra: 2,
            ..Default::default()
        };
        assert_eq!(find_band(&image, &contour, &config).expect("Should find band").bound, 8);

        let config = ContourConfig {
            extra: -50,
            ..config
        };
        assert_eq!(find_band(&image, &contour, &config).expect("Should find band").bound, 0);
    }
}
