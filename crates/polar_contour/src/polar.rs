//! Linear polar resampling between Cartesian and polar images.
//!
//! Polar row `y` of `rows` maps to angle `2π·y/rows`, polar column `x` of
//! `cols` maps to radius `x·R/cols` around the frame center. Samples falling
//! outside the source image are filled with 0.

use std::f64::consts::TAU;

use image::Luma;

use crate::types::{FloatImage, PolarFrame};

/// Resample a Cartesian image onto a `rows × cols` polar grid (bilinear).
pub fn to_polar(cartesian: &FloatImage, frame: &PolarFrame, rows: u32, cols: u32) -> FloatImage {
    let mut polar = FloatImage::new(cols, rows);
    for y in 0..rows {
        let phi = TAU * y as f64 / rows as f64;
        let (sin, cos) = phi.sin_cos();
        for x in 0..cols {
            let rho = x as f64 * frame.radius as f64 / cols as f64;
            let sx = frame.center.x as f64 + rho * cos;
            let sy = frame.center.y as f64 + rho * sin;
            polar.put_pixel(x, y, Luma([bilinear(cartesian, sx, sy)]));
        }
    }
    polar
}

/// Map a polar image back onto a `width × height` Cartesian canvas
/// (nearest neighbour).
pub fn to_cartesian(polar: &FloatImage, frame: &PolarFrame, width: u32, height: u32) -> FloatImage {
    let rows = polar.height();
    let cols = polar.width();
    let mut out = FloatImage::new(width, height);
    if rows == 0 || cols == 0 || frame.radius <= 0.0 {
        return out;
    }
    let kmag = cols as f64 / frame.radius as f64;
    let kangle = rows as f64 / TAU;
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = x as f64 - frame.center.x as f64;
        let dy = y as f64 - frame.center.y as f64;
        let rho = (dx * dx + dy * dy).sqrt() * kmag;
        let mut angle = dy.atan2(dx);
        if angle < 0.0 {
            angle += TAU;
        }
        let col = rho.round() as i64;
        if col < 0 || col >= cols as i64 {
            continue;
        }
        let row = (angle * kangle).round() as i64 % rows as i64;
        *pixel = *polar.get_pixel(col as u32, row as u32);
    }
    out
}

fn bilinear(image: &FloatImage, x: f64, y: f64) -> f32 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return 0.0;
    }
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;
    let p = |px: u32, py: u32| image.get_pixel(px, py)[0];
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}
