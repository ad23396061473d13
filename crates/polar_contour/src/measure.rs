//! Cartesian label mask and the scalar measurements derived from it.

use image::{GrayImage, Luma, imageops};
use imageproc::{distance_transform::Norm, morphology::dilate};
use tracing::error;

use crate::{
    polar::to_cartesian,
    types::{BoxRect, Contour, FloatImage, PolarFrame},
};

/// Width of the ring around the label used for the color contrast.
pub const CONTRAST_MARGIN: i32 = 5;

/// Polar mask with columns `from(y)..to(y)` of each row set to 1.
fn polar_fill(rows: usize, cols: usize, mut span: impl FnMut(usize) -> (usize, usize)) -> FloatImage {
    let mut polar = FloatImage::new(cols as u32, rows as u32);
    for y in 0..rows {
        let (from, to) = span(y);
        for x in from.min(cols)..to.min(cols) {
            polar.put_pixel(x as u32, y as u32, Luma([1.0]));
        }
    }
    polar
}

/// Pixel count of the band `[contour[y], contour[y] + bound)` mapped back to
/// Cartesian space.
pub fn band_area(contour: &Contour, bound: usize, cols: usize, frame: &PolarFrame, canvas: (u32, u32)) -> f32 {
    let columns = contour.columns();
    let polar = polar_fill(columns.len(), cols, |y| (columns[y], columns[y] + bound));
    to_cartesian(&polar, frame, canvas.0, canvas.1).pixels().map(|p| p[0]).sum()
}

/// Label of the region enclosed by the contour (`0..contour[y]` per row) on
/// the Cartesian canvas, 1 inside and 0 outside.
pub fn label_mask(contour: &Contour, cols: usize, frame: &PolarFrame, canvas: (u32, u32)) -> GrayImage {
    let columns = contour.columns();
    let polar = polar_fill(columns.len(), cols, |y| (0, columns[y]));
    let cart = to_cartesian(&polar, frame, canvas.0, canvas.1);
    GrayImage::from_fn(canvas.0, canvas.1, |x, y| Luma([u8::from(cart.get_pixel(x, y)[0] > 0.5)]))
}

/// Sum of the label (its pixel count).
pub fn label_area(label: &GrayImage) -> f32 {
    label.pixels().map(|p| p[0] as f32).sum()
}

/// Tightest box around the non-zero pixels.
pub fn bounding_box(mask: &GrayImage) -> Option<BoxRect> {
    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0u32, 0u32);
    let mut any = false;
    for (x, y, p) in mask.enumerate_pixels() {
        if p[0] > 0 {
            any = true;
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
    }
    any.then(|| {
        BoxRect::new(
            min.0 as i32,
            min.1 as i32,
            (max.0 - min.0 + 1) as i32,
            (max.1 - min.1 + 1) as i32,
        )
    })
}

/// Color sum and pixel count under the non-zero pixels of `mask`.
fn color_sum(color: &FloatImage, mask: &GrayImage) -> (f32, f32) {
    color
        .pixels()
        .zip(mask.pixels())
        .filter(|(_, m)| m[0] > 0)
        .fold((0.0, 0.0), |(sum, count), (c, _)| (sum + c[0], count + 1.0))
}

/// Mean color inside the label minus the mean color of a
/// [`CONTRAST_MARGIN`]-wide ring around it.
pub fn color_contrast(image: &FloatImage, label: &GrayImage, bbox: &BoxRect) -> f32 {
    let canvas = BoxRect::new(0, 0, image.width() as i32, image.height() as i32);
    let area = bbox.expand(CONTRAST_MARGIN).intersect(&canvas);
    if area.is_empty() {
        return 0.0;
    }
    let (x, y, w, h) = (area.x as u32, area.y as u32, area.width as u32, area.height as u32);
    let mask = imageops::crop_imm(label, x, y, w, h).to_image();
    let color = imageops::crop_imm(image, x, y, w, h).to_image();

    let (cs1, mut ps1) = color_sum(&color, &mask);
    if ps1 <= 0.0 {
        error!(ps1, "empty label inside contrast box");
        ps1 = 1.0;
    }

    let ring = dilate(&mask, Norm::LInf, (CONTRAST_MARGIN / 2) as u8);
    let (cs_all, ps_all) = color_sum(&color, &ring);
    let cs2 = cs_all - cs1;
    let mut ps2 = ps_all - ps1;
    if ps2 <= 0.0 {
        error!(ps2, "empty ring around label");
        ps2 = 1.0;
    }
    cs1 / ps1 - cs2 / ps2
}

/// Overlap of the label with `bbox`: label pixels inside the box over the
/// union of the box and the label.
pub fn box_score(label: &GrayImage, bbox: &BoxRect) -> f32 {
    let mut inside = 0i64;
    let mut outside = 0i64;
    for (x, y, p) in label.enumerate_pixels() {
        if p[0] == 0 {
            continue;
        }
        if bbox.contains(x as i32, y as i32) {
            inside += 1;
        } else {
            outside += 1;
        }
    }
    let union = bbox.area() + outside;
    if union == 0 { 0.0 } else { inside as f32 / union as f32 }
}
