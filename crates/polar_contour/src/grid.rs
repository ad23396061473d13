use std::f64::consts::TAU;

use geo_types::Coord;

use crate::{
    error::{ContourError, Result},
    types::FloatImage,
};

/// Row-major 2D container indexed by `(row, col)`.
#[derive(Debug, Clone)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid<T> {
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }
}

impl<T> Grid<T> {
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for y in 0..rows {
            for x in 0..cols {
                data.push(f(y, x));
            }
        }
        Self { rows, cols, data }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        debug_assert!(y < self.rows, "row {y} out of {}", self.rows);
        &self.data[y * self.cols..(y + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        debug_assert!(y < self.rows, "row {y} out of {}", self.rows);
        &mut self.data[y * self.cols..(y + 1) * self.cols]
    }

    /// Previous row (shared) and current row (mutable) at once.
    pub fn row_pair_mut(&mut self, y: usize) -> (&[T], &mut [T]) {
        debug_assert!(y > 0 && y < self.rows);
        let (head, tail) = self.data.split_at_mut(y * self.cols);
        (&head[(y - 1) * self.cols..], &mut tail[..self.cols])
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.data.iter_mut()
    }
}

impl<T> std::ops::Index<(usize, usize)> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, (y, x): (usize, usize)) -> &T {
        debug_assert!(y < self.rows && x < self.cols, "({y}, {x}) out of bounds");
        &self.data[y * self.cols + x]
    }
}

impl<T> std::ops::IndexMut<(usize, usize)> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, (y, x): (usize, usize)) -> &mut T {
        debug_assert!(y < self.rows && x < self.cols, "({y}, {x}) out of bounds");
        &mut self.data[y * self.cols + x]
    }
}

/// One polar cell of the DP workspace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    /// Source pixel intensity
    pub color: f32,
    /// Detector confidence
    pub probability: f32,
    /// Cartesian offset from the polar center
    pub point: Coord<f32>,
    /// Best accumulated path score ending here
    pub optimal: f32,
    /// Column in the previous row achieving `optimal`
    pub predecessor: Option<usize>,
    /// Row-0 point of the best path through this cell; the polar center on row 0
    pub closure_point: Coord<f32>,
}

impl GridCell {
    fn reset(&mut self) {
        self.optimal = f32::NEG_INFINITY;
        self.predecessor = None;
        self.closure_point = Coord::zero();
    }
}

/// DP workspace built from a polar intensity image and its probability map.
#[derive(Debug, Clone)]
pub struct PolarGrid {
    pub(crate) cells: Grid<GridCell>,
}

impl PolarGrid {
    /// Build the workspace. `radial_extent` is the Cartesian radius covered
    /// by the full column range.
    pub fn new(intensity: &FloatImage, probability: &FloatImage, radial_extent: f32) -> Result<Self> {
        if intensity.dimensions() != probability.dimensions() {
            return Err(ContourError::DimensionMismatch {
                intensity: intensity.dimensions(),
                probability: probability.dimensions(),
            });
        }
        let rows = intensity.height() as usize;
        let cols = intensity.width() as usize;
        let cells = Grid::from_fn(rows, cols, |y, x| {
            let phi = TAU * y as f64 / rows as f64;
            let rho = x as f64 * radial_extent as f64 / cols as f64;
            let point = Coord {
                x: (rho * phi.cos()) as f32,
                y: (rho * phi.sin()) as f32,
            };
            GridCell {
                color: intensity.get_pixel(x as u32, y as u32)[0],
                probability: probability.get_pixel(x as u32, y as u32)[0],
                point,
                optimal: f32::NEG_INFINITY,
                predecessor: None,
                closure_point: Coord::zero(),
            }
        });
        Ok(Self { cells })
    }

    pub fn rows(&self) -> usize {
        self.cells.rows()
    }

    pub fn cols(&self) -> usize {
        self.cells.cols()
    }

    pub fn cell(&self, y: usize, x: usize) -> &GridCell {
        &self.cells[(y, x)]
    }

    /// Forget the state of a previous solve.
    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(GridCell::reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_grid_indexing() {
        let mut grid = Grid::from_fn(3, 4, |y, x| y * 10 + x);
        assert_eq!(grid[(2, 3)], 23);
        assert_eq!(grid.row(1), &[10, 11, 12, 13]);
        grid[(0, 0)] = 99;
        let (prev, cur) = grid.row_pair_mut(1);
        assert_eq!(prev[0], 99);
        cur[0] = 7;
        assert_eq!(grid[(1, 0)], 7);
    }

    #[test]
    fn test_polar_grid_points() {
        let intensity = FloatImage::from_fn(10, 4, |x, y| Luma([(x + 10 * y) as f32]));
        let probability = FloatImage::from_fn(10, 4, |x, _| Luma([x as f32 / 10.0]));
        let grid = PolarGrid::new(&intensity, &probability, 20.0).expect("Should build grid");
        assert_eq!((grid.rows(), grid.cols()), (4, 10));

        let cell = grid.cell(1, 5);
        assert_eq!(cell.color, 15.0);
        assert_eq!(cell.probability, 0.5);
        assert_eq!(cell.optimal, f32::NEG_INFINITY);
        assert_eq!(cell.predecessor, None);
        assert_eq!(grid.cell(0, 7).closure_point, Coord::zero());
        // row 1 of 4 is a quarter turn, column 5 of 10 is radius 10
        assert!(cell.point.x.abs() < 1e-4);
        assert!((cell.point.y - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_dimension_mismatch() {
        let intensity = FloatImage::new(10, 4);
        let probability = FloatImage::new(10, 5);
        assert!(matches!(
            PolarGrid::new(&intensity, &probability, 1.0),
            Err(ContourError::DimensionMismatch { .. })
        ));
    }
}
