//! Optimal-path search over the polar grid.
//!
//! Rows are visited in order. Every row accumulates the signed cost of its
//! candidate columns from the inner edge outwards, so picking column `x`
//! scores the sum over `lo..=x`. Adjacent rows are linked through a
//! predecessor window of `±max_gap` columns and pay a distance penalty.
//!
//! The angular wrap-around is approximated: every cell carries the row-0
//! point of its best path, and only the last row pays the extra distance
//! from that anchor. This is not an exact cyclic search.

use geo_types::Coord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{ContourError, Result},
    grid::{GridCell, PolarGrid},
    threshold::RowCost,
    types::{Contour, RowRange},
};

/// Cell value a solve reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Color,
    Probability,
}

impl Channel {
    #[inline]
    fn value(self, cell: &GridCell) -> f32 {
        match self {
            Channel::Color => cell.color,
            Channel::Probability => cell.probability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveParams {
    pub channel: Channel,
    /// Clamp deltas to be non-increasing along a row
    pub monotonic: bool,
    /// Scale of below-threshold deltas
    pub discount: f32,
    /// Weight of the distance penalty between linked cells
    pub smoothing: f32,
    /// Max column shift between adjacent rows
    pub max_gap: usize,
    /// Constant subtracted per accumulated column
    pub step_cost: f32,
}

impl SolveParams {
    fn row_cost(&self, threshold: f32) -> RowCost {
        RowCost {
            threshold,
            discount: self.discount,
            monotonic: self.monotonic,
            step_cost: self.step_cost,
        }
    }
}

#[inline]
fn distance(a: Coord<f32>, b: Coord<f32>) -> f32 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt() as f32
}

impl PolarGrid {
    /// Trace one contour. `ranges[y]` restricts the candidate columns of row
    /// `y`, `thresholds[y]` centers its cost.
    pub fn solve(
        &mut self,
        ranges: &[RowRange],
        thresholds: &[f32],
        params: &SolveParams,
    ) -> Result<Contour> {
        let rows = self.rows();
        let cols = self.cols();
        if thresholds.len() != rows {
            return Err(ContourError::ThresholdLength {
                got: thresholds.len(),
                rows,
            });
        }
        if ranges.len() != rows {
            return Err(ContourError::RangeCount {
                got: ranges.len(),
                rows,
            });
        }
        if rows == 0 {
            return Ok(Contour::default());
        }
        let ranges: Vec<RowRange> = ranges
            .iter()
            .map(|r| r.start.min(cols)..r.end.min(cols))
            .collect();

        self.reset();
        self.first_row(&ranges[0], thresholds[0], params);
        for y in 1..rows {
            self.link_row(y, &ranges, thresholds[y], params);
        }
        self.backtrack(&ranges[rows - 1])
    }

    fn first_row(&mut self, range: &RowRange, threshold: f32, params: &SolveParams) {
        let row = self.cells.row_mut(0);
        let cost = params.row_cost(threshold);
        let values: Vec<f32> = row[range.clone()].iter().map(|c| params.channel.value(c)).collect();
        let mut acc = 0.0f32;
        for (cell, delta) in row[range.clone()].iter_mut().zip(cost.deltas(values)) {
            acc += delta - cost.step_cost;
            cell.optimal = acc;
            cell.predecessor = None;
        }
    }

    fn link_row(&mut self, y: usize, ranges: &[RowRange], threshold: f32, params: &SolveParams) {
        let last_row = y + 1 == self.rows();
        let range = ranges[y].clone();
        let prev_range = ranges[y - 1].clone();
        let (prev, row) = self.cells.row_pair_mut(y);
        let cost = params.row_cost(threshold);
        let values: Vec<f32> = row[range.clone()].iter().map(|c| params.channel.value(c)).collect();

        let mut acc = 0.0f32;
        for (x, delta) in range.zip(cost.deltas(values)) {
            acc += delta - cost.step_cost;
            let point = row[x].point;
            let lb = x.saturating_sub(params.max_gap).max(prev_range.start);
            let ub = (x + params.max_gap + 1).min(prev_range.end);

            let mut best_score = f32::NEG_INFINITY;
            let mut best_prev = None;
            for p in lb..ub {
                let mut score = prev[p].optimal + acc - params.smoothing * distance(prev[p].point, point);
                if last_row {
                    score -= params.smoothing * distance(prev[p].closure_point, point);
                }
                if score > best_score {
                    best_score = score;
                    best_prev = Some(p);
                }
            }

            let cell = &mut row[x];
            cell.optimal = best_score;
            cell.predecessor = best_prev;
            if let Some(p) = best_prev {
                cell.closure_point = if y == 1 { prev[p].point } else { prev[p].closure_point };
            }
        }
    }

    fn backtrack(&self, last_range: &RowRange) -> Result<Contour> {
        let rows = self.rows();
        let last = rows - 1;
        let mut best: Option<(usize, f32)> = None;
        for x in last_range.clone() {
            let score = self.cells[(last, x)].optimal;
            if score.is_finite() && best.is_none_or(|(_, s)| score > s) {
                best = Some((x, score));
            }
        }
        let (mut x, score) = best.ok_or(ContourError::DegenerateRange { row: last })?;
        debug!(column = x, score, "best end column");

        let mut columns = Vec::with_capacity(rows);
        for y in (0..rows).rev() {
            columns.push(x);
            if y > 0 {
                x = self.cells[(y, x)]
                    .predecessor
                    .ok_or(ContourError::BrokenPath { row: y })?;
            }
        }
        columns.reverse();
        Ok(Contour::new(columns))
    }
}
