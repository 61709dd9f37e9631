//! Z-score-like normalization of the power, cost and time catalogs.
//!
//! The spread used here is not the textbook standard deviation: with
//! `S = Σ(v - mean)²` over the `n` selected cells the divisor is `S / sqrt(S / n)`.
//! Scores produced by existing graph descriptions depend on this exact form.

use thiserror::Error;

use crate::graph::TaskGraph;
use crate::models::{PeTypeId, TaskId};
use crate::tuner::Weights;

/// Numeric failures of the standardizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("Cannot standardize {cells} value(s): at least two are required")]
    DegenerateStandardization { cells: usize },
}

/// Which cells of a matrix are standardized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Region {
    /// Column 0 only; the result has a single column.
    FirstColumn,
    /// Every cell.
    Whole,
}

/// Standardize the selected region of `data`.
///
/// With [`Region::FirstColumn`] every output row holds exactly one value, so cells
/// outside the region cannot be read by accident. If all selected values are equal
/// every score is zero.
pub fn standardize(data: &[Vec<f64>], region: Region) -> Result<Vec<Vec<f64>>, NumericError> {
    let selected: Vec<&[f64]> = data
        .iter()
        .map(|row| match region {
            Region::FirstColumn => &row[..row.len().min(1)],
            Region::Whole => row.as_slice(),
        })
        .collect();

    let cells: usize = selected.iter().map(|row| row.len()).sum();
    if cells <= 1 {
        return Err(NumericError::DegenerateStandardization { cells });
    }
    let n = cells as f64;

    let mean = selected.iter().flat_map(|row| row.iter()).sum::<f64>() / n;
    let sum_sq: f64 = selected
        .iter()
        .flat_map(|row| row.iter())
        .map(|v| (v - mean).powi(2))
        .sum();

    if sum_sq == 0.0 {
        return Ok(selected.iter().map(|row| vec![0.0; row.len()]).collect());
    }
    let spread = sum_sq / (sum_sq / n).sqrt();

    Ok(selected
        .iter()
        .map(|row| row.iter().map(|v| (v - mean) / spread).collect())
        .collect())
}

/// Standardized catalogs used by the weighted scoring strategy.
#[derive(Clone, Debug)]
pub struct StandardizedScores {
    /// Per PE type, from the unit cost/power column.
    power: Vec<f64>,
    /// Per task per PE type.
    cost: Vec<Vec<f64>>,
    /// Per task per PE type.
    time: Vec<Vec<f64>>,
}

impl StandardizedScores {
    pub fn from_graph(graph: &TaskGraph) -> Result<Self, NumericError> {
        let power_column: Vec<Vec<f64>> = graph
            .pe_types()
            .iter()
            .map(|pe| vec![pe.unit_cost])
            .collect();
        let power = standardize(&power_column, Region::FirstColumn)?
            .into_iter()
            .map(|row| row[0])
            .collect();

        Ok(Self {
            power,
            cost: standardize(graph.costs(), Region::Whole)?,
            time: standardize(graph.times(), Region::Whole)?,
        })
    }

    /// `x·power + y·cost + z·time` for one task on one PE type.
    #[inline]
    pub fn score(&self, task: TaskId, pe_type: PeTypeId, weights: &Weights) -> f64 {
        weights.power * self.power[pe_type]
            + weights.cost * self.cost[task][pe_type]
            + weights.time * self.time[task][pe_type]
    }
}
