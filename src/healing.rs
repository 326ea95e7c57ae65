//! Boundary healing: fill every grain-boundary pixel from a neighbour so the
//! microstructure has no missing data (the FFT solver input cannot represent
//! holes).
//!
//! Each undefined pixel `(i, j)` copies label and orientation from a fixed
//! diagonal donor: row `i + 1` on the top row, `i − 1` otherwise, and column
//! `j + 1` on the left column, `j − 1` otherwise. Donors are not checked for
//! being defined themselves, so the pass is repeated until nothing is left.
//! Pixels are visited in raster order and see the values already written
//! during the same pass.
//!
//! A pass that does not shrink the undefined set would repeat forever (for
//! example on an all-boundary map), so it fails with
//! [`FabricError::HealingDidNotConverge`].

use tracing::{debug, info};

use crate::error::{FabricError, Result};
use crate::grains::GrainField;
use crate::grid::Grid;
use crate::orientation::OrientationField;

/// Parameters for [`heal_boundaries`].
#[derive(Debug, Clone, Default)]
pub struct HealingConfig {
    /// Optional hard cap on the number of passes. Non-progress is always
    /// detected; this additionally bounds slow-but-progressing inputs.
    /// Default: None
    pub max_passes: Option<usize>,
}

/// Label and orientation fields with no undefined label left.
#[derive(Debug, Clone, PartialEq)]
pub struct HealedMicrostructure {
    /// Whole-number phase label per pixel.
    pub labels: Grid<u32>,
    /// Orientation field with boundary pixels filled from their donors.
    pub field: OrientationField,
    /// Number of passes that were needed (0 if nothing was undefined).
    pub passes: usize,
}

impl HealedMicrostructure {
    /// Distinct labels, ascending.
    pub fn labels(&self) -> Vec<u32> {
        let mut labels = self.labels.data.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }
}

#[inline]
fn donor(row: usize, col: usize) -> (usize, usize) {
    let r = if row == 0 { row + 1 } else { row - 1 };
    let c = if col == 0 { col + 1 } else { col - 1 };
    (r, c)
}

/// Fill every undefined label (and the orientation at the same pixel) from
/// its donor until the label field is complete.
pub fn heal_boundaries(
    grains: &GrainField,
    field: &OrientationField,
    config: &HealingConfig,
) -> Result<HealedMicrostructure> {
    field.phi1.ensure_same_shape(&grains.labels)?;

    let (rows, cols) = grains.shape();
    let mut labels = grains.labels.clone();
    let mut out = field.clone();

    let mut undefined: Vec<usize> = undefined_indices(&labels);
    let mut passes = 0usize;

    while !undefined.is_empty() {
        let first = labels.coords(undefined[0]);
        let stalled = |passes: usize, remaining: usize| FabricError::HealingDidNotConverge {
            remaining,
            passes,
            first_row: first.0,
            first_col: first.1,
        };

        // A single row or column has no diagonal donor to copy from.
        if rows < 2 || cols < 2 {
            return Err(stalled(passes, undefined.len()));
        }
        if config.max_passes.is_some_and(|max| passes >= max) {
            return Err(stalled(passes, undefined.len()));
        }

        for &idx in &undefined {
            let (row, col) = labels.coords(idx);
            let (dr, dc) = donor(row, col);
            let d = labels.idx(dr, dc);
            labels.data[idx] = labels.data[d];
            out.phi1.data[idx] = out.phi1.data[d];
            out.phi.data[idx] = out.phi.data[d];
        }
        passes += 1;

        let remaining = undefined_indices(&labels);
        debug!(pass = passes, before = undefined.len(), after = remaining.len(), "healing pass");
        if remaining.len() >= undefined.len() {
            return Err(stalled(passes, remaining.len()));
        }
        undefined = remaining;
    }

    info!(passes, rows, cols, "boundary healing complete");
    Ok(HealedMicrostructure {
        labels: labels.map(|l| l.unwrap_or_default()),
        field: out,
        passes,
    })
}

fn undefined_indices(labels: &Grid<Option<u32>>) -> Vec<usize> {
    labels
        .data
        .iter()
        .enumerate()
        .filter_map(|(i, l)| l.is_none().then_some(i))
        .collect()
}
