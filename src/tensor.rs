//! Second-order orientation tensor and its eigen-analysis.
//!
//! For a population of c-axes `v`, the orientation tensor is the mean outer
//! product `A = <v ⊗ v>`. Its eigenvalues measure how strongly the fabric
//! clusters along each eigen-direction (they are non-negative and sum to 1
//! for unit vectors), and the eigenvectors are the fabric axes.
//!
//! Maps routinely hold hundreds of thousands of nearly identical unit
//! vectors, so the mean is accumulated in f64 with Neumaier compensation:
//! naive single-precision sums drift visibly on such inputs.

use std::collections::BTreeMap;

use nalgebra::SymmetricEigen;
use tracing::debug;

use crate::error::{FabricError, Result};
use crate::grains::GrainField;
use crate::orientation::{AzimuthConvention, Orientation, OrientationField};
use crate::{Matrix3, Vector3};

/// Which pixels feed the tensor.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SampleSelection {
    /// Every pixel of the map.
    #[default]
    All,
    /// Every pixel carrying one grain label.
    Grain(u32),
    /// Every pixel carrying any of the labels.
    Grains(Vec<u32>),
    /// Explicit (row, col) pixels, e.g. from a point picker.
    Pixels(Vec<(usize, usize)>),
}

/// Neumaier-compensated running sum.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    #[inline]
    pub fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if self.sum.abs() >= x.abs() {
            self.compensation += (self.sum - t) + x;
        } else {
            self.compensation += (x - t) + self.sum;
        }
        self.sum = t;
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}

/// Eigen-analysis of an orientation tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct FabricEigen {
    /// The symmetric tensor itself.
    pub tensor: Matrix3,
    /// Eigenvalues in solver order (not sorted).
    pub eigenvalues: [f64; 3],
    /// Unit eigenvectors matching `eigenvalues`, each with `z >= 0`.
    pub eigenvectors: [Vector3; 3],
    /// Number of defined samples that entered the mean.
    pub n_samples: usize,
}

impl FabricEigen {
    /// Trace of the tensor (1 for unit vectors).
    pub fn trace(&self) -> f64 {
        self.tensor.trace()
    }

    /// Eigenpairs ordered by decreasing eigenvalue.
    pub fn sorted_descending(&self) -> [(f64, Vector3); 3] {
        let mut pairs = [0usize, 1, 2].map(|i| (self.eigenvalues[i], self.eigenvectors[i]));
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }
}

/// Mean outer product of the given vectors.
///
/// Returns the tensor and the sample count, or `None` if the iterator is
/// empty.
pub fn orientation_tensor<I>(vectors: I) -> Option<(Matrix3, usize)>
where
    I: IntoIterator<Item = Vector3>,
{
    // a11 a22 a33 a12 a13 a23
    let mut sums = [CompensatedSum::default(); 6];
    let mut n = 0usize;
    for v in vectors {
        sums[0].add(v.x * v.x);
        sums[1].add(v.y * v.y);
        sums[2].add(v.z * v.z);
        sums[3].add(v.x * v.y);
        sums[4].add(v.x * v.z);
        sums[5].add(v.y * v.z);
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let [a11, a22, a33, a12, a13, a23] = sums.map(|s| s.total() / n as f64);
    Some((
        Matrix3::new(a11, a12, a13, a12, a22, a23, a13, a23, a33),
        n,
    ))
}

/// Eigendecompose a symmetric tensor.
pub fn eigen_decompose(tensor: Matrix3, n_samples: usize) -> FabricEigen {
    let eig = SymmetricEigen::new(tensor);
    let mut eigenvalues = [0.0; 3];
    let mut eigenvectors = [Vector3::zeros(); 3];
    for i in 0..3 {
        // round-off can leave a vanishing eigenvalue slightly negative
        eigenvalues[i] = eig.eigenvalues[i].max(0.0);
        let v: Vector3 = eig.eigenvectors.column(i).into_owned();
        eigenvectors[i] = if v.z < 0.0 { -v } else { v };
    }
    FabricEigen {
        tensor,
        eigenvalues,
        eigenvectors,
        n_samples,
    }
}

/// Tensor eigen-analysis of a set of c-axis unit vectors.
pub fn analyze_vectors(vectors: &[Vector3]) -> Result<FabricEigen> {
    let (tensor, n) = orientation_tensor(vectors.iter().copied()).ok_or_else(|| {
        FabricError::EmptySampleSet {
            context: "orientation tensor".to_string(),
        }
    })?;
    Ok(eigen_decompose(tensor, n))
}

/// Tensor eigen-analysis of (φ1, φ) pairs; undefined pairs are skipped.
pub fn analyze_orientations(orientations: &[Orientation]) -> Result<FabricEigen> {
    let vectors = orientations
        .iter()
        .filter_map(|o| o.caxis(AzimuthConvention::Shifted));
    let (tensor, n) = orientation_tensor(vectors).ok_or_else(|| FabricError::EmptySampleSet {
        context: format!("orientation tensor over {} pair(s)", orientations.len()),
    })?;
    Ok(eigen_decompose(tensor, n))
}

/// Linear pixel indices picked out by a selection. Fails for grains no pixel
/// carries and for pixels outside the grid.
pub fn select_pixels(
    field: &OrientationField,
    grains: &GrainField,
    selection: &SampleSelection,
) -> Result<Vec<usize>> {
    field.phi1.ensure_same_shape(&grains.labels)?;
    match selection {
        SampleSelection::All => Ok((0..field.len()).collect()),
        SampleSelection::Grain(label) => grains.require_pixels_of(*label),
        SampleSelection::Grains(labels) => {
            let mut out = Vec::new();
            for &label in labels {
                out.extend(grains.require_pixels_of(label)?);
            }
            Ok(out)
        }
        SampleSelection::Pixels(pixels) => pixels
            .iter()
            .map(|&(r, c)| {
                field.phi1.try_get(r as isize, c as isize)?;
                Ok(field.phi1.idx(r, c))
            })
            .collect(),
    }
}

/// Orientation tensor of the selected pixels of a map.
pub fn analyze_field(
    field: &OrientationField,
    grains: &GrainField,
    selection: &SampleSelection,
) -> Result<FabricEigen> {
    let pixels = select_pixels(field, grains, selection)?;
    let vectors = pixels
        .iter()
        .filter_map(|&i| field.orientation_at(i).caxis(AzimuthConvention::Shifted));
    let (tensor, n) = orientation_tensor(vectors).ok_or_else(|| FabricError::EmptySampleSet {
        context: format!("{selection:?}"),
    })?;
    let result = eigen_decompose(tensor, n);
    debug!(
        samples = n,
        selected = pixels.len(),
        eigenvalues = ?result.eigenvalues,
        "orientation tensor"
    );
    Ok(result)
}

/// One tensor per grain. Grains without a defined sample are left out.
pub fn analyze_grains(
    field: &OrientationField,
    grains: &GrainField,
) -> Result<BTreeMap<u32, FabricEigen>> {
    field.phi1.ensure_same_shape(&grains.labels)?;
    let index = grains.grain_index();
    let per_grain = |pixels: &Vec<usize>| {
        orientation_tensor(
            pixels
                .iter()
                .filter_map(|&i| field.orientation_at(i).caxis(AzimuthConvention::Shifted)),
        )
        .map(|(t, n)| eigen_decompose(t, n))
    };

    #[cfg(feature = "parallel")]
    let results: Vec<(u32, Option<FabricEigen>)> = {
        use rayon::prelude::*;
        index
            .par_iter()
            .map(|(&label, pixels)| (label, per_grain(pixels)))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let results: Vec<(u32, Option<FabricEigen>)> = index
        .iter()
        .map(|(&label, pixels)| (label, per_grain(pixels)))
        .collect();

    Ok(results
        .into_iter()
        .filter_map(|(label, r)| r.map(|r| (label, r)))
        .collect())
}
