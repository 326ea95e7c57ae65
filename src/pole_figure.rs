//! Lambert equal-area pole figures of c-axes with a kernel density estimate.
//!
//! Each c-axis `(x, y, z)` becomes `θ = acos z`, `ϕ = atan2(y, x)` and is
//! projected to `(2 sin(θ/2) cos ϕ, 2 sin(θ/2) sin ϕ)`, so the vertical axis
//! lands on the origin and a horizontal one on the circle of radius √2.
//!
//! The density attached to every point is a 2-D Gaussian KDE over the
//! projected points, with Scott's bandwidth factor `n^(-1/6)` applied to the
//! full sample covariance. Points whose density does not exceed a chosen
//! percentile can be dropped to clean up sparse outliers.

use nalgebra::{Matrix2, Vector2};
use tracing::debug;

use crate::error::{FabricError, Result};
use crate::grains::GrainField;
use crate::orientation::{AzimuthConvention, OrientationField};
use crate::tensor::{analyze_vectors, select_pixels, FabricEigen, SampleSelection};
use crate::Vector3;

/// Configuration for [`pole_figure`].
#[derive(Debug, Clone)]
pub struct PoleFigureConfig {
    /// Use every selected pixel instead of a decimated subset.
    /// Default: false
    pub all_pixels: bool,

    /// Keep roughly one sample in `decimation` when `all_pixels` is false.
    /// The KDE is quadratic in the number of points.
    /// Default: 1000
    pub decimation: usize,

    /// Drop points whose density is at or below this percentile (0 to 100).
    /// Default: 0.0
    pub density_percentile: f64,

    /// Negate axes pointing into the lower hemisphere before projecting.
    /// Default: false
    pub fold_upper_hemisphere: bool,
}

impl Default for PoleFigureConfig {
    fn default() -> Self {
        Self {
            all_pixels: false,
            decimation: 1000,
            density_percentile: 0.0,
            fold_upper_hemisphere: false,
        }
    }
}

/// An eigenvector of the orientation tensor in projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedAxis {
    pub eigenvalue: f64,
    pub x: f64,
    pub y: f64,
}

/// Projected points, their densities and the fabric axes for overlay.
#[derive(Debug, Clone)]
pub struct PoleFigure {
    /// Projected `(X, Y)` of every kept sample.
    pub points: Vec<(f64, f64)>,
    /// KDE density at each kept point.
    pub density: Vec<f64>,
    /// Tensor of every defined selected pixel (before decimation).
    pub fabric: FabricEigen,
    /// Eigenvectors projected like the samples, sorted by eigenvalue.
    pub axes: [ProjectedAxis; 3],
}

/// Equal-area projection of a unit vector.
#[inline]
pub fn project(v: &Vector3) -> (f64, f64) {
    let theta = v.z.clamp(-1.0, 1.0).acos();
    let r = 2.0 * (theta / 2.0).sin();
    if r == 0.0 {
        return (0.0, 0.0);
    }
    let (s, c) = v.y.atan2(v.x).sin_cos();
    (r * c, r * s)
}

/// Indices `linspace(1, n − 1, n / decimation)` truncated to integers.
///
/// Falls back to every index when decimation is disabled (`<= 1`) or the
/// set is too small to decimate, and keeps at least one sample otherwise.
pub fn decimate_indices(n: usize, decimation: usize) -> Vec<usize> {
    if decimation <= 1 || n < 3 {
        return (0..n).collect();
    }
    let num = (n / decimation).max(1);
    if num == 1 {
        return vec![1];
    }
    let span = (n - 2) as f64;
    let last = (num - 1) as f64;
    (0..num)
        .map(|k| (1.0 + k as f64 * span / last) as usize)
        .collect()
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&q) {
        return Err(FabricError::InvalidPercentile(q));
    }
    if values.is_empty() {
        return Err(FabricError::EmptySampleSet {
            context: "percentile".to_string(),
        });
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Gaussian kernel density estimate of a 2-D point set.
#[derive(Debug, Clone)]
pub struct GaussianKde {
    points: Vec<Vector2<f64>>,
    /// Inverse of the kernel covariance; `None` for a degenerate set.
    inv_cov: Option<Matrix2<f64>>,
    norm: f64,
}

impl GaussianKde {
    pub fn new(points: &[(f64, f64)]) -> Self {
        let pts: Vec<Vector2<f64>> = points.iter().map(|&(x, y)| Vector2::new(x, y)).collect();
        let n = pts.len();
        let mut kde = Self {
            points: pts,
            inv_cov: None,
            norm: 1.0,
        };
        if n < 2 {
            return kde;
        }

        let mean = kde.points.iter().sum::<Vector2<f64>>() / n as f64;
        let cov = kde
            .points
            .iter()
            .map(|p| (p - mean) * (p - mean).transpose())
            .sum::<Matrix2<f64>>()
            / (n - 1) as f64;
        let factor = (n as f64).powf(-1.0 / 6.0);
        let kernel = cov * (factor * factor);

        let det = kernel.determinant();
        let scale = kernel.trace().powi(2);
        if !(det > f64::EPSILON * scale) {
            return kde;
        }
        if let Some(inv) = kernel.try_inverse() {
            kde.inv_cov = Some(inv);
            kde.norm = 1.0 / (n as f64 * std::f64::consts::TAU * det.sqrt());
        }
        kde
    }

    /// True when the covariance is singular and every density is uniform.
    pub fn is_degenerate(&self) -> bool {
        self.inv_cov.is_none()
    }

    /// Density at `(x, y)`. A degenerate estimate returns 1 everywhere.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let Some(inv) = self.inv_cov else {
            return 1.0;
        };
        let q = Vector2::new(x, y);
        let sum: f64 = self
            .points
            .iter()
            .map(|p| {
                let d = q - p;
                (-0.5 * (d.transpose() * inv * d)[(0, 0)]).exp()
            })
            .sum();
        sum * self.norm
    }

    /// Density at each of the estimator's own points.
    pub fn evaluate_self(&self) -> Vec<f64> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.points
                .par_iter()
                .map(|p| self.evaluate(p.x, p.y))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.points.iter().map(|p| self.evaluate(p.x, p.y)).collect()
        }
    }
}

/// Project the selected c-axes, estimate their density and project the
/// fabric eigenvectors.
pub fn pole_figure(
    field: &OrientationField,
    grains: &GrainField,
    selection: &SampleSelection,
    config: &PoleFigureConfig,
) -> Result<PoleFigure> {
    if !(0.0..=100.0).contains(&config.density_percentile) {
        return Err(FabricError::InvalidPercentile(config.density_percentile));
    }
    let pixels = select_pixels(field, grains, selection)?;
    let caxis = |i: usize| field.orientation_at(i).caxis(AzimuthConvention::Shifted);

    let all: Vec<Vector3> = pixels.iter().filter_map(|&i| caxis(i)).collect();
    let fabric = analyze_vectors(&all)?;

    let sampled: Vec<usize> = if config.all_pixels {
        pixels
    } else {
        decimate_indices(pixels.len(), config.decimation)
            .into_iter()
            .map(|k| pixels[k])
            .collect()
    };
    let points: Vec<(f64, f64)> = sampled
        .into_iter()
        .filter_map(caxis)
        .map(|v| {
            if config.fold_upper_hemisphere && v.z < 0.0 {
                project(&-v)
            } else {
                project(&v)
            }
        })
        .collect();
    if points.is_empty() {
        return Err(FabricError::EmptySampleSet {
            context: format!("pole figure of {selection:?} after decimation"),
        });
    }

    let kde = GaussianKde::new(&points);
    let density = kde.evaluate_self();
    let (points, density) = if kde.is_degenerate() {
        (points, density)
    } else {
        let cut = percentile(&density, config.density_percentile)?;
        points
            .into_iter()
            .zip(density)
            .filter(|&(_, d)| d > cut)
            .unzip()
    };

    let axes = fabric.sorted_descending().map(|(eigenvalue, v)| {
        let (x, y) = project(&v);
        ProjectedAxis { eigenvalue, x, y }
    });
    debug!(
        selected = all.len(),
        plotted = points.len(),
        degenerate = kde.is_degenerate(),
        "pole figure"
    );
    Ok(PoleFigure {
        points,
        density,
        fabric,
        axes,
    })
}
