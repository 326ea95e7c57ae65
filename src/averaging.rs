//! Reduce an orientation field to one orientation per grain.
//!
//! Every pixel of a grain receives the mean of the defined `phi1` and `phi`
//! values over that grain; boundary pixels are skipped and left untouched.
//!
//! `phi1` wraps at 2π, so a plain arithmetic mean is wrong for grains that
//! straddle the wrap (the mean of 0.1 and 6.2 comes out near π instead of near
//! 0). [`MeanMode::Arithmetic`] is still the default so results match
//! earlier processing of the same maps; [`MeanMode::Circular`] averages the
//! azimuth as a direction instead.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Result;
use crate::grains::GrainField;
use crate::orientation::{wrap_tau, Orientation, OrientationField};

/// How the per-grain azimuth is averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeanMode {
    /// Arithmetic mean of the raw angles.
    #[default]
    Arithmetic,
    /// Mean resultant direction of `phi1`; `phi` stays arithmetic since it
    /// does not wrap on [0, π/2].
    Circular,
}

/// Mean orientation of the defined samples among `pixels`.
///
/// Each angle is averaged over the pixels where *it* is defined, so the
/// result is `None` only if neither angle has a sample.
pub fn grain_mean(field: &OrientationField, pixels: &[usize], mode: MeanMode) -> Option<Orientation> {
    let mut n_phi1 = 0usize;
    let mut n_phi = 0usize;
    let (mut s_phi1, mut s_sin, mut s_cos, mut s_phi) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);

    for &i in pixels {
        let o = field.orientation_at(i);
        if !o.phi1.is_nan() {
            n_phi1 += 1;
            s_phi1 += o.phi1;
            let (s, c) = o.phi1.sin_cos();
            s_sin += s;
            s_cos += c;
        }
        if !o.phi.is_nan() {
            n_phi += 1;
            s_phi += o.phi;
        }
    }

    if n_phi1 == 0 && n_phi == 0 {
        return None;
    }

    let phi1 = match (n_phi1, mode) {
        (0, _) => f64::NAN,
        (n, MeanMode::Arithmetic) => s_phi1 / n as f64,
        (_, MeanMode::Circular) => wrap_tau(s_sin.atan2(s_cos)),
    };
    let phi = if n_phi == 0 {
        f64::NAN
    } else {
        s_phi / n_phi as f64
    };
    Some(Orientation::new(phi1, phi))
}

/// Assign every grain its mean orientation.
///
/// Fails with `ShapeMismatch` if the two fields do not cover the same grid.
/// Grains are independent, so the reduction runs in parallel with the
/// `parallel` feature; the output is identical either way.
pub fn average_grains(
    field: &OrientationField,
    grains: &GrainField,
    mode: MeanMode,
) -> Result<OrientationField> {
    field.phi1.ensure_same_shape(&grains.labels)?;

    let index = grains.grain_index();
    let means = compute_means(field, &index, mode);

    let mut out = field.clone();
    let mut assigned = 0usize;
    for (label, mean) in means {
        let Some(mean) = mean else {
            debug!(label, "grain has no defined orientation, left unchanged");
            continue;
        };
        for &i in &index[&label] {
            out.phi1.data[i] = mean.phi1;
            out.phi.data[i] = mean.phi;
        }
        assigned += 1;
    }
    debug!(grains = index.len(), assigned, ?mode, "grain averaging done");
    Ok(out)
}

#[cfg(not(feature = "parallel"))]
fn compute_means(
    field: &OrientationField,
    index: &BTreeMap<u32, Vec<usize>>,
    mode: MeanMode,
) -> Vec<(u32, Option<Orientation>)> {
    index
        .iter()
        .map(|(&label, pixels)| (label, grain_mean(field, pixels, mode)))
        .collect()
}

#[cfg(feature = "parallel")]
fn compute_means(
    field: &OrientationField,
    index: &BTreeMap<u32, Vec<usize>>,
    mode: MeanMode,
) -> Vec<(u32, Option<Orientation>)> {
    use rayon::prelude::*;

    let grains: Vec<(&u32, &Vec<usize>)> = index.iter().collect();
    grains
        .into_par_iter()
        .map(|(&label, pixels)| (label, grain_mean(field, pixels, mode)))
        .collect()
}
