//! Misorientation between c-axes and misorientation profiles along a line.
//!
//! A c-axis has no polarity: `v` and `-v` are the same physical axis. The
//! angle between two axes is therefore `acos(|v · w|)`, which lies in
//! [0°, 90°]. Using the signed dot product instead makes profiles jump between
//! θ and 180° − θ for identical crystals.

use tracing::debug;

use crate::error::{FabricError, Result};
use crate::orientation::{AzimuthConvention, OrientationField};
use crate::Vector3;

/// Antipodal-invariant angle between two c-axes, in degrees.
///
/// `|v · w|` is clamped to [0, 1] so round-off on (anti)parallel axes cannot
/// push `acos` out of its domain. NaN inputs give NaN.
#[inline]
pub fn misorientation_deg(v: &Vector3, w: &Vector3) -> f64 {
    v.dot(w).abs().clamp(0.0, 1.0).acos().to_degrees()
}

/// What to do when a profile sample lands on an undefined pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndefinedPolicy {
    /// Keep the sample; its misorientations come out as NaN.
    #[default]
    Propagate,
    /// Drop the sample; the next defined sample is compared to the last kept one.
    Skip,
    /// Abort with [`FabricError::UndefinedSample`].
    Fail,
}

/// How the Euclidean pixel length of a line becomes a sample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleCount {
    /// Nearest integer.
    #[default]
    Rounded,
    /// Integer part only, one sample fewer for fractional lengths above .5.
    Truncated,
}

impl SampleCount {
    fn samples(self, length: f64) -> usize {
        match self {
            SampleCount::Rounded => length.round() as usize,
            SampleCount::Truncated => length as usize,
        }
    }
}

/// Options for [`misorientation_profile`].
#[derive(Debug, Clone, Default)]
pub struct ProfileConfig {
    /// Handling of undefined pixels along the line.
    /// Default: Propagate
    pub undefined: UndefinedPolicy,
    /// Sample count from the line length.
    /// Default: Rounded
    pub sample_count: SampleCount,
}

/// Samples along a line, with misorientation to the origin and to the previous
/// sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MisorientationProfile {
    /// Distance (pixels) from the first kept sample.
    pub x: Vec<f64>,
    /// Misorientation (deg) to the first kept sample.
    pub mis2o: Vec<f64>,
    /// Misorientation (deg) to the previous kept sample; 0 for the first.
    pub mis2p: Vec<f64>,
    /// Sampled (row, col) pixels.
    pub pixels: Vec<(usize, usize)>,
}

impl MisorientationProfile {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Pixels visited between two points given in physical units
/// (x to the right, y up from the bottom edge).
///
/// The number of samples is the Euclidean pixel distance converted by
/// `count`; the end point itself is not included.
pub fn line_pixels(
    field: &OrientationField,
    start: (f64, f64),
    end: (f64, f64),
    count: SampleCount,
) -> Result<Vec<(usize, usize)>> {
    let (rows, _) = field.shape();
    let (r0, c0) = field.phi1.pixel_from_physical(start.0, start.1);
    let (r1, c1) = field.phi1.pixel_from_physical(end.0, end.1);
    let n = count.samples((r1 - r0).hypot(c1 - c0));

    (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            let from_bottom = (t * (r1 - r0) + r0).round_ties_even() as isize;
            let col = (t * (c1 - c0) + c0).round_ties_even() as isize;
            // y = 0 maps one past the last row; keep it on the bottom row
            let row = (rows as isize - from_bottom).min(rows as isize - 1);
            field.phi1.try_get(row, col)?;
            Ok((row as usize, col as usize))
        })
        .collect()
}

/// Misorientation profile between two points given in physical units.
pub fn misorientation_profile(
    field: &OrientationField,
    start: (f64, f64),
    end: (f64, f64),
    config: &ProfileConfig,
) -> Result<MisorientationProfile> {
    let pixels = line_pixels(field, start, end, config.sample_count)?;
    if pixels.is_empty() {
        return Err(FabricError::EmptySampleSet {
            context: format!("profile from {start:?} to {end:?}"),
        });
    }

    let mut profile = MisorientationProfile {
        x: Vec::with_capacity(pixels.len()),
        mis2o: Vec::with_capacity(pixels.len()),
        mis2p: Vec::with_capacity(pixels.len()),
        pixels: Vec::with_capacity(pixels.len()),
    };
    let nan3 = Vector3::repeat(f64::NAN);
    let mut origin: Option<(Vector3, (usize, usize))> = None;
    let mut previous = nan3;

    for (row, col) in pixels {
        let v = match field.caxis(row, col, AzimuthConvention::Shifted) {
            Some(v) => v,
            None => match config.undefined {
                UndefinedPolicy::Propagate => nan3,
                UndefinedPolicy::Skip => continue,
                UndefinedPolicy::Fail => return Err(FabricError::UndefinedSample { row, col }),
            },
        };

        let (v0, (row0, col0)) = *origin.get_or_insert((v, (row, col)));
        let first = profile.is_empty();
        let dr = row as f64 - row0 as f64;
        let dc = col as f64 - col0 as f64;

        profile.x.push((dr * dr + dc * dc).sqrt());
        profile.mis2o.push(misorientation_deg(&v0, &v));
        profile
            .mis2p
            .push(if first { 0.0 } else { misorientation_deg(&previous, &v) });
        profile.pixels.push((row, col));
        previous = v;
    }

    if profile.is_empty() {
        return Err(FabricError::EmptySampleSet {
            context: format!("profile from {start:?} to {end:?}: every sample undefined"),
        });
    }
    debug!(samples = profile.len(), policy = ?config.undefined, "misorientation profile");
    Ok(profile)
}
