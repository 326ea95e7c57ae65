//! Per-pixel c-axis orientations and the angle-aware geometric transforms.
//!
//! Orientations are stored as the first two Bunge Euler angles: `phi1`
//! (azimuth, in [0, 2π)) and `phi` (colatitude, in [0, π/2]). The third angle
//! cannot be resolved optically and is never stored. An undefined pixel has
//! both angles set to NaN.
//!
//! Moving pixels around (mirror, rotation) changes the frame in which the
//! azimuth is measured, so the transforms here permute the grids *and*
//! correct `phi1`:
//!
//! | transform        | pixel permutation   | azimuth correction        |
//! |------------------|---------------------|---------------------------|
//! | horizontal mirror| reverse columns     | φ1 ← (π − φ1) mod 2π      |
//! | 180° rotation    | reverse both axes   | φ1 ← (π + φ1) mod 2π      |

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use tracing::{debug, warn};

use crate::error::{FabricError, Result};
use crate::grid::Grid;
use crate::Vector3;

/// Wrap an angle into [0, 2π). NaN stays NaN.
#[inline]
pub fn wrap_tau(angle: f64) -> f64 {
    let w = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if w >= TAU {
        0.0
    } else {
        w
    }
}

/// Azimuth after a horizontal mirror of the map.
#[inline]
pub fn mirror_phi1(phi1: f64) -> f64 {
    wrap_tau(PI - phi1)
}

/// Azimuth after a 180° in-plane rotation of the map.
#[inline]
pub fn rotate180_phi1(phi1: f64) -> f64 {
    wrap_tau(PI + phi1)
}

/// How `phi1` is turned into a spherical azimuth when building c-axis vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AzimuthConvention {
    /// Use `phi1` as the azimuth directly.
    Raw,
    /// Use `(phi1 − π/2) mod 2π`, the frame used for pole figures, orientation
    /// tensors and misorientation profiles.
    #[default]
    Shifted,
}

impl AzimuthConvention {
    #[inline]
    pub fn azimuth(self, phi1: f64) -> f64 {
        match self {
            AzimuthConvention::Raw => phi1,
            AzimuthConvention::Shifted => wrap_tau(phi1 - FRAC_PI_2),
        }
    }
}

/// A single c-axis orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    /// Azimuth (rad).
    pub phi1: f64,
    /// Colatitude (rad).
    pub phi: f64,
}

impl Orientation {
    pub const UNDEFINED: Orientation = Orientation {
        phi1: f64::NAN,
        phi: f64::NAN,
    };

    pub fn new(phi1: f64, phi: f64) -> Self {
        Self { phi1, phi }
    }

    /// Both angles are measured (not NaN).
    #[inline]
    pub fn is_defined(&self) -> bool {
        !self.phi1.is_nan() && !self.phi.is_nan()
    }

    /// c-axis unit vector, or `None` for an undefined pixel.
    ///
    /// The vector and its negation describe the same physical axis.
    pub fn caxis(&self, convention: AzimuthConvention) -> Option<Vector3> {
        if !self.is_defined() {
            return None;
        }
        let (az_sin, az_cos) = convention.azimuth(self.phi1).sin_cos();
        let (col_sin, col_cos) = self.phi.sin_cos();
        Some(Vector3::new(az_cos * col_sin, az_sin * col_sin, col_cos))
    }
}

/// Euler-angle and quality maps sharing one pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationField {
    pub phi1: Grid<f64>,
    pub phi: Grid<f64>,
    pub quality: Grid<f64>,
}

impl OrientationField {
    /// Assemble a field from its three maps. Shapes must match exactly and
    /// resolution must be positive.
    pub fn new(phi1: Grid<f64>, phi: Grid<f64>, quality: Grid<f64>) -> Result<Self> {
        crate::grid::check_resolution(phi1.resolution)?;
        phi1.ensure_same_shape(&phi)?;
        phi1.ensure_same_shape(&quality)?;
        Ok(Self { phi1, phi, quality })
    }

    /// Build from row-major buffers.
    pub fn from_vecs(
        rows: usize,
        cols: usize,
        resolution: f64,
        phi1: Vec<f64>,
        phi: Vec<f64>,
        quality: Vec<f64>,
    ) -> Result<Self> {
        Self::new(
            Grid::new(rows, cols, resolution, phi1)?,
            Grid::new(rows, cols, resolution, phi)?,
            Grid::new(rows, cols, resolution, quality)?,
        )
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.phi1.shape()
    }

    #[inline]
    pub fn resolution(&self) -> f64 {
        self.phi1.resolution
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.phi1.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.phi1.is_empty()
    }

    #[inline]
    pub fn orientation(&self, row: usize, col: usize) -> Orientation {
        Orientation::new(*self.phi1.get(row, col), *self.phi.get(row, col))
    }

    #[inline]
    pub fn orientation_at(&self, idx: usize) -> Orientation {
        Orientation::new(self.phi1.data[idx], self.phi.data[idx])
    }

    pub fn set_orientation(&mut self, row: usize, col: usize, o: Orientation) {
        self.phi1.set(row, col, o.phi1);
        self.phi.set(row, col, o.phi);
    }

    /// c-axis at a pixel in the given azimuth convention.
    pub fn caxis(&self, row: usize, col: usize, convention: AzimuthConvention) -> Option<Vector3> {
        self.orientation(row, col).caxis(convention)
    }

    /// Number of pixels with a defined orientation.
    pub fn defined_count(&self) -> usize {
        (0..self.len())
            .filter(|&i| self.orientation_at(i).is_defined())
            .count()
    }

    /// Horizontal mirror: columns reversed, φ1 ← (π − φ1) mod 2π.
    pub fn fliplr(&self) -> Self {
        Self {
            phi1: self.phi1.fliplr().map(|&a| mirror_phi1(a)),
            phi: self.phi.fliplr(),
            quality: self.quality.fliplr(),
        }
    }

    /// 180° rotation: both axes reversed, φ1 ← (π + φ1) mod 2π.
    pub fn rot180(&self) -> Self {
        Self {
            phi1: self.phi1.rot180().map(|&a| rotate180_phi1(a)),
            phi: self.phi.rot180(),
            quality: self.quality.rot180(),
        }
    }

    /// Pixel sub-rectangle. Angles are unchanged.
    pub fn crop(&self, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> Self {
        Self {
            phi1: self.phi1.crop(rows.clone(), cols.clone()),
            phi: self.phi.crop(rows.clone(), cols.clone()),
            quality: self.quality.crop(rows, cols),
        }
    }

    /// Resample every layer to a new pixel size (nearest neighbour, so no
    /// angle is ever interpolated).
    pub fn resize(&self, resolution: f64) -> Result<Self> {
        Ok(Self {
            phi1: self.phi1.resize(resolution)?,
            phi: self.phi.resize(resolution)?,
            quality: self.quality.resize(resolution)?,
        })
    }

    /// Null the orientation of every pixel whose quality is below `threshold`.
    ///
    /// Quality values are kept. A threshold outside [0, 100] is logged as a
    /// warning and still applied.
    pub fn filter_quality(&self, threshold: f64) -> Self {
        if !(0.0..=100.0).contains(&threshold) {
            warn!("{}", FabricError::OutOfRangeQuality(threshold));
        }
        let mut out = self.clone();
        let mut removed = 0usize;
        for (i, &q) in self.quality.data.iter().enumerate() {
            if q < threshold {
                out.phi1.data[i] = f64::NAN;
                out.phi.data[i] = f64::NAN;
                removed += 1;
            }
        }
        debug!(threshold, removed, "quality filter applied");
        out
    }
}
