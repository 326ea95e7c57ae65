//! An analysis session over one AITA map.
//!
//! [`FabricMap`] keeps the orientation field, the boundary mask and the grain
//! labels aligned through every transform. Each transform returns a new map;
//! the input is never modified.
//!
//! Points handed to the session (crop corners, triangle vertices, query points,
//! profile endpoints) are in physical units with `y` measured up from the
//! bottom edge, the frame a plotted map is clicked in.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rand::RngExt;
use tracing::{debug, info};

use crate::averaging::{average_grains, MeanMode};
use crate::error::{FabricError, Result};
use crate::export::{write_craft_files, ExportConfig};
use crate::grains::{ConnectedComponentLabeler, GrainField, GrainLabeler};
use crate::grid::{check_resolution, Grid};
use crate::healing::{heal_boundaries, HealedMicrostructure, HealingConfig};
use crate::misorientation::{misorientation_profile, MisorientationProfile, ProfileConfig};
use crate::orientation::{Orientation, OrientationField};
use crate::picker::PointPicker;
use crate::pole_figure::{pole_figure, PoleFigure, PoleFigureConfig};
use crate::tensor::{analyze_field, analyze_grains, FabricEigen, SampleSelection};

/// Tolerance of the area-sum point-in-triangle test.
const TRIANGLE_TOLERANCE: f64 = 1e-7;

/// Orientation field, boundary mask and grain labels of one map.
#[derive(Clone)]
pub struct FabricMap {
    field: OrientationField,
    mask: Grid<bool>,
    grains: GrainField,
    labeler: Arc<dyn GrainLabeler + Send + Sync>,
}

impl fmt::Debug for FabricMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FabricMap")
            .field("shape", &self.field.shape())
            .field("resolution", &self.field.resolution())
            .field("grains", &self.grains.labels().len())
            .finish_non_exhaustive()
    }
}

impl FabricMap {
    /// Label `mask` with `labeler` and bind it to `field`.
    pub fn new(
        field: OrientationField,
        mask: Grid<bool>,
        labeler: Arc<dyn GrainLabeler + Send + Sync>,
    ) -> Result<Self> {
        field.phi1.ensure_same_shape(&mask)?;
        let mut mask = mask;
        mask.resolution = field.resolution();
        let grains = GrainField::from_mask(&mask, labeler.as_ref())?;
        info!(
            rows = field.shape().0,
            cols = field.shape().1,
            grains = grains.labels().len(),
            "fabric map loaded"
        );
        Ok(Self {
            field,
            mask,
            grains,
            labeler,
        })
    }

    /// Same as [`new`](Self::new) with a 4-connected [`ConnectedComponentLabeler`].
    pub fn with_default_labeler(field: OrientationField, mask: Grid<bool>) -> Result<Self> {
        Self::new(field, mask, Arc::new(ConnectedComponentLabeler::default()))
    }

    pub fn field(&self) -> &OrientationField {
        &self.field
    }

    pub fn mask(&self) -> &Grid<bool> {
        &self.mask
    }

    pub fn grains(&self) -> &GrainField {
        &self.grains
    }

    pub fn shape(&self) -> (usize, usize) {
        self.field.shape()
    }

    pub fn resolution(&self) -> f64 {
        self.field.resolution()
    }

    fn with_field(&self, field: OrientationField) -> Self {
        Self {
            field,
            ..self.clone()
        }
    }

    /// Pixel containing a physical point.
    pub fn pixel_at(&self, x: f64, y: f64) -> Result<(usize, usize)> {
        let (from_bottom, col) = self.field.phi1.pixel_from_physical(x, y);
        let row = self.shape().0 as isize - 1 - from_bottom.floor() as isize;
        let col = col.floor() as isize;
        self.field.phi1.try_get(row, col)?;
        Ok((row as usize, col as usize))
    }

    /// Keep the rectangle spanned by two corner points and relabel the
    /// grains of the cropped mask.
    ///
    /// Only pixels entirely inside the rectangle are kept.
    pub fn crop(&self, corners: [(f64, f64); 2]) -> Result<Self> {
        let (rows, cols) = self.shape();
        let [(xa, ya), (xb, yb)] = corners.map(|(x, y)| {
            let (r, c) = self.field.phi1.pixel_from_physical(x, y);
            (c, r)
        });
        let clamp = |v: f64, hi: usize| v.max(0.0).min(hi as f64) as usize;
        let c0 = clamp(xa.min(xb).ceil(), cols);
        let c1 = clamp(xa.max(xb).floor(), cols);
        let r0 = clamp(rows as f64 - ya.max(yb).ceil(), rows);
        let r1 = clamp(rows as f64 - ya.min(yb).floor(), rows);
        if r0 >= r1 || c0 >= c1 {
            return Err(FabricError::EmptySampleSet {
                context: format!("crop between {:?} and {:?}", corners[0], corners[1]),
            });
        }

        let field = self.field.crop(r0..r1, c0..c1);
        let mask = self.mask.crop(r0..r1, c0..c1);
        let grains = GrainField::from_mask(&mask, self.labeler.as_ref())?;
        debug!(rows = ?(r0..r1), cols = ?(c0..c1), "cropped map");
        Ok(Self {
            field,
            mask,
            grains,
            labeler: Arc::clone(&self.labeler),
        })
    }

    /// [`crop`](Self::crop) with the two corners taken from `picker`.
    pub fn crop_with(&self, picker: &mut dyn PointPicker) -> anyhow::Result<Self> {
        let p = picker.pick(2)?;
        Ok(self.crop([p[0], p[1]])?)
    }

    /// Horizontal mirror of every layer.
    pub fn fliplr(&self) -> Self {
        Self {
            field: self.field.fliplr(),
            mask: self.mask.fliplr(),
            grains: self.grains.fliplr(),
            labeler: Arc::clone(&self.labeler),
        }
    }

    /// 180° rotation of every layer.
    pub fn rot180(&self) -> Self {
        Self {
            field: self.field.rot180(),
            mask: self.mask.rot180(),
            grains: self.grains.rot180(),
            labeler: Arc::clone(&self.labeler),
        }
    }

    /// Resample the map to a new pixel size and relabel the grains.
    ///
    /// Boundaries are first dilated `trunc(resolution / (2 · old))` times so
    /// that one-pixel boundaries survive downsampling.
    pub fn resize(&self, resolution: f64) -> Result<Self> {
        check_resolution(resolution)?;
        let iterations = (resolution / (2.0 * self.resolution())) as usize;
        let field = self.field.resize(resolution)?;
        let mask = self.mask.dilate(iterations).resize(resolution)?;
        let grains = GrainField::from_mask(&mask, self.labeler.as_ref())?;
        info!(
            from = self.resolution(),
            to = resolution,
            dilations = iterations,
            shape = ?field.shape(),
            "resized map"
        );
        Ok(Self {
            field,
            mask,
            grains,
            labeler: Arc::clone(&self.labeler),
        })
    }

    /// Null orientations with quality below `threshold`.
    pub fn filter(&self, threshold: f64) -> Self {
        self.with_field(self.field.filter_quality(threshold))
    }

    /// Replace every grain's orientation by its mean.
    pub fn grain_mean(&self, mode: MeanMode) -> Result<Self> {
        Ok(self.with_field(average_grains(&self.field, &self.grains, mode)?))
    }

    /// Fill grain boundaries from their neighbours.
    pub fn heal(&self, config: &HealingConfig) -> Result<HealedMicrostructure> {
        heal_boundaries(&self.grains, &self.field, config)
    }

    /// Insert a new grain covering a triangle.
    ///
    /// Every pixel whose top-left corner lies in the triangle gets label
    /// `max + 1` and either `orientation` or a random one (φ1 in [0, 2π),
    /// φ in [0, π/2]). Those pixels stop being boundary pixels.
    pub fn add_grain<R: RngExt + ?Sized>(
        &self,
        triangle: [(f64, f64); 3],
        orientation: Option<Orientation>,
        rng: &mut R,
    ) -> Result<Self> {
        let (rows, cols) = self.shape();
        let res = self.resolution();
        let t = triangle.map(|(x, y)| (x / res, y / res));

        let min_x = t.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).trunc().max(0.0) as usize;
        let max_x = t.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil();
        let min_y = t.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).trunc().max(0.0) as usize;
        let max_y = t.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil();
        let max_x = (max_x.max(0.0) as usize).min(cols);
        let max_y = (max_y.max(0.0) as usize).min(rows + 1);

        let orientation = orientation.unwrap_or_else(|| {
            Orientation::new(
                rng.random::<f64>() * std::f64::consts::TAU,
                rng.random::<f64>() * std::f64::consts::FRAC_PI_2,
            )
        });
        let label = self.grains.max_label().map_or(0, |m| m + 1);

        let mut out = self.clone();
        let mut added = 0usize;
        for i in min_x..max_x {
            for j in min_y..max_y {
                // j counts from the bottom; j = 0 sits just below the grid
                if j == 0 || j > rows {
                    continue;
                }
                if !inside_triangle((i as f64, j as f64), t) {
                    continue;
                }
                let row = rows - j;
                out.grains.labels.set(row, i, Some(label));
                out.mask.set(row, i, false);
                out.field.set_orientation(row, i, orientation);
                added += 1;
            }
        }
        if added == 0 {
            return Err(FabricError::EmptySampleSet {
                context: format!("triangle {triangle:?} covers no pixel"),
            });
        }
        info!(label, pixels = added, "grain added");
        Ok(out)
    }

    /// [`add_grain`](Self::add_grain) with the triangle taken from `picker`.
    pub fn add_grain_with<R: RngExt + ?Sized>(
        &self,
        picker: &mut dyn PointPicker,
        orientation: Option<Orientation>,
        rng: &mut R,
    ) -> anyhow::Result<Self> {
        let p = picker.pick(3)?;
        Ok(self.add_grain([p[0], p[1], p[2]], orientation, rng)?)
    }

    /// Orientation at each query point.
    pub fn grain_orientations(&self, points: &[(f64, f64)]) -> Result<Vec<Orientation>> {
        points
            .iter()
            .map(|&(x, y)| {
                let (row, col) = self.pixel_at(x, y)?;
                Ok(self.field.orientation(row, col))
            })
            .collect()
    }

    /// Orientation tensor of a pixel selection.
    pub fn fabric(&self, selection: &SampleSelection) -> Result<FabricEigen> {
        analyze_field(&self.field, &self.grains, selection)
    }

    /// Orientation tensor of every grain.
    pub fn grain_fabrics(&self) -> Result<std::collections::BTreeMap<u32, FabricEigen>> {
        analyze_grains(&self.field, &self.grains)
    }

    /// Misorientation profile between two physical points.
    pub fn profile(
        &self,
        start: (f64, f64),
        end: (f64, f64),
        config: &ProfileConfig,
    ) -> Result<MisorientationProfile> {
        misorientation_profile(&self.field, start, end, config)
    }

    /// [`profile`](Self::profile) with the endpoints taken from `picker`.
    pub fn profile_with(
        &self,
        picker: &mut dyn PointPicker,
        config: &ProfileConfig,
    ) -> anyhow::Result<MisorientationProfile> {
        let p = picker.pick(2)?;
        Ok(self.profile(p[0], p[1], config)?)
    }

    pub fn pole_figure(
        &self,
        selection: &SampleSelection,
        config: &PoleFigureConfig,
    ) -> Result<PoleFigure> {
        pole_figure(&self.field, &self.grains, selection, config)
    }

    /// Heal the map and write the CraFT input set `<dir>/<name>*`.
    pub fn export_craft(
        &self,
        dir: &Path,
        name: &str,
        healing: &HealingConfig,
        export: &ExportConfig,
    ) -> anyhow::Result<HealedMicrostructure> {
        let healed = self.heal(healing)?;
        write_craft_files(dir, name, &healed, export)?;
        Ok(healed)
    }
}

/// Whether `p` lies in the triangle `t`, by comparing the sum of the three
/// sub-triangle areas with the full area.
fn inside_triangle(p: (f64, f64), t: [(f64, f64); 3]) -> bool {
    let area2 = |a: (f64, f64), b: (f64, f64), c: (f64, f64)| {
        (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1)).abs()
    };
    let [a, b, c] = t;
    let full = area2(a, b, c);
    (area2(a, b, p) + area2(a, p, c) + area2(p, b, c) - full).abs() < TRIANGLE_TOLERANCE
}
