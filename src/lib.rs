//! # icefabric
//!
//! Orientation-field analysis for ice thin sections measured with an automatic
//! ice-texture analyser (AITA / G50 fabric analyser).
//!
//! An AITA map gives, for every pixel, the c-axis orientation of the ice
//! crystal as two Euler angles (azimuth `phi1`, colatitude `phi`) plus a
//! quality index. A boundary mask separates grains. This crate turns such maps
//! into the quantities glaciologists work with:
//!
//! - **Grain averaging**: one mean orientation per grain
//! - **Boundary healing**: fill grain boundaries from neighbours so the map
//!   can drive an FFT full-field solver (CraFT)
//! - **Orientation tensor**: second-order fabric tensor and its eigenframe
//! - **Misorientation profiles**: c-axis misorientation along a line
//! - **Pole figures**: equal-area projection with a kernel density estimate
//!
//! ## Example
//!
//! ```no_run
//! use icefabric::{
//!     load_fabric_map, ExportConfig, HealingConfig, MeanMode, PoleFigureConfig,
//!     SampleSelection,
//! };
//! use std::path::Path;
//!
//! let map = load_fabric_map("data/orientation.dat", Some(Path::new("data/micro.bmp")))?;
//!
//! // Drop poorly indexed pixels and average each grain
//! let map = map.filter(75.0).grain_mean(MeanMode::Circular)?;
//!
//! let fabric = map.fabric(&SampleSelection::All)?;
//! for (value, axis) in fabric.sorted_descending() {
//!     println!("{value:.3} along {axis:?}");
//! }
//!
//! let pf = map.pole_figure(&SampleSelection::All, &PoleFigureConfig::default())?;
//! println!("{} points on the pole figure", pf.points.len());
//!
//! // Solver input set: out/manip01_micro.vtk, out/manip01.phase, ...
//! let config = ExportConfig {
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! map.export_craft(Path::new("out"), "manip01", &HealingConfig::default(), &config)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Conventions
//!
//! - Arrays are row-major with row 0 at the top. Points given in physical
//!   units (crop corners, profile endpoints) measure `y` upwards from the
//!   bottom edge.
//! - An undefined pixel has both angles NaN. Boundary pixels have no label.
//! - A c-axis and its opposite are the same axis; every angle between axes
//!   uses `|v · w|`.
//! - Tensors, profiles and pole figures build c-axes from the azimuth
//!   `(phi1 − π/2) mod 2π`.
//!
//! ## Features
//!
//! - `image` (default): read boundary bitmaps with the `image` crate
//! - `parallel`: per-grain reductions and KDE evaluation on the rayon pool
//!

pub mod averaging;
pub mod error;
pub mod export;
pub mod grains;
pub mod grid;
pub mod healing;
pub mod loader;
pub mod misorientation;
pub mod orientation;
pub mod picker;
pub mod pole_figure;
pub mod session;
pub mod tensor;

pub use averaging::{average_grains, grain_mean, MeanMode};
pub use error::{FabricError, Result};
pub use export::{
    save_profile_csv, write_craft_files, write_profile_csv, ExportConfig, PhaseEntry,
};
pub use grains::{ConnectedComponentLabeler, GrainField, GrainLabeler, LabelingConfig};
pub use grid::Grid;
pub use healing::{heal_boundaries, HealedMicrostructure, HealingConfig};
#[cfg(feature = "image")]
pub use loader::load_boundary_mask;
pub use loader::{interior_mask, load_aita5col, load_fabric_map, parse_aita5col};
pub use misorientation::{
    misorientation_deg, misorientation_profile, MisorientationProfile, ProfileConfig,
    SampleCount, UndefinedPolicy,
};
pub use orientation::{AzimuthConvention, Orientation, OrientationField};
pub use picker::{FixedPoints, PointPicker};
pub use pole_figure::{pole_figure, project, PoleFigure, PoleFigureConfig, ProjectedAxis};
pub use session::FabricMap;
pub use tensor::{analyze_field, analyze_grains, FabricEigen, SampleSelection};

// All orientation math runs in f64: maps hold up to millions of nearly
// parallel unit vectors and f32 accumulation visibly biases the tensor.
pub type Vector3 = nalgebra::Vector3<f64>;
pub type Matrix3 = nalgebra::Matrix3<f64>;
