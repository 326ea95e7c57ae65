//! Writers for the CraFT FFT solver input set and for profile tables.
//!
//! A CraFT run needs five files sharing one prefix:
//!
//! - `<name>_micro.vtk`: legacy VTK structured-points image of phase labels
//! - `<name>.phase`: one line per phase: material and three Euler angles
//! - `<name>.load`, `<name>.output`, `<name>.in`: loading, output and run
//!   templates pointing at the other files
//!
//! The microstructure must be healed first: the solver has no notion of a
//! missing pixel. The third Euler angle is not measured optically and is
//! drawn uniformly in [0, 2π) per phase.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use tracing::info;

use crate::grid::Grid;
use crate::healing::HealedMicrostructure;
use crate::misorientation::MisorientationProfile;

const RULE: &str = "#------------------------------------------------------------";

/// Configuration for [`write_craft_files`].
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Seed for the random third Euler angle. `None` draws a fresh seed.
    /// Default: None
    pub seed: Option<u64>,

    /// Materials file referenced by `<name>.in`.
    /// Default: "../../../../Ice_Constitutive_Law/glace3_oc2_5mai2011.mat"
    pub materials_path: String,

    /// Date stamped in file headers (e.g. "2026-10-16"). Omitted when `None`.
    /// Default: None
    pub date: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            seed: None,
            materials_path: "../../../../Ice_Constitutive_Law/glace3_oc2_5mai2011.mat".to_string(),
            date: None,
        }
    }
}

impl ExportConfig {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::rng().random()),
        }
    }
}

/// One `<name>.phase` entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseEntry {
    pub label: u32,
    pub phi1: f64,
    pub phi: f64,
    pub phi2: f64,
}

fn stamp(date: Option<&str>) -> String {
    date.map(|d| format!(" {d}")).unwrap_or_default()
}

fn write_banner<W: Write>(w: &mut W, name: &str, date: Option<&str>) -> std::io::Result<()> {
    writeln!(w, "{RULE}")?;
    match date {
        Some(d) => writeln!(w, "# Date {d}      Manip: {name}")?,
        None => writeln!(w, "# Manip: {name}")?,
    }
    writeln!(w, "{RULE}")
}

/// Legacy VTK image of the label field. Rows are written from the last array
/// row to the first so the solver sees the map the right way up.
pub fn write_vtk<W: Write>(w: &mut W, labels: &Grid<u32>, date: Option<&str>) -> std::io::Result<()> {
    writeln!(w, "# vtk DataFile Version 3.0{}", stamp(date))?;
    writeln!(w, "craft output ")?;
    writeln!(w, "ASCII ")?;
    writeln!(w, "DATASET STRUCTURED_POINTS ")?;
    writeln!(w, "DIMENSIONS {} {} 1", labels.cols, labels.rows)?;
    writeln!(w, "ORIGIN 0.000000 0.000000 0.000000 ")?;
    writeln!(w, "SPACING {:?} {:?} 1.000000 ", labels.resolution, labels.resolution)?;
    writeln!(w, "POINT_DATA {}", labels.rows * labels.cols)?;
    writeln!(w, "SCALARS scalars float ")?;
    writeln!(w, "LOOKUP_TABLE default ")?;
    for row in labels.data.chunks(labels.cols.max(1)).rev() {
        for label in row {
            write!(w, "{label} ")?;
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Phase table rows: for each label in ascending order, the orientation of
/// its first pixel in raster order and a random third angle. Labels whose
/// first pixel has no colatitude are left out.
pub fn phase_entries(healed: &HealedMicrostructure, rng: &mut StdRng) -> Vec<PhaseEntry> {
    let mut first_pixel = std::collections::BTreeMap::new();
    for (i, &label) in healed.labels.data.iter().enumerate() {
        first_pixel.entry(label).or_insert(i);
    }
    first_pixel
        .into_iter()
        .filter_map(|(label, i)| {
            let o = healed.field.orientation_at(i);
            let phi2 = rng.random::<f64>() * std::f64::consts::TAU;
            (!o.phi.is_nan()).then_some(PhaseEntry {
                label,
                phi1: o.phi1,
                phi: o.phi,
                phi2,
            })
        })
        .collect()
}

pub fn write_phase_table<W: Write>(
    w: &mut W,
    name: &str,
    entries: &[PhaseEntry],
    date: Option<&str>,
) -> std::io::Result<()> {
    write_banner(w, name, date)?;
    writeln!(w, "# This file give for each phase ")?;
    writeln!(w, "# *the matetial ")?;
    writeln!(w, "# *its orientation (3 euler angles)")?;
    writeln!(w, "#")?;
    writeln!(w, "{RULE}")?;
    writeln!(w, "# phase    material       phi1    Phi   phi2")?;
    writeln!(w, "{RULE}")?;
    for e in entries {
        writeln!(
            w,
            "{}          0              {:?} {:?} {:?}",
            e.label, e.phi1, e.phi, e.phi2
        )?;
    }
    Ok(())
}

/// Example loading: imposed stress, compression along 22.
pub fn write_load<W: Write>(w: &mut W, name: &str, date: Option<&str>) -> std::io::Result<()> {
    write_banner(w, name, date)?;
    for line in [
        "# choix du type de chargement ",
        "# direction contrainte imposée: S ",
        "# contrainte imposée:          C ",
        "# déformation imposée:         D ",
        "C",
        RULE,
        "# nb de pas    temps        direction            facteur",
        "#                            11 22 33 12 13 23",
        "                5.            0  1  0  0  0  0    -0.5",
        "5.            100.          0  1  0  0  0  0    -0.5",
        "#",
        RULE,
    ] {
        writeln!(w, "{line}")?;
    }
    Ok(())
}

pub fn write_output<W: Write>(w: &mut W, name: &str, date: Option<&str>) -> std::io::Result<()> {
    write_banner(w, name, date)?;
    for line in [
        "equivalent stress image = yes 10,60,100",
        "equivalent strain image = yes 10,60,100",
        "#",
        "stress image = yes 10,60,100",
        "strain image = yes 10,60,100",
        "#",
        "backstress image = yes 10,60,100",
        "#",
        "strain moment = yes 5:100",
        "stress moment = yes 5:100",
        "im_format=vtk",
    ] {
        writeln!(w, "{line}")?;
    }
    Ok(())
}

fn write_section<W: Write>(w: &mut W, comment: &str, entry: &str) -> std::io::Result<()> {
    writeln!(w, "# {comment}")?;
    writeln!(w, "{entry}")?;
    writeln!(w, "#\n{RULE}")
}

/// Run description tying the other four files together.
pub fn write_input<W: Write>(
    w: &mut W,
    name: &str,
    materials_path: &str,
    date: Option<&str>,
) -> std::io::Result<()> {
    write_banner(w, name, date)?;
    writeln!(w, "#\n#\n{RULE}")?;
    write_section(
        w,
        "name of the file of the image of the microstructure",
        &format!("microstructure=../{name}_micro.vtk"),
    )?;
    write_section(
        w,
        "name of the file of the description of phases",
        &format!("phases=../{name}.phase"),
    )?;
    write_section(
        w,
        "name of the file describing the materials the phases are made of:",
        &format!("materials={materials_path}"),
    )?;
    write_section(w, "file of the loading conditions:", &format!("loading=../{name}.load"))?;
    write_section(
        w,
        "file telling the outputs one wants to obtain:",
        &format!("output=../{name}.output"),
    )?;
    write_section(w, "The parameter C0 has to be set by craft:", "C0=auto")?;
    writeln!(w, "# # required precision for equilibrium and for loading conditions:")?;
    writeln!(w, "precision=1.e-4, 1.e-4")?;
    writeln!(w, "{RULE}")
}

fn create(path: &Path) -> anyhow::Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write the five CraFT files `<dir>/<name>…` and return their paths.
pub fn write_craft_files(
    dir: &Path,
    name: &str,
    healed: &HealedMicrostructure,
    config: &ExportConfig,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    let date = config.date.as_deref();
    let mut rng = config.rng();
    let entries = phase_entries(healed, &mut rng);

    type Out = BufWriter<File>;
    let files: [(String, &dyn Fn(&mut Out) -> std::io::Result<()>); 5] = [
        (format!("{name}_micro.vtk"), &|w: &mut Out| write_vtk(w, &healed.labels, date)),
        (format!("{name}.phase"), &|w: &mut Out| {
            write_phase_table(w, name, &entries, date)
        }),
        (format!("{name}.load"), &|w: &mut Out| write_load(w, name, date)),
        (format!("{name}.output"), &|w: &mut Out| write_output(w, name, date)),
        (format!("{name}.in"), &|w: &mut Out| {
            write_input(w, name, &config.materials_path, date)
        }),
    ];

    let mut paths = Vec::with_capacity(files.len());
    for (file_name, write) in files {
        let path = dir.join(file_name);
        let mut w = create(&path)?;
        write(&mut w)
            .and_then(|_| w.flush())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        paths.push(path);
    }
    info!(
        dir = %dir.display(),
        name,
        phases = entries.len(),
        "CraFT input written"
    );
    Ok(paths)
}

/// Profile as CSV with columns `x, mis2o, mis2p, row, col`.
pub fn write_profile_csv<W: Write>(w: W, profile: &MisorientationProfile) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(["x", "mis2o", "mis2p", "row", "col"])?;
    for k in 0..profile.len() {
        let (row, col) = profile.pixels[k];
        wtr.write_record([
            profile.x[k].to_string(),
            profile.mis2o[k].to_string(),
            profile.mis2p[k].to_string(),
            row.to_string(),
            col.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// [`write_profile_csv`] to a file.
pub fn save_profile_csv(path: impl AsRef<Path>, profile: &MisorientationProfile) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = create(path)?;
    write_profile_csv(file, profile).with_context(|| format!("Failed to write {}", path.display()))
}
