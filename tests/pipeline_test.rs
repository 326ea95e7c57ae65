//! End-to-end tests: build a synthetic three-grain map with measurement noise,
//! run it through filtering, grain averaging, tensor analysis, profiles, pole
//! figures, healing and the CraFT export, and check each stage.

use std::f64::consts::TAU;
use std::path::PathBuf;

use icefabric::{
    misorientation_deg, AzimuthConvention, ExportConfig, FabricError, FabricMap, FixedPoints,
    Grid, HealingConfig, MeanMode, Orientation, OrientationField, PoleFigureConfig,
    ProfileConfig, SampleSelection, UndefinedPolicy,
};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rand_distr::{Distribution, Normal};

const ROWS: usize = 40;
const COLS: usize = 60;
const RES: f64 = 0.02;
const BOUNDARY_COLS: [usize; 2] = [20, 40];

/// True (phi1, phi) of the grains left to right.
const GRAINS: [(f64, f64); 3] = [(0.3, 0.15), (2.0, 0.25), (4.0, 0.1)];

fn grain_of_col(col: usize) -> Option<usize> {
    match col {
        c if BOUNDARY_COLS.contains(&c) => None,
        c if c < 20 => Some(0),
        c if c < 40 => Some(1),
        _ => Some(2),
    }
}

/// Three vertical grains separated by one-pixel boundaries, 1° noise on both
/// angles and quality uniform in [50, 100).
fn synthetic_map(seed: u64) -> FabricMap {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1f64.to_radians()).unwrap();

    let n = ROWS * COLS;
    let (mut phi1, mut phi, mut quality, mut mask) = (
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    );
    for _ in 0..ROWS {
        for col in 0..COLS {
            quality.push(rng.random_range(50.0..100.0));
            match grain_of_col(col) {
                Some(g) => {
                    let (a, c) = GRAINS[g];
                    phi1.push((a + noise.sample(&mut rng)).rem_euclid(TAU));
                    phi.push(c + noise.sample(&mut rng));
                    mask.push(false);
                }
                None => {
                    phi1.push(f64::NAN);
                    phi.push(f64::NAN);
                    mask.push(true);
                }
            }
        }
    }
    let field = OrientationField::from_vecs(ROWS, COLS, RES, phi1, phi, quality).unwrap();
    let mask = Grid::new(ROWS, COLS, RES, mask).unwrap();
    FabricMap::with_default_labeler(field, mask).unwrap()
}

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("icefabric_{name}_{}", std::process::id()))
}

#[test]
fn test_full_pipeline() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    // ── Labeling ──
    let map = synthetic_map(1);
    assert_eq!(map.grains().labels(), vec![0, 1, 2]);
    assert_eq!(map.grains().undefined_count(), 2 * ROWS);

    // ── Quality filter ──
    let filtered = map.filter(60.0);
    let removed = map.field().defined_count() - filtered.field().defined_count();
    println!("Quality filter removed {removed} pixels");
    assert!(removed > 0);
    assert!(filtered.field().quality == map.field().quality);

    // ── Grain averaging ──
    let averaged = filtered.grain_mean(MeanMode::Circular).unwrap();
    for (label, &(a, c)) in GRAINS.iter().enumerate() {
        let pixels = averaged.grains().pixels_of(label as u32);
        let o = averaged.field().orientation_at(pixels[0]);
        println!("Grain {label}: phi1 = {:.4}, phi = {:.4}", o.phi1, o.phi);
        assert!((o.phi1 - a).abs() < 0.01, "grain {label} phi1 = {}", o.phi1);
        assert!((o.phi - c).abs() < 0.01, "grain {label} phi = {}", o.phi);
        assert!(pixels
            .iter()
            .all(|&i| averaged.field().orientation_at(i) == o));
    }

    // ── Orientation tensor ──
    let fabric = averaged.fabric(&SampleSelection::All).unwrap();
    let sorted = fabric.sorted_descending();
    println!("Eigenvalues: {:?}", sorted.map(|p| p.0));
    assert!((fabric.trace() - 1.0).abs() < 1e-9);
    assert!((fabric.eigenvalues.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(sorted[0].0 > 0.9, "near-vertical fabric should be a single maximum");
    assert!(sorted[0].1.z > 0.95);
    assert_eq!(fabric.n_samples, (COLS - 2) * ROWS);

    let per_grain = averaged.grain_fabrics().unwrap();
    assert_eq!(per_grain.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    // a single orientation per grain gives a rank-one tensor
    for eig in per_grain.values() {
        assert!((eig.sorted_descending()[0].0 - 1.0).abs() < 1e-9);
    }

    // ── Misorientation profile across all three grains ──
    let config = ProfileConfig {
        undefined: UndefinedPolicy::Skip,
        ..Default::default()
    };
    let profile = averaged.profile((0.1, 0.4), (1.108, 0.4), &config).unwrap();
    assert_eq!(profile.mis2o[0], 0.0);
    assert!(profile.mis2o.iter().all(|m| !m.is_nan()));
    let va = averaged
        .field()
        .caxis(0, 10, AzimuthConvention::Shifted)
        .unwrap();
    let vb = averaged
        .field()
        .caxis(0, 30, AzimuthConvention::Shifted)
        .unwrap();
    let ab = misorientation_deg(&va, &vb);
    let max_step = profile.mis2p.iter().copied().fold(0.0, f64::max);
    println!("A-B misorientation {ab:.3}°, largest step {max_step:.3}°");
    assert!((max_step - ab).abs() < 1e-6 || max_step > ab);

    let propagated = averaged
        .profile((0.1, 0.4), (1.108, 0.4), &ProfileConfig::default())
        .unwrap();
    assert_eq!(propagated.len(), 50);
    assert!(propagated.mis2o.iter().any(|m| m.is_nan()));

    // ── Pole figure ──
    let pf_config = PoleFigureConfig {
        decimation: 10,
        density_percentile: 10.0,
        ..Default::default()
    };
    let pf = averaged
        .pole_figure(&SampleSelection::All, &pf_config)
        .unwrap();
    println!("Pole figure: {} points", pf.points.len());
    assert!(!pf.points.is_empty() && pf.points.len() <= 240);
    assert_eq!(pf.points.len(), pf.density.len());
    assert!(pf
        .points
        .iter()
        .all(|&(x, y)| x.hypot(y) <= std::f64::consts::SQRT_2 + 1e-12));
    assert!((pf.axes[0].eigenvalue - sorted[0].0).abs() < 1e-12);

    // ── Healing + CraFT export ──
    let dir = scratch_dir("pipeline");
    let export = ExportConfig {
        seed: Some(2024),
        date: Some("2026-10-16".to_string()),
        ..Default::default()
    };
    let healed = averaged
        .export_craft(&dir, "synthetic", &HealingConfig::default(), &export)
        .unwrap();
    assert_eq!(healed.passes, 1);
    assert_eq!(healed.labels(), vec![0, 1, 2]);
    // boundary column 20 copies from column 19 (grain 0)
    assert_eq!(*healed.labels.get(5, 20), 0);
    assert_eq!(*healed.labels.get(5, 40), 1);

    let vtk = std::fs::read_to_string(dir.join("synthetic_micro.vtk")).unwrap();
    assert_eq!(vtk.lines().count(), 10 + ROWS);
    assert!(vtk.starts_with("# vtk DataFile Version 3.0 2026-10-16\n"));

    let phase = std::fs::read_to_string(dir.join("synthetic.phase")).unwrap();
    let rows: Vec<&str> = phase.lines().filter(|l| !l.starts_with('#')).collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[1].starts_with("1          0              "));

    for ext in [".load", ".output", ".in"] {
        assert!(dir.join(format!("synthetic{ext}")).exists(), "missing {ext}");
    }

    // Same seed, same third angles
    let dir2 = scratch_dir("pipeline_again");
    averaged
        .export_craft(&dir2, "synthetic", &HealingConfig::default(), &export)
        .unwrap();
    let phase2 = std::fs::read_to_string(dir2.join("synthetic.phase")).unwrap();
    assert_eq!(phase, phase2);

    let _ = std::fs::remove_dir_all(&dir);
    let _ = std::fs::remove_dir_all(&dir2);
}

#[test]
fn test_transforms_preserve_fabric_eigenvalues() {
    let map = synthetic_map(7);
    let reference = map.fabric(&SampleSelection::All).unwrap().sorted_descending();
    for transformed in [map.fliplr(), map.rot180(), map.fliplr().rot180()] {
        let eig = transformed
            .fabric(&SampleSelection::All)
            .unwrap()
            .sorted_descending();
        for k in 0..3 {
            assert!(
                (eig[k].0 - reference[k].0).abs() < 1e-9,
                "eigenvalue {k}: {} vs {}",
                eig[k].0,
                reference[k].0
            );
        }
    }
}

#[test]
fn test_crop_then_profile_with_picker() {
    let map = synthetic_map(3);
    // keep columns 0..30 (grain 0 and part of grain 1), full height
    let mut picker = FixedPoints::new([(0.0, 0.81), (0.61, 0.0), (0.1, 0.4), (0.508, 0.4)]);
    let cropped = map.crop_with(&mut picker).unwrap();
    assert_eq!(cropped.shape(), (ROWS, 30));
    assert_eq!(cropped.grains().labels(), vec![0, 1]);

    let profile = cropped
        .profile_with(&mut picker, &ProfileConfig::default())
        .unwrap();
    assert_eq!(profile.len(), 20);
    assert_eq!(picker.remaining(), 0);
    assert!(cropped.profile_with(&mut picker, &ProfileConfig::default()).is_err());
}

#[test]
fn test_add_grain_then_heal() {
    let map = synthetic_map(5);
    let mut rng = StdRng::seed_from_u64(99);
    // triangle straddling the first boundary column
    let tri = [(0.3, 0.2), (0.5, 0.2), (0.4, 0.5)];
    let with_grain = map.add_grain(tri, None, &mut rng).unwrap();
    assert_eq!(with_grain.grains().max_label(), Some(3));
    let added = with_grain.grains().pixels_of(3);
    assert!(!added.is_empty());
    let o = with_grain.field().orientation_at(added[0]);
    assert!(o.is_defined());
    assert!(added
        .iter()
        .all(|&i| with_grain.field().orientation_at(i) == o));

    let healed = with_grain.heal(&HealingConfig::default()).unwrap();
    assert_eq!(healed.labels(), vec![0, 1, 2, 3]);
}

#[test]
fn test_tensor_selection_errors() {
    let map = synthetic_map(11);
    assert_eq!(
        map.fabric(&SampleSelection::Grain(42)).unwrap_err(),
        FabricError::UnknownGrain(42)
    );
    let everything_filtered = map.filter(100.0);
    assert!(matches!(
        everything_filtered.fabric(&SampleSelection::All),
        Err(FabricError::EmptySampleSet { .. })
    ));
    let picked = map.grain_orientations(&[(0.01, 0.79), (1.19, 0.01)]).unwrap();
    assert!(picked.iter().all(Orientation::is_defined));
}
