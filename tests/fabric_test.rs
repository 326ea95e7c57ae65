//! Statistical checks of the tensor and misorientation code on random
//! fabrics, and loading an analyser export from disk.

use std::f64::consts::{FRAC_PI_2, TAU};
use std::io::Write;

use icefabric::tensor::analyze_orientations;
use icefabric::{
    load_fabric_map, misorientation_deg, save_profile_csv, FabricMap, Grid, Orientation,
    OrientationField, ProfileConfig, SampleSelection, Vector3,
};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rand_distr::{Distribution, Normal};

fn random_unit(rng: &mut StdRng) -> Vector3 {
    // uniform on the sphere
    let z: f64 = rng.random_range(-1.0..1.0);
    let az: f64 = rng.random::<f64>() * TAU;
    let r = (1.0 - z * z).sqrt();
    Vector3::new(r * az.cos(), r * az.sin(), z)
}

#[test]
fn test_misorientation_properties_random() {
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..1000 {
        let v = random_unit(&mut rng);
        let w = random_unit(&mut rng);
        let a = misorientation_deg(&v, &w);
        assert!((0.0..=90.0).contains(&a));
        assert!((a - misorientation_deg(&v, &-w)).abs() < 1e-9);
        assert!((a - misorientation_deg(&-v, &w)).abs() < 1e-9);
        assert!((a - misorientation_deg(&w, &v)).abs() < 1e-12);
        assert!(misorientation_deg(&v, &v) < 1e-5);
    }
}

#[test]
fn test_horizontal_girdle() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
    let mut rng = StdRng::seed_from_u64(5);
    let orientations: Vec<Orientation> = (0..20_000)
        .map(|_| Orientation::new(rng.random::<f64>() * TAU, FRAC_PI_2))
        .collect();
    let eig = analyze_orientations(&orientations).unwrap();
    let sorted = eig.sorted_descending();
    println!("Girdle eigenvalues: {:?}", sorted.map(|p| p.0));
    assert!((sorted[0].0 - 0.5).abs() < 0.02);
    assert!((sorted[1].0 - 0.5).abs() < 0.02);
    assert!(sorted[2].0 < 1e-9);
    // the girdle normal is vertical
    assert!(sorted[2].1.z.abs() > 1.0 - 1e-9);
}

#[test]
fn test_noisy_single_maximum_on_map() {
    let mut rng = StdRng::seed_from_u64(23);
    let tilt = Normal::new(0.0, 10f64.to_radians()).unwrap();
    let (rows, cols) = (50, 50);
    let n = rows * cols;
    let mut phi1 = Vec::with_capacity(n);
    let mut phi = Vec::with_capacity(n);
    for _ in 0..n {
        let t: f64 = tilt.sample(&mut rng);
        phi1.push(rng.random::<f64>() * TAU);
        phi.push(t.abs());
    }
    let field = OrientationField::from_vecs(rows, cols, 0.01, phi1, phi, vec![90.0; n]).unwrap();
    let mask = Grid::filled(rows, cols, 0.01, false).unwrap();
    let map = FabricMap::with_default_labeler(field, mask).unwrap();
    assert_eq!(map.grains().labels(), vec![0]);

    let eig = map.fabric(&SampleSelection::All).unwrap();
    let sorted = eig.sorted_descending();
    println!("Single maximum eigenvalues: {:?}", sorted.map(|p| p.0));
    assert!((eig.trace() - 1.0).abs() < 1e-9);
    assert!(sorted[0].0 > 0.9);
    assert!((sorted[1].0 - sorted[2].0).abs() < 0.02, "cone should be symmetric");
    assert!(sorted[0].1.z > 0.99);
}

fn write_aita5col(path: &std::path::Path, nx: usize, ny: usize) {
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(f, "G50 Fabric Analyser").unwrap();
    for _ in 1..5 {
        writeln!(f, "#").unwrap();
    }
    writeln!(f, "Pixelsize:50 um").unwrap();
    for _ in 6..14 {
        writeln!(f, "#").unwrap();
    }
    writeln!(f, "Width:   {nx:>4}").unwrap();
    writeln!(f, "Height:  {ny:>4}").unwrap();
    for _ in 16..19 {
        writeln!(f, "#").unwrap();
    }
    for y in 0..ny {
        for x in 0..nx {
            // azimuth steps by 10° along x, colatitude 30° everywhere
            writeln!(f, "{x} {y} {} 30.0 0 {}", 10 * x, 60 + y).unwrap();
        }
    }
    writeln!(f, "[eof]").unwrap();
}

#[test]
fn test_load_from_disk_and_save_profile() {
    let dir = std::env::temp_dir().join(format!("icefabric_load_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let data = dir.join("orientation.dat");
    write_aita5col(&data, 12, 4);

    let map = load_fabric_map(&data, None).unwrap();
    assert_eq!(map.shape(), (4, 12));
    assert!((map.resolution() - 0.05).abs() < 1e-15);
    assert_eq!(map.grains().labels(), vec![0]);
    assert_eq!(*map.field().quality.get(3, 0), 63.0);

    // consecutive pixels differ by 10° of azimuth at 30° tilt
    let profile = map
        .profile((0.0, 0.1), (0.57, 0.1), &ProfileConfig::default())
        .unwrap();
    assert_eq!(profile.len(), 11);
    let expected = {
        let a = Orientation::new(0.0, 30f64.to_radians())
            .caxis(Default::default())
            .unwrap();
        let b = Orientation::new(10f64.to_radians(), 30f64.to_radians())
            .caxis(Default::default())
            .unwrap();
        misorientation_deg(&a, &b)
    };
    assert!(profile.mis2p[1..].iter().all(|m| (m - expected).abs() < 1e-9));

    let csv_path = dir.join("profile.csv");
    save_profile_csv(&csv_path, &profile).unwrap();
    let mut rdr = csv::Reader::from_path(&csv_path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["x", "mis2o", "mis2p", "row", "col"]);
    let records: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 11);
    assert_eq!(&records[10][4], "10");

    let missing = load_fabric_map(dir.join("nope.dat"), None).unwrap_err();
    assert!(format!("{missing:#}").contains("nope.dat"));

    let _ = std::fs::remove_dir_all(&dir);
}
