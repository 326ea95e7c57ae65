//! Reading AITA analyser output and boundary bitmaps.
//!
//! The `cistodat` export of the G50 analyser is a text file with a fixed
//! 19-line header followed by one whitespace-separated row per pixel:
//!
//! ```text
//! x  y  azimuth  colatitude  <unused>  quality
//! ```
//!
//! Angles are in degrees. The analyser measures azimuth from a frame rotated
//! by 90° with respect to the Bunge `phi1`, hence `phi1 = (azimuth + 90°) mod 360°`.

use std::path::Path;

use anyhow::{bail, ensure, Context};
use tracing::info;

use crate::grid::Grid;
use crate::orientation::{wrap_tau, OrientationField};
use crate::session::FabricMap;

/// Header lines before the first data row.
const HEADER_LINES: usize = 19;

/// Everything from this marker to the end of a line is ignored.
const EOF_MARKER: &str = "[eof]";

/// Grid size and resolution read from the header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aita5ColHeader {
    /// Pixel size in mm.
    pub resolution: f64,
    pub nx: usize,
    pub ny: usize,
}

fn header_field<T: std::str::FromStr>(
    lines: &[&str],
    line: usize,
    cols: std::ops::Range<usize>,
    what: &str,
) -> anyhow::Result<T> {
    let text = lines
        .get(line)
        .with_context(|| format!("header too short: no line {} for {what}", line + 1))?;
    let raw = text
        .get(cols.clone())
        .or_else(|| text.get(cols.start..))
        .with_context(|| format!("header line {} too short for {what}", line + 1))?;
    raw.trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("bad {what} {raw:?} on header line {}", line + 1))
}

/// Parse the resolution (µm, converted to mm) and grid size from the header.
pub fn parse_aita5col_header(text: &str) -> anyhow::Result<Aita5ColHeader> {
    let lines: Vec<&str> = text.lines().take(16).collect();
    let micron: u32 = header_field(&lines, 5, 10..12, "resolution")?;
    let nx: usize = header_field(&lines, 14, 9..13, "nx")?;
    let ny: usize = header_field(&lines, 15, 9..13, "ny")?;
    ensure!(micron > 0, "resolution must be positive");
    Ok(Aita5ColHeader {
        resolution: micron as f64 / 1000.0,
        nx,
        ny,
    })
}

/// Parse a complete `cistodat` 5-column export.
pub fn parse_aita5col(text: &str) -> anyhow::Result<OrientationField> {
    let header = parse_aita5col_header(text)?;
    let n = header.nx * header.ny;
    let mut phi1 = Vec::with_capacity(n);
    let mut phi = Vec::with_capacity(n);
    let mut quality = Vec::with_capacity(n);

    for (k, line) in text.lines().enumerate().skip(HEADER_LINES) {
        let line = line.split(EOF_MARKER).next().unwrap_or_default();
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 6 {
            bail!("line {}: expected 6 columns, found {}", k + 1, cols.len());
        }
        let parse = |i: usize| -> anyhow::Result<f64> {
            cols[i]
                .parse::<f64>()
                .with_context(|| format!("line {}: bad value {:?} in column {i}", k + 1, cols[i]))
        };
        phi1.push(wrap_tau((parse(2)? + 90.0).to_radians()));
        phi.push(parse(3)?.to_radians());
        quality.push(parse(5)?);
    }

    ensure!(
        phi1.len() == n,
        "header announces {}x{} = {n} pixels but {} data rows were read",
        header.nx,
        header.ny,
        phi1.len()
    );
    let field = OrientationField::from_vecs(header.ny, header.nx, header.resolution, phi1, phi, quality)?;
    info!(
        nx = header.nx,
        ny = header.ny,
        resolution_mm = header.resolution,
        "AITA map parsed"
    );
    Ok(field)
}

/// Read a `cistodat` export from disk.
pub fn load_aita5col(path: impl AsRef<Path>) -> anyhow::Result<OrientationField> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read AITA file: {}", path.display()))?;
    parse_aita5col(&text).with_context(|| format!("Failed to parse AITA file: {}", path.display()))
}

/// Mask with no boundary pixel, used when no bitmap is available.
pub fn interior_mask(field: &OrientationField) -> Grid<bool> {
    field.phi1.map(|_| false)
}

/// Boundary mask from an image: channel 0 scaled by the image maximum, with
/// values of at least one half marking the boundary.
#[cfg(feature = "image")]
pub fn mask_from_image(img: &image::DynamicImage, resolution: f64) -> anyhow::Result<Grid<bool>> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let max = rgb.as_raw().iter().copied().max().unwrap_or(0);
    let data: Vec<bool> = rgb
        .pixels()
        .map(|p| max > 0 && p.0[0] as f64 / max as f64 >= 0.5)
        .collect();
    Ok(Grid::new(height as usize, width as usize, resolution, data)?)
}

/// Read a boundary bitmap (white boundaries on a black background).
#[cfg(feature = "image")]
pub fn load_boundary_mask(path: impl AsRef<Path>, resolution: f64) -> anyhow::Result<Grid<bool>> {
    let path = path.as_ref();
    let img = image::open(path)
        .with_context(|| format!("Failed to open image: {}", path.display()))?;
    mask_from_image(&img, resolution)
}

/// Load a data file and, if given, its boundary bitmap into a session.
/// Without a bitmap every pixel is interior.
pub fn load_fabric_map(data: impl AsRef<Path>, micro: Option<&Path>) -> anyhow::Result<FabricMap> {
    let field = load_aita5col(data)?;
    let mask = match micro {
        #[cfg(feature = "image")]
        Some(path) => load_boundary_mask(path, field.resolution())?,
        #[cfg(not(feature = "image"))]
        Some(path) => bail!(
            "cannot read boundary bitmap {}: built without the `image` feature",
            path.display()
        ),
        None => interior_mask(&field),
    };
    Ok(FabricMap::with_default_labeler(field, mask)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 3×2 export with the same header layout as the analyser's.
    fn sample_file() -> String {
        let mut s = String::new();
        s.push_str("G50 Fabric Analyser\n");
        s.push_str("cistodat v2\n");
        s.push_str("sample: test\n");
        s.push_str("\n\n");
        s.push_str("Pixelsize:20 um\n");
        for _ in 6..14 {
            s.push_str("#\n");
        }
        s.push_str("Width:    3\n");
        s.push_str("Height:   2\n");
        for _ in 16..19 {
            s.push_str("#\n");
        }
        let rows = [
            "0 0 0.0 10.0 0 95",
            "1 0 90.0 20.0 0 90",
            "2 0 270.0 30.0 0 85",
            "0 1 180.0 40.0 0 40",
            "1 1 45.0 50.0 0 75",
            "2 1 -90.0 60.0 0 70",
        ];
        for r in rows {
            s.push_str(r);
            s.push('\n');
        }
        s.push_str("[eof]\n");
        s
    }

    #[test]
    fn test_header() {
        let h = parse_aita5col_header(&sample_file()).unwrap();
        assert_eq!(h.nx, 3);
        assert_eq!(h.ny, 2);
        assert!((h.resolution - 0.02).abs() < 1e-15);
    }

    #[test]
    fn test_parse_converts_angles() {
        let f = parse_aita5col(&sample_file()).unwrap();
        assert_eq!(f.shape(), (2, 3));
        let tau = std::f64::consts::TAU;
        assert!((f.phi1.get(0, 0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((f.phi1.get(0, 1) - std::f64::consts::PI).abs() < 1e-12);
        // 270 + 90 wraps to 0
        assert!(f.phi1.get(0, 2).abs() < 1e-12 || (f.phi1.get(0, 2) - tau).abs() < 1e-12);
        assert!(f.phi1.get(1, 2).abs() < 1e-12);
        assert!((f.phi.get(1, 0) - 40f64.to_radians()).abs() < 1e-12);
        assert_eq!(*f.quality.get(1, 0), 40.0);
        assert!(f.phi1.data.iter().all(|&a| (0.0..tau).contains(&a)));
    }

    #[test]
    fn test_row_count_mismatch() {
        let text = sample_file().replace("2 1 -90.0 60.0 0 70\n", "");
        let err = parse_aita5col(&text).unwrap_err();
        assert!(err.to_string().contains("5 data rows"));
    }

    #[test]
    fn test_bad_value_reports_line() {
        let text = sample_file().replace("1 1 45.0", "1 1 abc");
        let err = parse_aita5col(&text).unwrap_err();
        assert!(format!("{err:#}").contains("line 24"));
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_mask_from_image() {
        let mut img = image::RgbImage::new(3, 2);
        img.put_pixel(1, 0, image::Rgb([255, 255, 255]));
        img.put_pixel(1, 1, image::Rgb([200, 200, 200]));
        img.put_pixel(2, 1, image::Rgb([20, 20, 20]));
        let mask = mask_from_image(&image::DynamicImage::ImageRgb8(img), 0.02).unwrap();
        assert_eq!(mask.shape(), (2, 3));
        assert_eq!(mask.data, vec![false, true, false, false, true, false]);
    }
}
