//! Owned row-major 2-D grid carrying a scalar spatial resolution.
//!
//! Row 0 is the top row of the array. Physical coordinates used by the
//! analysis (crop corners, profile endpoints, picked points) measure `y`
//! upwards from the bottom row, so conversions go through
//! [`Grid::pixel_from_physical`].

use crate::error::{FabricError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T> {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Physical size of one pixel (mm for AITA data).
    pub resolution: f64,
    /// Backing storage, `rows * cols` values in row-major order.
    pub data: Vec<T>,
}

/// Validate a spatial step.
pub(crate) fn check_resolution(resolution: f64) -> Result<()> {
    if resolution.is_finite() && resolution > 0.0 {
        Ok(())
    } else {
        Err(FabricError::InvalidResolution(resolution))
    }
}

impl<T: Clone> Grid<T> {
    /// Wrap a row-major buffer.
    pub fn new(rows: usize, cols: usize, resolution: f64, data: Vec<T>) -> Result<Self> {
        check_resolution(resolution)?;
        if data.len() != rows * cols {
            return Err(FabricError::ShapeMismatch {
                expected: (rows, cols),
                found: (data.len() / cols.max(1), cols),
            });
        }
        Ok(Self {
            rows,
            cols,
            resolution,
            data,
        })
    }

    /// A grid with every pixel set to `value`.
    pub fn filled(rows: usize, cols: usize, resolution: f64, value: T) -> Result<Self> {
        Self::new(rows, cols, resolution, vec![value; rows * cols])
    }

    /// Build from a nested row vector. All rows must share the same length.
    pub fn from_rows(rows: Vec<Vec<T>>, resolution: f64) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != n_cols) {
            return Err(FabricError::ShapeMismatch {
                expected: (n_rows, n_cols),
                found: (n_rows, bad.len()),
            });
        }
        Self::new(n_rows, n_cols, resolution, rows.into_iter().flatten().collect())
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// (row, col) of a linear index.
    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize) {
        (idx / self.cols, idx % self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.data[self.idx(row, col)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        let i = self.idx(row, col);
        self.data[i] = value;
    }

    /// Checked access for coordinates that come from outside the crate.
    pub fn try_get(&self, row: isize, col: isize) -> Result<&T> {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return Err(FabricError::OutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(self.get(row as usize, col as usize))
    }

    /// Fail with [`FabricError::ShapeMismatch`] unless `other` has this shape.
    pub fn ensure_same_shape<U>(&self, other: &Grid<U>) -> Result<()> {
        if self.shape() != (other.rows, other.cols) {
            return Err(FabricError::ShapeMismatch {
                expected: self.shape(),
                found: (other.rows, other.cols),
            });
        }
        Ok(())
    }

    /// Apply `f` to every value, keeping shape and resolution.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            resolution: self.resolution,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Left-right mirror (column order reversed).
    pub fn fliplr(&self) -> Self {
        let mut data = Vec::with_capacity(self.len());
        for row in self.data.chunks(self.cols.max(1)) {
            data.extend(row.iter().rev().cloned());
        }
        Self {
            data,
            ..self.clone_meta()
        }
    }

    /// Up-down mirror (row order reversed).
    pub fn flipud(&self) -> Self {
        let mut data = Vec::with_capacity(self.len());
        for row in self.data.chunks(self.cols.max(1)).rev() {
            data.extend(row.iter().cloned());
        }
        Self {
            data,
            ..self.clone_meta()
        }
    }

    /// 180° rotation (both axes reversed).
    pub fn rot180(&self) -> Self {
        Self {
            data: self.data.iter().rev().cloned().collect(),
            ..self.clone_meta()
        }
    }

    /// Sub-grid `rows.start..rows.end` × `cols.start..cols.end` (clamped).
    pub fn crop(&self, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> Self {
        let r1 = rows.end.min(self.rows);
        let c1 = cols.end.min(self.cols);
        let r0 = rows.start.min(r1);
        let c0 = cols.start.min(c1);
        let mut data = Vec::with_capacity((r1 - r0) * (c1 - c0));
        for r in r0..r1 {
            let start = self.idx(r, c0);
            data.extend_from_slice(&self.data[start..start + (c1 - c0)]);
        }
        Self {
            rows: r1 - r0,
            cols: c1 - c0,
            resolution: self.resolution,
            data,
        }
    }

    /// Nearest-neighbour resampling to a new pixel size.
    ///
    /// The grid keeps its physical extent: each axis gets
    /// `round(n * resolution / new)` pixels (at least one), and every new
    /// pixel takes the value of the old pixel under its centre.
    pub fn resize(&self, resolution: f64) -> Result<Self> {
        check_resolution(resolution)?;
        if self.is_empty() {
            return Err(FabricError::EmptySampleSet {
                context: "resize of an empty grid".to_string(),
            });
        }
        let scale = self.resolution / resolution;
        let rows = ((self.rows as f64 * scale).round() as usize).max(1);
        let cols = ((self.cols as f64 * scale).round() as usize).max(1);
        let source = |i: usize, new: usize, old: usize| {
            (((i as f64 + 0.5) * old as f64 / new as f64) as usize).min(old - 1)
        };
        let src_cols: Vec<usize> = (0..cols).map(|c| source(c, cols, self.cols)).collect();
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            let sr = source(r, rows, self.rows);
            data.extend(src_cols.iter().map(|&sc| self.get(sr, sc).clone()));
        }
        Ok(Self {
            rows,
            cols,
            resolution,
            data,
        })
    }

    /// Convert physical coordinates (x right, y up from the bottom edge) to
    /// fractional pixel coordinates `(row_from_bottom, col)`.
    #[inline]
    pub fn pixel_from_physical(&self, x: f64, y: f64) -> (f64, f64) {
        (y / self.resolution, x / self.resolution)
    }

    fn clone_meta(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            resolution: self.resolution,
            data: Vec::new(),
        }
    }
}

impl<T> Grid<T> {
    /// Same shape and resolution, different contents. `data` must hold
    /// `rows * cols` values.
    pub(crate) fn with_data<U>(&self, data: Vec<U>) -> Grid<U> {
        debug_assert_eq!(data.len(), self.rows * self.cols);
        Grid {
            rows: self.rows,
            cols: self.cols,
            resolution: self.resolution,
            data,
        }
    }
}

impl Grid<bool> {
    /// Binary dilation with the 4-neighbour cross, repeated `iterations`
    /// times. Pixels outside the grid count as `false`.
    pub fn dilate(&self, iterations: usize) -> Self {
        let mut current = self.clone();
        for _ in 0..iterations {
            let prev = &current.data;
            let data: Vec<bool> = (0..self.len())
                .map(|i| {
                    let (r, c) = self.coords(i);
                    prev[i]
                        || (r > 0 && prev[i - self.cols])
                        || (r + 1 < self.rows && prev[i + self.cols])
                        || (c > 0 && prev[i - 1])
                        || (c + 1 < self.cols && prev[i + 1])
                })
                .collect();
            current = self.with_data(data);
        }
        current
    }
}
