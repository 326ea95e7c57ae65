//! Grain label fields and the labeling collaborator.
//!
//! A [`GrainField`] assigns an integer label to every interior pixel and
//! `None` to every grain-boundary pixel. Labels come from a [`GrainLabeler`];
//! the crate ships [`ConnectedComponentLabeler`], a two-pass union-find over
//! the interior of the boundary mask, but any segmentation can be injected.
//!
//! Labels are stable identifiers for one analysis. They are not guaranteed to
//! be contiguous (a crop can remove whole grains), so consumers iterate over
//! [`GrainField::labels`] instead of `0..=max_label`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::error::{FabricError, Result};
use crate::grid::Grid;

/// Produces a label field from a boundary mask (`true` = boundary).
///
/// Implementations must return a grid of the mask's shape; boundary pixels
/// are forced to `None` by [`GrainField::from_mask`] whatever the labeler
/// returns for them.
pub trait GrainLabeler {
    fn label(&self, mask: &Grid<bool>) -> Grid<Option<u32>>;
}

/// Configuration for [`ConnectedComponentLabeler`].
#[derive(Debug, Clone)]
pub struct LabelingConfig {
    /// Whether to use 8-connectivity (true) or 4-connectivity (false).
    /// One-pixel-wide boundaries only separate grains under 4-connectivity.
    /// Default: false
    pub use_8_connectivity: bool,

    /// Label given to the first grain found in raster order.
    /// Default: 0
    pub first_label: u32,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            use_8_connectivity: false,
            first_label: 0,
        }
    }
}

/// Connected-component labeling of the interior (non-boundary) pixels.
#[derive(Debug, Clone, Default)]
pub struct ConnectedComponentLabeler {
    pub config: LabelingConfig,
}

impl ConnectedComponentLabeler {
    pub fn new(config: LabelingConfig) -> Self {
        Self { config }
    }
}

impl GrainLabeler for ConnectedComponentLabeler {
    fn label(&self, mask: &Grid<bool>) -> Grid<Option<u32>> {
        label_interior(mask, self.config.use_8_connectivity, self.config.first_label)
    }
}

/// Provisional-label forest for the two-pass labeling.
struct Forest {
    parent: Vec<usize>,
}

impl Forest {
    fn make(&mut self) -> usize {
        self.parent.push(self.parent.len());
        self.parent.len() - 1
    }

    fn root(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Attach the larger root under the smaller one.
    fn join(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.root(a), self.root(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}

/// Label the connected interior (`false`) regions of a boundary mask.
///
/// Grains are numbered from `first_label` in raster order of their first
/// pixel; boundary pixels get `None`.
fn label_interior(
    mask: &Grid<bool>,
    use_8_connectivity: bool,
    first_label: u32,
) -> Grid<Option<u32>> {
    let (rows, cols) = mask.shape();
    let mut provisional: Vec<Option<usize>> = vec![None; rows * cols];
    let mut forest = Forest { parent: Vec::new() };

    for row in 0..rows {
        for col in 0..cols {
            let idx = row * cols + col;
            if mask.data[idx] {
                continue;
            }
            // already-visited neighbours: left, up, and the two upper diagonals
            let mut seen = [None; 4];
            if col > 0 {
                seen[0] = provisional[idx - 1];
            }
            if row > 0 {
                seen[1] = provisional[idx - cols];
                if use_8_connectivity {
                    if col > 0 {
                        seen[2] = provisional[idx - cols - 1];
                    }
                    if col + 1 < cols {
                        seen[3] = provisional[idx - cols + 1];
                    }
                }
            }

            let smallest = seen.iter().flatten().min().copied();
            let own = smallest.unwrap_or_else(|| forest.make());
            for &other in seen.iter().flatten() {
                forest.join(own, other);
            }
            provisional[idx] = Some(own);
        }
    }

    let mut grain_of_root: HashMap<usize, u32> = HashMap::new();
    let mut next = first_label;
    let labels: Vec<Option<u32>> = provisional
        .into_iter()
        .map(|p| {
            p.map(|l| {
                let root = forest.root(l);
                *grain_of_root.entry(root).or_insert_with(|| {
                    next += 1;
                    next - 1
                })
            })
        })
        .collect();
    mask.with_data(labels)
}

/// Grain label per pixel; `None` marks a grain-boundary pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct GrainField {
    pub labels: Grid<Option<u32>>,
}

impl GrainField {
    /// Wrap an existing label grid.
    pub fn from_labels(labels: Grid<Option<u32>>) -> Self {
        Self { labels }
    }

    /// Label the interior of `mask` with `labeler`. Boundary pixels are always
    /// undefined, and a labeler returning the wrong shape is rejected.
    pub fn from_mask(mask: &Grid<bool>, labeler: &dyn GrainLabeler) -> Result<Self> {
        let mut labels = labeler.label(mask);
        mask.ensure_same_shape(&labels)?;
        labels.resolution = mask.resolution;
        for (l, &is_boundary) in labels.data.iter_mut().zip(mask.data.iter()) {
            if is_boundary {
                *l = None;
            }
        }
        let field = Self { labels };
        debug!(
            grains = field.labels().len(),
            boundary = field.undefined_count(),
            "grain field built"
        );
        Ok(field)
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.labels.shape()
    }

    #[inline]
    pub fn label(&self, row: usize, col: usize) -> Option<u32> {
        *self.labels.get(row, col)
    }

    /// Distinct labels present, ascending.
    pub fn labels(&self) -> Vec<u32> {
        self.labels
            .data
            .iter()
            .flatten()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn max_label(&self) -> Option<u32> {
        self.labels.data.iter().flatten().copied().max()
    }

    /// Linear pixel indices carrying `label`, in raster order.
    pub fn pixels_of(&self, label: u32) -> Vec<usize> {
        self.labels
            .data
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| (l == Some(label)).then_some(i))
            .collect()
    }

    /// Like [`pixels_of`](Self::pixels_of) but fails for a label no pixel has.
    pub fn require_pixels_of(&self, label: u32) -> Result<Vec<usize>> {
        let pixels = self.pixels_of(label);
        if pixels.is_empty() {
            return Err(FabricError::UnknownGrain(label));
        }
        Ok(pixels)
    }

    /// Every label with its pixel indices, built in one scan.
    pub fn grain_index(&self) -> BTreeMap<u32, Vec<usize>> {
        let mut index: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, l) in self.labels.data.iter().enumerate() {
            if let Some(l) = l {
                index.entry(*l).or_default().push(i);
            }
        }
        index
    }

    /// Number of boundary (undefined) pixels.
    pub fn undefined_count(&self) -> usize {
        self.labels.data.iter().filter(|l| l.is_none()).count()
    }

    pub fn fliplr(&self) -> Self {
        Self {
            labels: self.labels.fliplr(),
        }
    }

    pub fn rot180(&self) -> Self {
        Self {
            labels: self.labels.rot180(),
        }
    }

    pub fn crop(&self, rows: std::ops::Range<usize>, cols: std::ops::Range<usize>) -> Self {
        Self {
            labels: self.labels.crop(rows, cols),
        }
    }
}
