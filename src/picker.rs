//! Coordinate acquisition for operations that need user-chosen points.
//!
//! Crop corners, profile endpoints, triangle vertices and query points are
//! supplied by a [`PointPicker`]. A GUI front-end implements it with mouse
//! clicks; scripts and tests use [`FixedPoints`].

use std::collections::VecDeque;

use anyhow::bail;

/// Source of points in physical units (x to the right, y up from the bottom
/// edge of the map).
pub trait PointPicker {
    /// Return exactly `count` points, or fail.
    fn pick(&mut self, count: usize) -> anyhow::Result<Vec<(f64, f64)>>;
}

/// Hands out a predetermined queue of points in order.
#[derive(Debug, Clone, Default)]
pub struct FixedPoints {
    queue: VecDeque<(f64, f64)>,
}

impl FixedPoints {
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>) -> Self {
        Self {
            queue: points.into_iter().collect(),
        }
    }

    /// Points not handed out yet.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl PointPicker for FixedPoints {
    fn pick(&mut self, count: usize) -> anyhow::Result<Vec<(f64, f64)>> {
        if self.queue.len() < count {
            bail!(
                "requested {count} point(s) but only {} remain",
                self.queue.len()
            );
        }
        Ok(self.queue.drain(..count).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_points_in_order() {
        let mut picker = FixedPoints::new([(0.0, 1.0), (2.0, 3.0), (4.0, 5.0)]);
        assert_eq!(picker.pick(2).unwrap(), vec![(0.0, 1.0), (2.0, 3.0)]);
        assert_eq!(picker.remaining(), 1);
        assert!(picker.pick(2).is_err());
        assert_eq!(picker.pick(1).unwrap(), vec![(4.0, 5.0)]);
    }
}
