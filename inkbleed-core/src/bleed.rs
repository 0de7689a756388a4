//! Bleed memory: how far pigment has already escaped at each location.
//!
//! Fill growth reads the live grid and writes a staging grid. Staged values only become visible
//! to later reads after an explicit [`BleedField::update`].

use crate::field::FieldGrid;
use crate::util::Point;

/// Applied to the staging grid on every commit.
pub const DECAY: f32 = 0.75;

#[derive(Clone, Debug, PartialEq)]
pub struct BleedField {
    live: FieldGrid,
    staging: FieldGrid,
}

/// A deep copy of both grids, for scoped save/restore.
#[derive(Clone, Debug, PartialEq)]
pub struct BleedSnapshot {
    live: FieldGrid,
    staging: FieldGrid,
}

impl BleedField {
    /// A zeroed bleed field of the same shape as a flow field grid.
    #[must_use]
    pub fn new(shape: &FieldGrid) -> Self {
        Self {
            live: shape.blank(),
            staging: shape.blank(),
        }
    }
    /// Remembered bleed at a canvas position, `0.0` outside the grid.
    ///
    /// When `value` is given it is also staged, keeping the running maximum, and the larger of
    /// the remembered and given values is returned.
    pub fn get(&mut self, point: Point, value: Option<f32>) -> f32 {
        if !point.is_finite() {
            return 0.0;
        }
        let (column, row) = self.live.cell_of(point);
        self.cell(column, row, value)
    }
    /// As [`Self::get`], by grid cell.
    pub fn cell(&mut self, column: isize, row: isize, value: Option<f32>) -> f32 {
        let current = self.live.get(column, row);
        match value {
            Some(value) => {
                let staged = self.staging.get(column, row);
                if !self.staging.set(column, row, staged.max(value)) {
                    return 0.0;
                }
                current.max(value)
            }
            None => current,
        }
    }
    /// Remembered bleed without staging anything.
    #[must_use]
    pub fn peek(&self, point: Point) -> f32 {
        self.live.at(point)
    }
    /// Commit staged values into the live grid, then decay the staging grid.
    pub fn update(&mut self) {
        self.live.cells_mut().copy_from_slice(self.staging.cells());
        for cell in self.staging.cells_mut() {
            *cell *= DECAY;
        }
    }
    #[must_use]
    pub fn save(&self) -> BleedSnapshot {
        BleedSnapshot {
            live: self.live.clone(),
            staging: self.staging.clone(),
        }
    }
    pub fn restore(&mut self, snapshot: BleedSnapshot) {
        self.live = snapshot.live;
        self.staging = snapshot.staging;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::DEFAULT_RESOLUTION;

    fn field() -> BleedField {
        BleedField::new(&FieldGrid::for_canvas(100.0, 100.0, DEFAULT_RESOLUTION))
    }
    #[test]
    fn out_of_range_is_zero() {
        let mut bleed = field();
        assert_eq!(bleed.cell(-1, 0, None), 0.0);
        assert_eq!(bleed.cell(0, 1_000_000, Some(5.0)), 0.0);
        assert_eq!(bleed.get(Point::new(10_000.0, 0.0), Some(1.0)), 0.0);
        assert_eq!(bleed.get(Point::new(f32::INFINITY, 0.0), None), 0.0);
    }
    #[test]
    fn staging_needs_commit() {
        let mut bleed = field();
        let p = Point::new(50.0, 50.0);
        assert_eq!(bleed.get(p, Some(0.4)), 0.4);
        assert_eq!(bleed.get(p, Some(0.2)), 0.2);
        // Not committed yet.
        assert_eq!(bleed.peek(p), 0.0);
        bleed.update();
        assert!((bleed.peek(p) - 0.4).abs() < 1e-6);
        // Staging decays, live keeps the committed max until the next commit.
        bleed.update();
        assert!((bleed.peek(p) - 0.4 * DECAY).abs() < 1e-6);
    }
    #[test]
    fn save_restore_round_trip() {
        let mut bleed = field();
        bleed.get(Point::new(10.0, 10.0), Some(0.3));
        bleed.update();
        let before = bleed.clone();
        let snapshot = bleed.save();
        bleed.get(Point::new(20.0, 20.0), Some(0.9));
        bleed.update();
        assert_ne!(bleed, before);
        bleed.restore(snapshot);
        assert_eq!(bleed, before);
    }
}
