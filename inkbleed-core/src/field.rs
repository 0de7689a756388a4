//! # Flow fields
//!
//! A coarse grid of direction angles that deflects stroke headings. Fields are produced by named
//! generators, pure functions of `(time, previous grid)`, and one of them may be active at a time.
//!
//! The grid covers twice the canvas extent in each axis, centered on the canvas, so translated or
//! rotated drawing still resolves to valid cells.

use crate::random::{Noise, Random};
use crate::util::Point;

/// Generates the contents of a field at some time, given the previous contents.
pub type Generator = Box<dyn Fn(f32, FieldGrid) -> FieldGrid + Send + Sync>;

/// Default cell size, as a fraction of canvas width.
pub const DEFAULT_RESOLUTION: f32 = 0.01;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("no flow field named {0:?}")]
    NotFound(String),
}

/// A 2D array of angles, in degrees, laid over canvas space.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldGrid {
    columns: usize,
    rows: usize,
    resolution: f32,
    origin: Point,
    /// Column-major.
    cells: Vec<f32>,
}
impl FieldGrid {
    /// An all-zero grid covering a canvas of the given size with some margin.
    #[must_use]
    pub fn for_canvas(width: f32, height: f32, resolution_fraction: f32) -> Self {
        let resolution = (width * resolution_fraction).max(1.0);
        let origin = Point::new(-0.5 * width, -0.5 * height);
        let count =
            |extent: f32| az::saturating_cast::<f32, usize>((2.0 * extent / resolution).round());
        let columns = count(width).max(1);
        let rows = count(height).max(1);
        Self {
            columns,
            rows,
            resolution,
            origin,
            cells: vec![0.0; columns * rows],
        }
    }
    /// A zeroed grid of the same shape.
    #[must_use]
    pub fn blank(&self) -> Self {
        Self {
            cells: vec![0.0; self.cells.len()],
            ..*self
        }
    }
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }
    /// Side length of a cell, in pixels.
    #[must_use]
    pub fn resolution(&self) -> f32 {
        self.resolution
    }
    /// Canvas position of cell `(0, 0)`.
    #[must_use]
    pub fn origin(&self) -> Point {
        self.origin
    }
    fn index(&self, column: isize, row: isize) -> Option<usize> {
        let column = usize::try_from(column).ok()?;
        let row = usize::try_from(row).ok()?;
        (column < self.columns && row < self.rows).then_some(column * self.rows + row)
    }
    /// The value at a cell, or `0.0` for any cell outside the grid.
    #[must_use]
    pub fn get(&self, column: isize, row: isize) -> f32 {
        self.index(column, row).map_or(0.0, |i| self.cells[i])
    }
    /// Returns `false` if the cell is outside the grid.
    pub fn set(&mut self, column: isize, row: isize, value: f32) -> bool {
        match self.index(column, row) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }
    /// Grid cell containing a canvas position, which may be out of range.
    #[must_use]
    pub fn cell_of(&self, point: Point) -> (isize, isize) {
        let to_cell = |coord: f32, origin: f32| {
            let cell = ((coord - origin) / self.resolution).round();
            if cell.is_nan() {
                isize::MIN
            } else {
                az::saturating_cast::<f32, isize>(cell)
            }
        };
        (to_cell(point.x, self.origin.x), to_cell(point.y, self.origin.y))
    }
    /// Value at the cell containing a canvas position.
    #[must_use]
    pub fn at(&self, point: Point) -> f32 {
        if !point.is_finite() {
            return 0.0;
        }
        let (column, row) = self.cell_of(point);
        self.get(column, row)
    }
    /// Is the position within the area covered by this grid?
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (
            self.columns as f32 * self.resolution,
            self.rows as f32 * self.resolution,
        );
        point.x >= self.origin.x
            && point.y >= self.origin.y
            && point.x <= self.origin.x + w
            && point.y <= self.origin.y + h
    }
    /// Visit every cell mutably, with its `(column, row)`.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(usize, usize, &mut f32)) {
        let rows = self.rows;
        for (i, cell) in self.cells.iter_mut().enumerate() {
            f(i / rows, i % rows, cell);
        }
    }
    pub(crate) fn cells(&self) -> &[f32] {
        &self.cells
    }
    pub(crate) fn cells_mut(&mut self) -> &mut [f32] {
        &mut self.cells
    }
}

struct Active {
    name: String,
    grid: FieldGrid,
}

/// The set of named fields for one canvas, with at most one active.
pub struct FlowFields {
    template: FieldGrid,
    generators: hashbrown::HashMap<String, Generator>,
    active: Option<Active>,
    time: f32,
}
impl FlowFields {
    /// No fields registered.
    #[must_use]
    pub fn new(width: f32, height: f32, resolution_fraction: f32) -> Self {
        Self {
            template: FieldGrid::for_canvas(width, height, resolution_fraction),
            generators: hashbrown::HashMap::new(),
            active: None,
            time: 0.0,
        }
    }
    /// With the built-in fields registered, deterministic for a given seed.
    #[must_use]
    pub fn with_defaults(width: f32, height: f32, resolution_fraction: f32, seed: u64) -> Self {
        let mut this = Self::new(width, height, resolution_fraction);
        for (name, generator) in builtin::all(seed) {
            this.add_field(name, generator);
        }
        this
    }
    /// Register or replace a generator. If it is currently active it is regenerated.
    pub fn add_field(&mut self, name: impl Into<String>, generator: Generator) {
        let name = name.into();
        let regenerate = self.active.as_ref().is_some_and(|a| a.name == name);
        self.generators.insert(name.clone(), generator);
        if regenerate {
            // Just inserted, can't fail.
            let _ = self.activate(&name);
        }
    }
    /// Make a field active, generating it fresh at the current time.
    /// # Errors
    /// If no field is registered under `name`
    pub fn activate(&mut self, name: &str) -> Result<(), FieldError> {
        let generator = self
            .generators
            .get(name)
            .ok_or_else(|| FieldError::NotFound(name.to_owned()))?;
        let grid = generator(self.time, self.template.blank());
        log::trace!("activated flow field {name:?}");
        self.active = Some(Active {
            name: name.to_owned(),
            grid,
        });
        Ok(())
    }
    pub fn deactivate(&mut self) {
        self.active = None;
    }
    /// Advance time, regenerating the active field from its previous contents.
    pub fn refresh(&mut self, time: f32) {
        self.time = time;
        if let Some(active) = self.active.as_mut() {
            if let Some(generator) = self.generators.get(&active.name) {
                let previous = std::mem::replace(&mut active.grid, self.template.blank());
                active.grid = generator(time, previous);
            }
        }
    }
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }
    #[must_use]
    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.generators.keys().map(String::as_str)
    }
    /// Shape shared by every field of this canvas.
    #[must_use]
    pub fn grid(&self) -> &FieldGrid {
        self.active.as_ref().map_or(&self.template, |a| &a.grid)
    }
    /// Angle at a cell of the active field, `0.0` if out of range or none is active.
    #[must_use]
    pub fn sample(&self, column: isize, row: isize) -> f32 {
        self.active.as_ref().map_or(0.0, |a| a.grid.get(column, row))
    }
    /// Angle at a canvas position of the active field.
    #[must_use]
    pub fn angle_at(&self, point: Point) -> f32 {
        self.active.as_ref().map_or(0.0, |a| a.grid.at(point))
    }
    /// Containment box for stepping positions. The same margin box is used whether or not a
    /// field is active.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        self.template.contains(point)
    }
}

/// The stock fields.
mod builtin {
    use super::{FieldGrid, Generator, Noise, Random};

    /// Per-generation rng, so a given time always yields the same grid.
    fn rng_at(seed: u64, time: f32) -> Random {
        Random::new(seed ^ u64::from(time.to_bits()).rotate_left(17))
    }
    #[allow(clippy::cast_possible_truncation)]
    fn noise_at(seed: u64, time: f32) -> Noise {
        Noise::new((seed ^ u64::from(time.to_bits())) as u32)
    }
    #[allow(clippy::cast_precision_loss)]
    fn curved(seed: u64) -> Generator {
        Box::new(move |time: f32, mut grid: FieldGrid| {
            let mut rng = rng_at(seed, time);
            let noise = noise_at(seed, time);
            let mut range = rng.range(-25.0, -15.0);
            if rng.next() < 0.5 {
                range = -range;
            }
            grid.for_each_mut(|column, row, cell| {
                let n = noise.get(column as f32 * 0.02 + time * 0.1, row as f32 * 0.02);
                *cell = n * range * 2.0;
            });
            grid
        })
    }
    #[allow(clippy::cast_precision_loss)]
    fn truncated(seed: u64) -> Generator {
        Box::new(move |time: f32, mut grid: FieldGrid| {
            let mut rng = rng_at(seed, time);
            let noise = noise_at(seed, time);
            let range = rng.range(16.0, 20.0);
            let step = rng.range(8.0, 16.0);
            grid.for_each_mut(|column, row, cell| {
                let n = noise.get(column as f32 * 0.02, row as f32 * 0.02 + time * 0.1);
                *cell = (n * range * 3.0 / step).round() * step;
            });
            grid
        })
    }
    #[allow(clippy::cast_precision_loss)]
    fn zigzag(seed: u64) -> Generator {
        Box::new(move |time: f32, mut grid: FieldGrid| {
            let mut rng = rng_at(seed, time);
            let base = rng.range(-30.0, -15.0) + 22.0 * (time * 0.3).sin().abs();
            let band = 1 + az::saturating_cast::<f32, usize>(rng.range(2.0, 5.0));
            grid.for_each_mut(|column, row, cell| {
                let sign = if (row / band) % 2 == 0 { 1.0 } else { -1.0 };
                *cell = sign * (base + 6.0 * (time + column as f32 * 0.1).sin());
            });
            grid
        })
    }
    #[allow(clippy::cast_precision_loss)]
    fn waves(seed: u64) -> Generator {
        Box::new(move |time: f32, mut grid: FieldGrid| {
            let mut rng = rng_at(seed, time);
            let frequency = rng.range(0.02, 0.06);
            let amplitude = rng.range(20.0, 35.0);
            grid.for_each_mut(|column, row, cell| {
                let phase = time * 0.5;
                *cell = amplitude
                    * (column as f32 * frequency + phase).sin()
                    * (row as f32 * frequency * 0.8 + phase).cos();
            });
            grid
        })
    }
    #[allow(clippy::cast_precision_loss)]
    fn seabed(seed: u64) -> Generator {
        Box::new(move |time: f32, mut grid: FieldGrid| {
            let mut rng = rng_at(seed, time);
            let amplitude = rng.range(18.0, 28.0);
            let frequency = rng.range(0.04, 0.08);
            grid.for_each_mut(|column, row, cell| {
                let swell = (time * 0.4 + row as f32 * frequency).sin();
                *cell = amplitude * swell * (column as f32 * frequency * 0.25).sin();
            });
            grid
        })
    }
    /// A slight, fast tremor.
    #[allow(clippy::cast_precision_loss)]
    fn hand(seed: u64) -> Generator {
        Box::new(move |time: f32, mut grid: FieldGrid| {
            let mut rng = rng_at(seed, time);
            let noise = noise_at(seed, time);
            let amplitude = rng.range(2.0, 5.0);
            grid.for_each_mut(|column, row, cell| {
                let (c, r) = (column as f32, row as f32);
                *cell = amplitude * (c * 0.6 + time).sin() * (r * 0.45).cos()
                    + 2.0 * noise.get(c * 0.1, r * 0.1);
            });
            grid
        })
    }
    pub(super) fn all(seed: u64) -> [(&'static str, Generator); 6] {
        [
            ("curved", curved(seed)),
            ("truncated", truncated(seed)),
            ("zigzag", zigzag(seed)),
            ("waves", waves(seed)),
            ("seabed", seabed(seed)),
            ("hand", hand(seed)),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn grid_shape_covers_margin() {
        let grid = FieldGrid::for_canvas(400.0, 300.0, DEFAULT_RESOLUTION);
        assert!((grid.resolution() - 4.0).abs() < 1e-6);
        assert_eq!(grid.columns(), 200);
        assert_eq!(grid.rows(), 150);
        assert_eq!(grid.origin(), Point::new(-200.0, -150.0));
        assert!(grid.contains(Point::new(599.0, 449.0)));
        assert!(!grid.contains(Point::new(-201.0, 0.0)));
    }
    #[test]
    fn out_of_range_samples_are_zero() {
        let mut fields = FlowFields::with_defaults(200.0, 200.0, DEFAULT_RESOLUTION, 5);
        // Nothing active yet.
        assert_eq!(fields.sample(3, 3), 0.0);
        fields.activate("waves").unwrap();
        assert_eq!(fields.sample(-1, 0), 0.0);
        assert_eq!(fields.sample(0, 10_000), 0.0);
        assert_eq!(fields.angle_at(Point::new(f32::NAN, 0.0)), 0.0);
    }
    #[test]
    fn unknown_field() {
        let mut fields = FlowFields::with_defaults(100.0, 100.0, DEFAULT_RESOLUTION, 5);
        assert_eq!(
            fields.activate("nope"),
            Err(FieldError::NotFound("nope".to_owned()))
        );
        assert!(!fields.is_active());
    }
    #[test]
    fn generation_is_reproducible() {
        let mut a = FlowFields::with_defaults(100.0, 100.0, DEFAULT_RESOLUTION, 11);
        let mut b = FlowFields::with_defaults(100.0, 100.0, DEFAULT_RESOLUTION, 11);
        for name in ["curved", "truncated", "zigzag", "waves", "seabed", "hand"] {
            a.activate(name).unwrap();
            b.activate(name).unwrap();
            a.refresh(2.5);
            b.refresh(2.5);
            assert_eq!(a.grid(), b.grid(), "{name} differs");
            assert_eq!(a.active_name(), Some(name));
        }
    }
    #[test]
    fn refresh_sees_previous_grid() {
        let mut fields = FlowFields::new(100.0, 100.0, DEFAULT_RESOLUTION);
        fields.add_field(
            "counter",
            Box::new(|_: f32, mut grid: FieldGrid| {
                grid.for_each_mut(|_, _, cell| *cell += 1.0);
                grid
            }),
        );
        fields.activate("counter").unwrap();
        assert_eq!(fields.sample(0, 0), 1.0);
        fields.refresh(1.0);
        fields.refresh(2.0);
        assert_eq!(fields.sample(0, 0), 3.0);
        fields.deactivate();
        assert_eq!(fields.sample(0, 0), 0.0);
    }
}
