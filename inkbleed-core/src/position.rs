//! A point stepping across the canvas, optionally deflected by the active flow field.

use crate::field::FlowFields;
use crate::plot::Plot;
use crate::util::Point;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Position {
    point: Point,
    /// Arc length travelled so far, including skipped off-canvas steps.
    plotted: f32,
}

/// Number of whole steps of `step` needed to cover `length`.
fn step_count(length: f32, step: f32) -> usize {
    if !(step > 0.0) || !length.is_finite() || length <= 0.0 {
        return 0;
    }
    az::saturating_cast::<f32, usize>((length / step).ceil())
}

impl Position {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            point: Point::new(x, y),
            plotted: 0.0,
        }
    }
    #[must_use]
    pub fn x(&self) -> f32 {
        self.point.x
    }
    #[must_use]
    pub fn y(&self) -> f32 {
        self.point.y
    }
    #[must_use]
    pub fn point(&self) -> Point {
        self.point
    }
    #[must_use]
    pub fn plotted(&self) -> f32 {
        self.plotted
    }
    /// Jump elsewhere without travelling.
    pub fn set(&mut self, point: Point) {
        self.point = point;
    }
    pub fn reset_plotted(&mut self) {
        self.plotted = 0.0;
    }
    /// Flow field cell under this position.
    #[must_use]
    pub fn cell(&self, fields: &FlowFields) -> (isize, isize) {
        fields.grid().cell_of(self.point)
    }
    /// Field angle here, `0.0` if no field is active or the cell is out of range.
    #[must_use]
    pub fn field_angle(&self, fields: &FlowFields) -> f32 {
        fields.angle_at(self.point)
    }
    #[must_use]
    pub fn is_in(&self, fields: &FlowFields) -> bool {
        fields.contains(self.point)
    }
    fn step(&mut self, fields: &FlowFields, angle: f32, step: f32) {
        if self.is_in(fields) {
            let (sin, cos) = angle.to_radians().sin_cos();
            self.point.x += step * cos;
            self.point.y += step * sin;
        }
    }
    /// Walk `length` along a fixed `heading`, or along the field deflected by `heading` when
    /// `follow_field` is set.
    pub fn move_to(
        &mut self,
        fields: &FlowFields,
        length: f32,
        heading: f32,
        step: f32,
        follow_field: bool,
    ) {
        for _ in 0..step_count(length, step) {
            let field = if follow_field {
                self.field_angle(fields)
            } else {
                0.0
            };
            self.step(fields, field - heading, step);
            self.plotted += step;
        }
    }
    /// Walk `length` pixels, steering by `plot`'s angle at the current arc length.
    /// `scale` is pixels per plot unit.
    pub fn plot_to(&mut self, fields: &FlowFields, plot: &Plot, length: f32, step: f32, scale: f32) {
        if !(scale > 0.0) {
            return;
        }
        for _ in 0..step_count(length, step) {
            let angle = self.field_angle(fields) - plot.angle(self.plotted);
            self.step(fields, angle, step);
            self.plotted += step / scale;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::{FieldGrid, DEFAULT_RESOLUTION};
    use crate::plot::PlotKind;

    fn fields() -> FlowFields {
        FlowFields::new(200.0, 200.0, DEFAULT_RESOLUTION)
    }
    #[test]
    fn straight_heading() {
        let fields = fields();
        let mut pos = Position::new(10.0, 100.0);
        pos.move_to(&fields, 50.0, 0.0, 1.0, false);
        assert!((pos.x() - 60.0).abs() < 1e-3);
        assert!((pos.y() - 100.0).abs() < 1e-3);
        assert!((pos.plotted() - 50.0).abs() < 1e-3);
        // 90 is up the screen.
        pos.move_to(&fields, 20.0, 90.0, 1.0, false);
        assert!((pos.y() - 80.0).abs() < 1e-3);
    }
    #[test]
    fn field_deflects() {
        let mut fields = fields();
        fields.add_field(
            "down",
            Box::new(|_: f32, mut grid: FieldGrid| {
                grid.for_each_mut(|_, _, cell| *cell = 90.0);
                grid
            }),
        );
        fields.activate("down").unwrap();
        let mut pos = Position::new(100.0, 50.0);
        // Field says 90 (downwards in raw angle terms), heading 0 leaves it alone.
        pos.move_to(&fields, 10.0, 0.0, 1.0, true);
        assert!((pos.x() - 100.0).abs() < 1e-3);
        assert!((pos.y() - 60.0).abs() < 1e-3);
    }
    #[test]
    fn offscreen_steps_still_count() {
        let fields = fields();
        // The margin box ends at x = -100.
        let mut pos = Position::new(-90.0, 100.0);
        pos.move_to(&fields, 30.0, 180.0, 1.0, false);
        assert!(!pos.is_in(&fields));
        assert!((pos.x() + 101.0).abs() < 1e-3);
        let stuck = pos.point();
        pos.move_to(&fields, 10.0, 180.0, 1.0, false);
        assert_eq!(pos.point(), stuck);
        assert!((pos.plotted() - 40.0).abs() < 1e-3);
    }
    #[test]
    fn plot_to_scales_arc_length() {
        let fields = fields();
        let mut plot = Plot::new(PlotKind::Segments);
        plot.add_segment(0.0, 10.0, 1.0, true);
        plot.end_plot(0.0, 1.0, true);
        let mut pos = Position::new(0.0, 0.0);
        pos.plot_to(&fields, &plot, 20.0, 1.0, 2.0);
        assert!((pos.x() - 20.0).abs() < 1e-3);
        assert!((pos.plotted() - 10.0).abs() < 1e-3);
    }
}
