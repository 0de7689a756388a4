//! Shapes that know how to put themselves on a [`Canvas`].

use inkbleed_core::{Plot, Point, Polygon};

use crate::canvas::Canvas;
use crate::error::EngineError;

/// Vertex density of polygonized plots, as a fraction of segment length.
const POLYGON_SIDE: f32 = 0.15;

/// Where a shape is placed, in canvas units before the canvas transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
}
impl Default for Anchor {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}
impl Anchor {
    #[must_use]
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            scale: 1.0,
        }
    }
    #[must_use]
    pub fn place(&self, point: Point) -> Point {
        Point::new(self.x + point.x * self.scale, self.y + point.y * self.scale)
    }
}

/// Something that can be stroked, filled and hatched with the canvas's current styles.
pub trait Renderable {
    /// Stroke the outline with the current stroke brush.
    /// # Errors
    /// If the brush is unknown or the render stage is gone.
    fn draw(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError>;
    /// Bleed-fill the inside with the current fill style.
    /// # Errors
    /// If the render stage is gone.
    fn fill(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError>;
    /// Hatch the inside with the current hatch style.
    /// # Errors
    /// If the hatch brush is unknown or the render stage is gone.
    fn hatch(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError>;
    /// Fill, then hatch, then stroke, skipping whichever styles are disabled.
    /// # Errors
    /// Stops at the first failing pass.
    fn render(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        if canvas.is_filling() {
            self.fill(canvas, anchor)?;
        }
        if canvas.is_hatching() {
            self.hatch(canvas, anchor)?;
        }
        if canvas.is_stroking() {
            self.draw(canvas, anchor)?;
        }
        Ok(())
    }
}

impl Renderable for Plot {
    fn draw(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        canvas.stroke_plot(self, Point::new(anchor.x, anchor.y), anchor.scale)
    }
    fn fill(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        let outline = canvas.polygonize(self, anchor, POLYGON_SIDE);
        canvas.fill_outline(&outline)
    }
    fn hatch(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        let outline = canvas.polygonize(self, anchor, POLYGON_SIDE);
        canvas.hatch_outlines(&[&outline])
    }
    /// The irregular outline is generated once and shared by fill and hatch.
    fn render(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        if canvas.is_filling() || canvas.is_hatching() {
            let outline = canvas.polygonize(self, anchor, POLYGON_SIDE);
            if canvas.is_filling() {
                canvas.fill_outline(&outline)?;
            }
            if canvas.is_hatching() {
                canvas.hatch_outlines(&[&outline])?;
            }
        }
        if canvas.is_stroking() {
            self.draw(canvas, anchor)?;
        }
        Ok(())
    }
}

impl Renderable for Polygon {
    fn draw(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        if self.len() < 2 {
            return Ok(());
        }
        for side in self.sides() {
            canvas.stroke_segment(anchor.place(side.a), anchor.place(side.b))?;
        }
        Ok(())
    }
    fn fill(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        let outline = canvas.to_device(self, anchor);
        canvas.fill_outline(&outline)
    }
    fn hatch(&self, canvas: &mut Canvas, anchor: Anchor) -> Result<(), EngineError> {
        let outline = canvas.to_device(self, anchor);
        canvas.hatch_outlines(&[&outline])
    }
}
