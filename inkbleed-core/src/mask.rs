//! # Coverage masks
//!
//! Everything drawn between two compositor flushes is accumulated into a single-channel coverage
//! [`Mask`]. Shapes are rasterized with a fixed 2x2 supersample and combined "over" whatever is
//! already there, so many faint layers build up density the way glazes do.

use crate::brush::{Dab, TipImage};
use crate::polygon::Bounds;
use crate::util::Point;

/// Subsample offsets within a pixel.
const SAMPLES: [(f32, f32); 4] = [(0.25, 0.25), (0.75, 0.25), (0.25, 0.75), (0.75, 0.75)];
/// Discs smaller than this are deposited by area instead of sampled.
const TINY_RADIUS: f32 = 0.75;
const TOLERANCE: f32 = 0.1;

#[derive(thiserror::Error, Debug)]
pub enum MaskError {
    #[error(transparent)]
    Tessellation(#[from] lyon_tessellation::TessellationError),
}

/// An integer pixel rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}
impl PixelRect {
    fn union(self, other: Self) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Self {
            x,
            y,
            width: (self.x + self.width).max(other.x + other.width) - x,
            height: (self.y + self.height).max(other.y + other.height) - y,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Op {
    Over,
    Erase,
}

#[derive(Clone, PartialEq)]
pub struct Mask {
    width: usize,
    height: usize,
    /// Row-major coverage, `0..=1`.
    alpha: Vec<f32>,
    /// Pixels touched by any additive operation.
    dirty: Option<PixelRect>,
}
impl std::fmt::Debug for Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mask")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

/// The pixel indices overlapping `min..max`, clipped to `start..end`.
fn span(min: f32, max: f32, start: usize, end: usize) -> std::ops::Range<usize> {
    if !(min.is_finite() && max.is_finite()) {
        return 0..0;
    }
    let lo = az::saturating_cast::<f32, usize>(min.floor()).max(start);
    let hi = az::saturating_cast::<f32, usize>(max.ceil()).min(end);
    lo..hi.max(lo)
}

fn inside_triangle(p: Point, [a, b, c]: [Point; 3]) -> bool {
    let edge = |from: Point, to: Point| {
        (to.x - from.x) * (p.y - from.y) - (to.y - from.y) * (p.x - from.x)
    };
    let (d1, d2, d3) = (edge(a, b), edge(b, c), edge(c, a));
    let negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(negative && positive)
}

/// Subsample coverage over a pixel window, one bit per subsample.
struct Coverage {
    x0: usize,
    y0: usize,
    width: usize,
    height: usize,
    bits: Vec<u8>,
}
impl Coverage {
    fn new(mask: &Mask, bounds: Bounds) -> Option<Self> {
        let xs = span(bounds.min.x, bounds.max.x, 0, mask.width);
        let ys = span(bounds.min.y, bounds.max.y, 0, mask.height);
        if xs.is_empty() || ys.is_empty() {
            return None;
        }
        Some(Self {
            x0: xs.start,
            y0: ys.start,
            width: xs.len(),
            height: ys.len(),
            bits: vec![0; xs.len() * ys.len()],
        })
    }
    /// Set every subsample within `bounds` that `inside` accepts.
    fn mark(&mut self, bounds: Bounds, inside: impl Fn(Point) -> bool) {
        let xs = span(bounds.min.x, bounds.max.x, self.x0, self.x0 + self.width);
        let ys = span(bounds.min.y, bounds.max.y, self.y0, self.y0 + self.height);
        for y in ys {
            for x in xs.clone() {
                let cell = &mut self.bits[(y - self.y0) * self.width + (x - self.x0)];
                for (bit, (dx, dy)) in SAMPLES.iter().enumerate() {
                    #[allow(clippy::cast_precision_loss)]
                    let sample = Point::new(x as f32 + dx, y as f32 + dy);
                    if inside(sample) {
                        *cell |= 1 << bit;
                    }
                }
            }
        }
    }
    fn composite(self, mask: &mut Mask, alpha: f32, op: Op) {
        for row in 0..self.height {
            for column in 0..self.width {
                let bits = self.bits[row * self.width + column];
                if bits != 0 {
                    #[allow(clippy::cast_precision_loss)]
                    let coverage = bits.count_ones() as f32 / SAMPLES.len() as f32;
                    mask.blend(self.x0 + column, self.y0 + row, alpha * coverage, op);
                }
            }
        }
        if op == Op::Over {
            mask.touch(PixelRect {
                x: self.x0,
                y: self.y0,
                width: self.width,
                height: self.height,
            });
        }
    }
}

/// Collects tessellator output as indexed triangles.
struct TriangleCollector<'data> {
    vertices: &'data mut Vec<Point>,
    triangles: &'data mut Vec<[u32; 3]>,
    // Lengths when the last `begin_geometry` was called.
    begin_vertex: usize,
    begin_triangle: usize,
}
impl<'data> TriangleCollector<'data> {
    fn new(vertices: &'data mut Vec<Point>, triangles: &'data mut Vec<[u32; 3]>) -> Self {
        Self {
            begin_vertex: vertices.len(),
            begin_triangle: triangles.len(),
            vertices,
            triangles,
        }
    }
    fn push(
        &mut self,
        position: lyon_tessellation::math::Point,
    ) -> Result<lyon_tessellation::VertexId, lyon_tessellation::GeometryBuilderError> {
        let index = u32::try_from(self.vertices.len())
            .map_err(|_| lyon_tessellation::GeometryBuilderError::TooManyVertices)?;
        self.vertices.push(Point::new(position.x, position.y));
        Ok(lyon_tessellation::VertexId(index))
    }
}
impl lyon_tessellation::GeometryBuilder for TriangleCollector<'_> {
    fn begin_geometry(&mut self) {
        self.begin_vertex = self.vertices.len();
        self.begin_triangle = self.triangles.len();
    }
    fn add_triangle(
        &mut self,
        a: lyon_tessellation::VertexId,
        b: lyon_tessellation::VertexId,
        c: lyon_tessellation::VertexId,
    ) {
        let len = self.vertices.len();
        let valid = |id: lyon_tessellation::VertexId| {
            usize::try_from(id.0).is_ok_and(|id| id >= self.begin_vertex && id < len)
        };
        // No way to report errors, drop the whole triangle.
        if valid(a) && valid(b) && valid(c) {
            self.triangles.push([a.0, b.0, c.0]);
        } else {
            debug_assert!(false, "bad index requested");
        }
    }
    fn abort_geometry(&mut self) {
        self.vertices.truncate(self.begin_vertex);
        self.triangles.truncate(self.begin_triangle);
    }
}
impl lyon_tessellation::FillGeometryBuilder for TriangleCollector<'_> {
    fn add_fill_vertex(
        &mut self,
        vertex: lyon_tessellation::FillVertex,
    ) -> Result<lyon_tessellation::VertexId, lyon_tessellation::GeometryBuilderError> {
        self.push(vertex.position())
    }
}
impl lyon_tessellation::StrokeGeometryBuilder for TriangleCollector<'_> {
    fn add_stroke_vertex(
        &mut self,
        vertex: lyon_tessellation::StrokeVertex,
    ) -> Result<lyon_tessellation::VertexId, lyon_tessellation::GeometryBuilderError> {
        self.push(vertex.position())
    }
}

fn lyon_point(p: Point) -> lyon_tessellation::math::Point {
    lyon_tessellation::math::point(p.x, p.y)
}

impl Mask {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            alpha: vec![0.0; width * height],
            dirty: None,
        }
    }
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }
    /// Coverage at a pixel, zero outside.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        if x < self.width && y < self.height {
            self.alpha[y * self.width + x]
        } else {
            0.0
        }
    }
    /// Row-major coverage.
    #[must_use]
    pub fn coverage(&self) -> &[f32] {
        &self.alpha
    }
    /// The region anything has been painted into since creation or [`Self::clear`].
    #[must_use]
    pub fn bounds(&self) -> Option<PixelRect> {
        self.dirty
    }
    /// Has nothing been painted?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dirty.is_none()
    }
    pub fn clear(&mut self) {
        if let Some(rect) = self.dirty.take() {
            for row in rect.y..rect.y + rect.height {
                let start = row * self.width + rect.x;
                self.alpha[start..start + rect.width].fill(0.0);
            }
        }
    }
    /// Move the painted contents out, leaving this mask empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::new(self.width, self.height))
    }
    fn touch(&mut self, rect: PixelRect) {
        self.dirty = Some(match self.dirty {
            Some(dirty) => dirty.union(rect),
            None => rect,
        });
    }
    fn blend(&mut self, x: usize, y: usize, amount: f32, op: Op) {
        let amount = amount.clamp(0.0, 1.0);
        let cell = &mut self.alpha[y * self.width + x];
        match op {
            Op::Over => *cell += amount * (1.0 - *cell),
            Op::Erase => *cell *= 1.0 - amount,
        }
    }
    fn rasterize(&mut self, vertices: &[Point], triangles: &[[u32; 3]], alpha: f32) {
        let Some(bounds) = Bounds::from_points(vertices.iter().copied()) else {
            return;
        };
        let Some(mut coverage) = Coverage::new(self, bounds) else {
            return;
        };
        for &triangle in triangles {
            let corners = triangle.map(|index| vertices[index as usize]);
            let Some(triangle_bounds) = Bounds::from_points(corners) else {
                continue;
            };
            coverage.mark(triangle_bounds, |p| inside_triangle(p, corners));
        }
        coverage.composite(self, alpha, Op::Over);
    }
    /// Fill a closed outline, non-zero winding.
    /// # Errors
    /// If the outline could not be tessellated. The mask is left untouched.
    pub fn fill_polygon(&mut self, outline: &[Point], alpha: f32) -> Result<(), MaskError> {
        if outline.len() < 3 || !(alpha > 0.0) || !outline.iter().all(|p| p.is_finite()) {
            return Ok(());
        }
        let mut vertices = Vec::with_capacity(outline.len());
        let mut triangles = Vec::with_capacity(outline.len());
        let mut tessellator = lyon_tessellation::FillTessellator::new();
        let options = lyon_tessellation::FillOptions::non_zero().with_tolerance(TOLERANCE);
        {
            let mut output = TriangleCollector::new(&mut vertices, &mut triangles);
            let mut builder = tessellator.builder(&options, &mut output);
            builder.begin(lyon_point(outline[0]));
            for &point in &outline[1..] {
                builder.line_to(lyon_point(point));
            }
            builder.end(true);
            builder.build()?;
        }
        self.rasterize(&vertices, &triangles, alpha);
        Ok(())
    }
    /// Stroke a polyline with round joins and caps.
    /// # Errors
    /// If the line could not be tessellated. The mask is left untouched.
    pub fn stroke_polyline(
        &mut self,
        points: &[Point],
        closed: bool,
        width: f32,
        alpha: f32,
    ) -> Result<(), MaskError> {
        if points.len() < 2
            || !(alpha > 0.0)
            || !(width > 0.0)
            || !points.iter().all(|p| p.is_finite())
        {
            return Ok(());
        }
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        let mut tessellator = lyon_tessellation::StrokeTessellator::new();
        let options = lyon_tessellation::StrokeOptions::default()
            .with_line_width(width)
            .with_line_join(lyon_tessellation::LineJoin::Round)
            .with_line_cap(lyon_tessellation::LineCap::Round)
            .with_tolerance(TOLERANCE);
        {
            let mut output = TriangleCollector::new(&mut vertices, &mut triangles);
            let mut builder = tessellator.builder(&options, &mut output);
            builder.begin(lyon_point(points[0]));
            for &point in &points[1..] {
                builder.line_to(lyon_point(point));
            }
            builder.end(closed);
            builder.build()?;
        }
        self.rasterize(&vertices, &triangles, alpha);
        Ok(())
    }
    #[allow(clippy::cast_precision_loss)]
    fn disc_op(&mut self, center: Point, radius: f32, alpha: f32, op: Op) {
        if !(radius > 0.0 && alpha > 0.0) || !center.is_finite() {
            return;
        }
        if radius < TINY_RADIUS {
            let (x, y) = (center.x.floor(), center.y.floor());
            if x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32 {
                let (x, y) = (
                    az::saturating_cast::<f32, usize>(x),
                    az::saturating_cast::<f32, usize>(y),
                );
                let area = (std::f32::consts::PI * radius * radius).min(1.0);
                self.blend(x, y, alpha * area, op);
                if op == Op::Over {
                    self.touch(PixelRect {
                        x,
                        y,
                        width: 1,
                        height: 1,
                    });
                }
            }
            return;
        }
        let reach = Point::new(radius, radius);
        let bounds = Bounds {
            min: center - reach,
            max: center + reach,
        };
        let Some(mut coverage) = Coverage::new(self, bounds) else {
            return;
        };
        let squared = radius * radius;
        coverage.mark(bounds, |p| {
            let d = p - center;
            d.x * d.x + d.y * d.y <= squared
        });
        coverage.composite(self, alpha, op);
    }
    pub fn disc(&mut self, center: Point, radius: f32, alpha: f32) {
        self.disc_op(center, radius, alpha, Op::Over);
    }
    /// Remove coverage within a disc.
    pub fn erase_disc(&mut self, center: Point, radius: f32, alpha: f32) {
        self.disc_op(center, radius, alpha, Op::Erase);
    }
    /// Any convex quad, corners in order.
    pub fn quad(&mut self, corners: [Point; 4], alpha: f32) {
        if !(alpha > 0.0) || !corners.iter().all(|p| p.is_finite()) {
            return;
        }
        let Some(bounds) = Bounds::from_points(corners) else {
            return;
        };
        let Some(mut coverage) = Coverage::new(self, bounds) else {
            return;
        };
        let [a, b, c, d] = corners;
        coverage.mark(bounds, |p| {
            inside_triangle(p, [a, b, c]) || inside_triangle(p, [a, c, d])
        });
        coverage.composite(self, alpha, Op::Over);
    }
    /// An axis-aligned square of side `side` turned `angle` degrees about its center.
    pub fn square(&mut self, center: Point, side: f32, angle: f32, alpha: f32) {
        let h = side * 0.5;
        let corners = [
            Point::new(-h, -h),
            Point::new(h, -h),
            Point::new(h, h),
            Point::new(-h, h),
        ]
        .map(|corner| center + corner.rotated(angle));
        self.quad(corners, alpha);
    }
    /// Stamp a tip image scaled to a `size` pixel square, turned `angle` degrees.
    pub fn stamp(&mut self, tip: &TipImage, center: Point, size: f32, angle: f32, alpha: f32) {
        if !(size > 0.0 && alpha > 0.0) || !center.is_finite() {
            return;
        }
        // Circumscribed box of the turned square.
        let reach = size * std::f32::consts::FRAC_1_SQRT_2;
        let xs = span(center.x - reach, center.x + reach, 0, self.width);
        let ys = span(center.y - reach, center.y + reach, 0, self.height);
        if xs.is_empty() || ys.is_empty() {
            return;
        }
        let rect = PixelRect {
            x: xs.start,
            y: ys.start,
            width: xs.len(),
            height: ys.len(),
        };
        for y in ys {
            for x in xs.clone() {
                let total: f32 = SAMPLES
                    .iter()
                    .map(|(dx, dy)| {
                        #[allow(clippy::cast_precision_loss)]
                        let local = (Point::new(x as f32 + dx, y as f32 + dy) - center)
                            .rotated(-angle)
                            * (1.0 / size);
                        tip.sample(local.x + 0.5, local.y + 0.5)
                    })
                    .sum();
                #[allow(clippy::cast_precision_loss)]
                let coverage = total / SAMPLES.len() as f32;
                if coverage > 0.0 {
                    self.blend(x, y, alpha * coverage, Op::Over);
                }
            }
        }
        self.touch(rect);
    }
    /// Draw a brush dab.
    pub fn apply(&mut self, dab: &Dab) {
        match dab {
            Dab::Disc {
                center,
                radius,
                alpha,
            } => self.disc(*center, *radius, *alpha),
            Dab::Quad { corners, alpha } => self.quad(*corners, *alpha),
            Dab::Image {
                tip,
                center,
                size,
                angle,
                alpha,
            } => self.stamp(tip, *center, *size, *angle, *alpha),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn square(x: f32, y: f32, side: f32) -> Vec<Point> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }
    #[test]
    fn fill_accumulates_over() {
        let mut mask = Mask::new(32, 32);
        assert!(mask.is_empty());
        mask.fill_polygon(&square(10.0, 10.0, 10.0), 0.5).unwrap();
        assert!((mask.get(15, 15) - 0.5).abs() < 1e-6);
        assert!((mask.get(10, 10) - 0.5).abs() < 1e-6);
        assert_eq!(mask.get(20, 15), 0.0);
        assert_eq!(mask.get(5, 5), 0.0);
        mask.fill_polygon(&square(10.0, 10.0, 10.0), 0.5).unwrap();
        assert!((mask.get(15, 15) - 0.75).abs() < 1e-6);
        let bounds = mask.bounds().unwrap();
        assert!(bounds.x <= 10 && bounds.x + bounds.width >= 20);
    }
    #[test]
    fn half_covered_pixels() {
        let mut mask = Mask::new(8, 8);
        mask.fill_polygon(&square(2.5, 2.0, 3.0), 1.0).unwrap();
        // Only the right-hand subsamples of column 2 are inside.
        assert!((mask.get(2, 3) - 0.5).abs() < 1e-6);
        assert!((mask.get(3, 3) - 1.0).abs() < 1e-6);
    }
    #[test]
    fn stroke_and_erase() {
        let mut mask = Mask::new(32, 32);
        mask.stroke_polyline(&[Point::new(2.0, 16.0), Point::new(30.0, 16.0)], false, 4.0, 1.0)
            .unwrap();
        assert!(mask.get(16, 15) > 0.9);
        assert_eq!(mask.get(16, 5), 0.0);
        mask.erase_disc(Point::new(16.0, 16.0), 3.0, 1.0);
        assert!(mask.get(16, 15) < 1e-6);
        assert!(mask.get(4, 15) > 0.9);
    }
    #[test]
    fn discs() {
        let mut mask = Mask::new(16, 16);
        mask.disc(Point::new(8.0, 8.0), 3.0, 1.0);
        assert_eq!(mask.get(8, 8), 1.0);
        assert_eq!(mask.get(0, 0), 0.0);
        // Too small to hit a subsample, still leaves a mark.
        mask.disc(Point::new(2.3, 2.3), 0.2, 1.0);
        assert!(mask.get(2, 2) > 0.0);
        // Entirely outside.
        let before = mask.clone();
        mask.disc(Point::new(-50.0, 8.0), 3.0, 1.0);
        assert_eq!(mask, before);
    }
    #[test]
    fn stamp_tip() {
        let mut mask = Mask::new(16, 16);
        let tip = TipImage::new(1, 1, vec![1.0]).unwrap();
        mask.stamp(&tip, Point::new(8.0, 8.0), 4.0, 0.0, 0.5);
        assert!((mask.get(7, 7) - 0.5).abs() < 1e-6);
        assert_eq!(mask.get(1, 1), 0.0);
    }
    #[test]
    fn take_leaves_empty() {
        let mut mask = Mask::new(8, 8);
        mask.square(Point::new(4.0, 4.0), 2.0, 45.0, 1.0);
        assert!(!mask.is_empty());
        let taken = mask.take();
        assert!(mask.is_empty());
        assert!(taken.get(4, 4) > 0.0);
        assert_eq!(mask.get(4, 4), 0.0);
    }
    #[test]
    fn degenerate_inputs() {
        let mut mask = Mask::new(8, 8);
        mask.fill_polygon(&[Point::ZERO, Point::new(1.0, 1.0)], 1.0).unwrap();
        mask.fill_polygon(&square(0.0, 0.0, 4.0), 0.0).unwrap();
        mask.stroke_polyline(&[Point::new(f32::NAN, 0.0), Point::ZERO], false, 1.0, 1.0)
            .unwrap();
        assert!(mask.is_empty());
    }
}
