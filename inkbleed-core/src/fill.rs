//! # Bleed fills
//!
//! A watercolor-like fill. The outline is repeatedly grown, each edge sprouting a displaced
//! midpoint, and many slightly different grown copies are painted at low opacity. Growth is
//! steered by per-vertex modifiers and by the canvas [`BleedField`], so pigment that spread far in
//! an earlier fill tends to spread far again nearby.
//!
//! Outlines are expected to be closed and not badly self-intersecting. Nothing checks this; a
//! tangled outline simply grows into a tangled shape.

use crate::bleed::BleedField;
use crate::polygon::{intersect_segments, Polygon, Segment};
use crate::random::Random;
use crate::util::{map, Point};

/// Painted layers per fill.
pub const LAYERS: usize = 24;
/// How much smaller the scaled children get with each layer.
const LAYER_SHRINK: f32 = 0.0125;
/// Fraction of the fill opacity laid down by each painted outline.
const LAYER_OPACITY: f32 = 0.12;
/// Border width at the first and last layers, before scaling by the border strength.
const BORDER_WIDTH: (f32, f32) = (3.0, 0.5);

/// Which way the bleed spreads from the outline.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum BleedDirection {
    #[default]
    Out,
    In,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FillSettings {
    /// Bleed strength, `0..=0.6`.
    pub strength: f32,
    pub direction: BleedDirection,
    /// Erased speckle amount, `0..=1`.
    pub texture: f32,
    /// Darkened edge amount, `0..=1`.
    pub border: f32,
    /// `0..=1`
    pub opacity: f32,
}
impl Default for FillSettings {
    fn default() -> Self {
        Self {
            strength: 0.07,
            direction: BleedDirection::Out,
            texture: 0.4,
            border: 0.4,
            opacity: 0.25,
        }
    }
}
impl FillSettings {
    /// Clamp every parameter into its meaningful range.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let unit = |v: f32, max: f32| if v.is_finite() { v.clamp(0.0, max) } else { 0.0 };
        Self {
            strength: unit(self.strength, 0.6),
            direction: self.direction,
            texture: unit(self.texture, 1.0),
            border: unit(self.border, 1.0),
            opacity: unit(self.opacity, 1.0),
        }
    }
}

/// How a [`FillPolygon`] grows.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Growth {
    /// Keep each vertex's own modifier. A factor below one first trims away a centered run of
    /// `(1 - factor)` of the vertices (only for outlines of more than 8 vertices).
    Scaled(f32),
    /// Every edge gets a fully random modifier, for sparse inner pools.
    Pooling,
    /// Every edge gets the configured strength, for edge accents.
    Accent,
}

/// What a layer of the fill does besides painting.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayerStep {
    Normal,
    /// Grow the root outline before painting, then texture and commit.
    Creep,
    /// The last layer: texture and commit.
    FinalFlush,
}
impl LayerStep {
    #[must_use]
    pub fn plan(layer: usize) -> Self {
        if layer + 1 == LAYERS {
            Self::FinalFlush
        } else if layer % 4 == 0 {
            Self::Creep
        } else {
            Self::Normal
        }
    }
    #[must_use]
    pub fn grows_root(self) -> bool {
        self == Self::Creep
    }
    #[must_use]
    pub fn flushes(self) -> bool {
        matches!(self, Self::Creep | Self::FinalFlush)
    }
}

/// One grown outline. Vertices, modifiers and direction flags are index-aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct FillPolygon {
    vertices: Vec<Point>,
    modifiers: Vec<f32>,
    /// `true` where the edge starting at that vertex has its +90° normal pointing into the
    /// outline, so outward growth turns the other way.
    dirs: Vec<bool>,
    centroid: Point,
    size: f32,
    strength: f32,
}

impl FillPolygon {
    /// The root of a fill: direction flags from ray parity, randomized modifiers, and a random
    /// starting vertex.
    #[must_use]
    pub fn new(
        polygon: &Polygon,
        strength: f32,
        direction: BleedDirection,
        rng: &mut Random,
    ) -> Self {
        let mut vertices = polygon.vertices().to_vec();
        let n = vertices.len();
        let bounds = polygon.bounds();
        let reach = 2.0 * bounds.width().hypot(bounds.height()) + 1.0;

        let mut dirs: Vec<bool> = (0..n)
            .map(|i| {
                let side = vertices[(i + 1) % n] - vertices[i];
                let normal = side.normalized().rotated(90.0);
                let mid = vertices[i].lerp(vertices[(i + 1) % n], 0.5);
                let ray = Segment::new(mid + normal * 1e-3, mid + normal * reach);
                let crossings = polygon
                    .sides()
                    .enumerate()
                    .filter(|(j, side)| *j != i && intersect_segments(ray, *side, false).is_some())
                    .count();
                let inward = crossings % 2 == 1;
                match direction {
                    BleedDirection::Out => inward,
                    BleedDirection::In => !inward,
                }
            })
            .collect();

        let mut modifiers: Vec<f32> = (0..n).map(|_| rng.range(0.85, 1.2) * strength).collect();
        if n > 0 {
            // A contiguous minority bleeds much less.
            let few = (n / 10).max(1);
            let affected = rng
                .weighted(&[(few, 60.0), (n / 5, 30.0), (n / 3, 10.0)])
                .unwrap_or(few);
            let start = rng.index(n);
            for k in 0..affected {
                modifiers[(start + k) % n] *= 0.2;
            }
            let offset = rng.index(n);
            vertices.rotate_left(offset);
            modifiers.rotate_left(offset);
            dirs.rotate_left(offset);
        }
        Self::from_parts(vertices, modifiers, dirs, polygon.centroid(), strength)
    }
    fn from_parts(
        vertices: Vec<Point>,
        modifiers: Vec<f32>,
        dirs: Vec<bool>,
        centroid: Point,
        strength: f32,
    ) -> Self {
        debug_assert!(vertices.len() == modifiers.len() && vertices.len() == dirs.len());
        let size = vertices
            .iter()
            .map(|v| v.distance(centroid))
            .fold(0.0, f32::max);
        Self {
            vertices,
            modifiers,
            dirs,
            centroid,
            size,
            strength,
        }
    }
    #[must_use]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }
    #[must_use]
    pub fn modifiers(&self) -> &[f32] {
        &self.modifiers
    }
    #[must_use]
    pub fn dirs(&self) -> &[bool] {
        &self.dirs
    }
    #[must_use]
    pub fn centroid(&self) -> Point {
        self.centroid
    }
    /// Furthest vertex distance from the centroid.
    #[must_use]
    pub fn size(&self) -> f32 {
        self.size
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
    #[allow(clippy::float_cmp, clippy::cast_precision_loss)]
    fn trim(&self, factor: f32) -> (Vec<Point>, Vec<f32>, Vec<bool>) {
        let mut vertices = self.vertices.clone();
        let mut modifiers = self.modifiers.clone();
        let mut dirs = self.dirs.clone();
        let n = vertices.len();
        if factor != 1.0 && n > 8 {
            let trimmed = ((1.0 - factor.clamp(0.0, 1.0)) * n as f32).floor();
            let trimmed = az::saturating_cast::<f32, usize>(trimmed).min(n);
            let start = (n / 2).saturating_sub(trimmed / 2);
            let end = (start + trimmed).min(n);
            vertices.drain(start..end);
            modifiers.drain(start..end);
            dirs.drain(start..end);
        }
        (vertices, modifiers, dirs)
    }
    /// A new outline with a displaced midpoint inserted on every (remaining) edge.
    /// Stages the modifiers used into `bleed`.
    #[must_use]
    pub fn grow(&self, growth: Growth, bleed: &mut BleedField, rng: &mut Random) -> Self {
        let factor = match growth {
            Growth::Scaled(factor) => factor,
            Growth::Pooling | Growth::Accent => 1.0,
        };
        let (vertices, modifiers, dirs) = self.trim(factor);
        let n = vertices.len();
        let mut grown = Vec::with_capacity(n * 2);
        let mut grown_modifiers = Vec::with_capacity(n * 2);
        let mut grown_dirs = Vec::with_capacity(n * 2);

        for i in 0..n {
            let current = vertices[i];
            let next = vertices[(i + 1) % n];
            let modifier = match growth {
                Growth::Scaled(_) => modifiers[i],
                Growth::Pooling => rng.next() * self.strength,
                Growth::Accent => self.strength,
            };
            let side = next - current;
            let mid = current.lerp(next, rng.gaussian(0.5, 0.2).clamp(0.1, 0.9));
            let remembered = bleed.get(mid, Some(modifier));
            let magnitude =
                side.length() * 0.5 * (modifier + remembered) * rng.gaussian(1.0, 0.4).abs();
            let turn = if dirs[i] { -90.0 } else { 90.0 } + rng.range(-5.0, 5.0);
            let offset = side.normalized().rotated(turn) * magnitude;

            grown.push(current);
            grown_modifiers.push(modifiers[i]);
            grown_dirs.push(dirs[i]);

            grown.push(mid + offset);
            grown_modifiers.push((modifier + rng.gaussian(0.0, 0.02)).clamp(0.0, 1.0));
            grown_dirs.push(dirs[i]);
        }
        Self::from_parts(
            grown,
            grown_modifiers,
            grown_dirs,
            self.centroid,
            self.strength,
        )
    }
}

/// Where a fill's layers end up.
pub trait FillPainter {
    type Error;
    /// Paint one grown outline, with a darker border of the given width.
    fn layer(&mut self, outline: &[Point], opacity: f32, border: f32) -> Result<(), Self::Error>;
    /// Remove coverage painted since the last commit.
    fn erase(&mut self, center: Point, radius: f32, alpha: f32) -> Result<(), Self::Error>;
    /// Everything painted since the last commit becomes one layer of paint.
    fn commit(&mut self) -> Result<(), Self::Error>;
}

/// Fill `polygon` with bleeding paint. Polygons of fewer than 3 vertices are ignored.
/// # Errors
/// Forwards the first painter error, abandoning the rest of the fill.
pub fn fill<P: FillPainter>(
    polygon: &Polygon,
    settings: &FillSettings,
    bleed: &mut BleedField,
    rng: &mut Random,
    painter: &mut P,
) -> Result<(), P::Error> {
    if polygon.is_degenerate() {
        return Ok(());
    }
    let settings = settings.sanitized();
    let mut root = FillPolygon::new(polygon, settings.strength, settings.direction, rng);
    let opacity = settings.opacity * LAYER_OPACITY;

    for layer in 0..LAYERS {
        let step = LayerStep::plan(layer);
        if step.grows_root() {
            root = root.grow(Growth::Scaled(1.0), bleed, rng);
        }
        #[allow(clippy::cast_precision_loss)]
        let (k, border) = (
            layer as f32 * LAYER_SHRINK,
            settings.border
                * map(
                    layer as f32,
                    0.0,
                    (LAYERS - 1) as f32,
                    BORDER_WIDTH.0,
                    BORDER_WIDTH.1,
                    true,
                ),
        );
        let children = [
            (Growth::Scaled(1.0 - k), Growth::Accent),
            (Growth::Scaled(0.7 - k), Growth::Pooling),
            (Growth::Scaled(0.4 - k), Growth::Pooling),
        ];
        for (scaled, special) in children {
            let child = root.grow(scaled, bleed, rng).grow(special, bleed, rng);
            painter.layer(child.vertices(), opacity, border)?;
        }
        if step.flushes() {
            texture(&root, &settings, rng, painter)?;
            painter.commit()?;
        }
    }
    bleed.update();
    log::trace!("filled {} vertex outline", polygon.len());
    Ok(())
}

/// Punch translucent holes in what's been painted.
fn texture<P: FillPainter>(
    root: &FillPolygon,
    settings: &FillSettings,
    rng: &mut Random,
    painter: &mut P,
) -> Result<(), P::Error> {
    if settings.texture <= 0.0 {
        return Ok(());
    }
    let count = az::saturating_cast::<f32, usize>(rng.range(130.0, 200.0) * settings.texture);
    let spread = root.size() * 0.5;
    for _ in 0..count {
        let center = root.centroid()
            + Point::new(rng.gaussian(0.0, spread), rng.gaussian(0.0, spread));
        let radius = root.size() * rng.range(0.01, 0.05) * (0.5 + settings.texture);
        let alpha = settings.texture * rng.range(0.2, 0.5);
        painter.erase(center, radius, alpha)?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::{FieldGrid, DEFAULT_RESOLUTION};

    fn bleed() -> BleedField {
        BleedField::new(&FieldGrid::for_canvas(400.0, 400.0, DEFAULT_RESOLUTION))
    }
    fn square() -> Polygon {
        Polygon::from_rect(100.0, 100.0, 100.0, 100.0)
    }
    #[derive(Default)]
    struct Recorder {
        layers: Vec<usize>,
        erases: usize,
        commits: usize,
    }
    impl FillPainter for Recorder {
        type Error = std::convert::Infallible;
        fn layer(
            &mut self,
            outline: &[Point],
            opacity: f32,
            border: f32,
        ) -> Result<(), Self::Error> {
            assert!(opacity > 0.0 && border >= 0.0);
            self.layers.push(outline.len());
            Ok(())
        }
        fn erase(&mut self, _: Point, radius: f32, alpha: f32) -> Result<(), Self::Error> {
            assert!(radius >= 0.0 && alpha > 0.0);
            self.erases += 1;
            Ok(())
        }
        fn commit(&mut self) -> Result<(), Self::Error> {
            self.commits += 1;
            Ok(())
        }
    }
    #[test]
    fn layer_plan() {
        let plan: Vec<_> = (0..LAYERS).map(LayerStep::plan).collect();
        assert_eq!(plan.iter().filter(|s| s.grows_root()).count(), 6);
        assert_eq!(plan.iter().filter(|s| s.flushes()).count(), 7);
        assert_eq!(plan[LAYERS - 1], LayerStep::FinalFlush);
        assert_eq!(plan[1], LayerStep::Normal);
    }
    #[test]
    fn grow_doubles() {
        let mut rng = Random::new(4);
        let mut bleed = bleed();
        let pentagon = Polygon::new(
            (0..5u8)
                .map(|i| Point::new(200.0, 200.0) + Point::from_heading(f32::from(i) * 72.0) * 50.0)
                .collect(),
        );
        let root = FillPolygon::new(&pentagon, 0.1, BleedDirection::Out, &mut rng);
        assert_eq!(root.len(), 5);
        let grown = root.grow(Growth::Scaled(1.0), &mut bleed, &mut rng);
        assert_eq!(grown.len(), 10);
        assert_eq!(grown.modifiers().len(), 10);
        assert_eq!(grown.dirs().len(), 10);
        // Originals are kept at even indices.
        for (i, v) in root.vertices().iter().enumerate() {
            assert_eq!(grown.vertices()[i * 2], *v);
        }
    }
    #[test]
    fn trimming() {
        let mut rng = Random::new(4);
        let mut bleed = bleed();
        let circle = Polygon::new(
            (0..20u8)
                .map(|i| Point::new(200.0, 200.0) + Point::from_heading(f32::from(i) * 18.0) * 50.0)
                .collect(),
        );
        let root = FillPolygon::new(&circle, 0.1, BleedDirection::Out, &mut rng);
        let trimmed = root.grow(Growth::Scaled(0.5), &mut bleed, &mut rng);
        assert_eq!(trimmed.len(), 20);
        // Small outlines are never trimmed.
        let small = FillPolygon::new(&square(), 0.1, BleedDirection::Out, &mut rng);
        assert_eq!(small.grow(Growth::Scaled(0.5), &mut bleed, &mut rng).len(), 8);
    }
    #[test]
    fn direction_flags() {
        let mut rng = Random::new(8);
        let mut bleed = bleed();
        let square = square();
        for (direction, outside) in [(BleedDirection::Out, true), (BleedDirection::In, false)] {
            let root = FillPolygon::new(&square, 0.3, direction, &mut rng);
            let grown = root.grow(Growth::Accent, &mut bleed, &mut rng);
            for new in grown.vertices().iter().skip(1).step_by(2) {
                assert_eq!(!square.contains(*new), outside, "{new:?} for {direction}");
            }
        }
    }
    #[test]
    fn full_fill() {
        let mut rng = Random::new(15);
        let mut bleed = bleed();
        let mut painter = Recorder::default();
        let settings = FillSettings {
            texture: 0.5,
            ..FillSettings::default()
        };
        let Ok(()) = fill(&square(), &settings, &mut bleed, &mut rng, &mut painter);
        assert_eq!(painter.layers.len(), LAYERS * 3);
        assert!(painter.layers.iter().all(|&n| n >= 3));
        assert_eq!(painter.commits, 7);
        assert!(painter.erases > 0);
        // Growth was remembered.
        assert_ne!(bleed, self::bleed());
    }
    #[test]
    fn fill_inside_save_restore() {
        let mut rng = Random::new(16);
        let mut bleed = bleed();
        let before = bleed.clone();
        let snapshot = bleed.save();
        let Ok(()) = fill(
            &square(),
            &FillSettings::default(),
            &mut bleed,
            &mut rng,
            &mut Recorder::default(),
        );
        assert_ne!(bleed, before);
        bleed.restore(snapshot);
        assert_eq!(bleed, before);
    }
    #[test]
    fn degenerate_is_noop() {
        let mut rng = Random::new(1);
        let mut bleed = bleed();
        let mut painter = Recorder::default();
        let line = Polygon::new(vec![Point::ZERO, Point::new(1.0, 1.0)]);
        let Ok(()) = fill(&line, &FillSettings::default(), &mut bleed, &mut rng, &mut painter);
        assert!(painter.layers.is_empty());
        assert_eq!(painter.commits, 0);
    }
}
