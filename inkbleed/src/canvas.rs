//! # Canvas
//!
//! The drawing context of one loaded surface. Styles, the transform and the active flow field
//! form the [`DrawState`]; [`Canvas::save`] pushes it (together with the bleed memory) and
//! [`Canvas::restore`] pops it again.
//!
//! Coordinates given to drawing calls are canvas units, mapped through the current transform into
//! device pixels. Geometry, flow fields and masks all live in device pixels.
//!
//! The render stage is started by the first call that needs it.

use std::sync::Arc;

use inkbleed_core::{
    bleed::BleedSnapshot,
    brush::Trajectory,
    color::Color,
    fill::{self, BleedDirection, FillPainter, FillSettings},
    hatch::{self, HatchOptions},
    mask::MaskError,
    util, BleedField, BrushRegistry, FlowFields, Plot, Point, Polygon, Random,
};

use crate::compositor::{Blend, Compositor};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::render::{Anchor, Renderable};
use crate::stage::{StageHandle, Surface};

const DEFAULT_BRUSH: &str = "HB";
const DEFAULT_HATCH_BRUSH: &str = "hatch_brush";

#[derive(Clone, Debug, PartialEq)]
pub struct StrokeStyle {
    pub brush: String,
    pub color: Color,
    /// Multiplier on the brush's own weight.
    pub weight: f32,
}
impl StrokeStyle {
    #[must_use]
    pub fn new(brush: impl Into<String>, color: Color, weight: f32) -> Self {
        Self {
            brush: brush.into(),
            color,
            weight,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FillStyle {
    pub color: Color,
    pub settings: FillSettings,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HatchStyle {
    /// Canvas units between lines.
    pub spacing: f32,
    /// Degrees.
    pub angle: f32,
    pub options: HatchOptions,
}

/// Translate, rotate, then uniformly scale, in the order calls were made.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    pub origin: Point,
    /// Degrees, clockwise on screen.
    pub rotation: f32,
    pub scale: f32,
}
impl Default for Transform {
    fn default() -> Self {
        Self {
            origin: Point::ZERO,
            rotation: 0.0,
            scale: 1.0,
        }
    }
}
impl Transform {
    /// Canvas units to device pixels.
    #[must_use]
    pub fn apply(&self, point: Point) -> Point {
        self.origin + (point * self.scale).rotated(self.rotation)
    }
    /// A heading in canvas units, as a device heading.
    #[must_use]
    pub fn heading(&self, degrees: f32) -> f32 {
        degrees - self.rotation
    }
}

/// Everything [`Canvas::save`] captures besides bleed memory.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawState {
    pub stroke: StrokeStyle,
    pub stroking: bool,
    pub fill: FillStyle,
    pub filling: bool,
    pub hatch: HatchStyle,
    pub hatch_stroke: StrokeStyle,
    pub hatching: bool,
    /// Paint lifts towards this color instead of depositing.
    pub erase: Option<Color>,
    pub transform: Transform,
}
impl Default for DrawState {
    fn default() -> Self {
        Self {
            stroke: StrokeStyle::new(DEFAULT_BRUSH, Color::BLACK, 1.0),
            stroking: true,
            fill: FillStyle {
                color: Color::BLACK,
                settings: FillSettings::default(),
            },
            filling: false,
            hatch: HatchStyle {
                spacing: 5.0,
                angle: 45.0,
                options: HatchOptions::default(),
            },
            hatch_stroke: StrokeStyle::new(DEFAULT_HATCH_BRUSH, Color::BLACK, 1.0),
            hatching: false,
            erase: None,
            transform: Transform::default(),
        }
    }
}

struct Snapshot {
    state: DrawState,
    bleed: BleedSnapshot,
    field: Option<String>,
}

/// A path being built with [`Canvas::begin_path`].
#[derive(Clone, Debug, Default)]
struct PathBuilder {
    curvature: f32,
    subpaths: Vec<Vec<(Point, f32)>>,
}

/// A grown outline that fails to tessellate loses that one layer, the fill carries on.
fn tolerate(result: Result<(), MaskError>, vertices: usize) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("skipped a {vertices} vertex fill layer: {e}");
            false
        }
    }
}

/// Fill layers go straight into the compositor's mask.
struct MaskPainter<'a> {
    compositor: &'a mut Compositor<StageHandle>,
    color: Color,
    erase: bool,
}
impl FillPainter for MaskPainter<'_> {
    type Error = EngineError;
    fn layer(&mut self, outline: &[Point], opacity: f32, border: f32) -> Result<(), Self::Error> {
        let mask = self.compositor.mask();
        if tolerate(mask.fill_polygon(outline, opacity), outline.len()) && border > 0.0 {
            tolerate(
                mask.stroke_polyline(outline, true, border, opacity),
                outline.len(),
            );
        }
        Ok(())
    }
    fn erase(&mut self, center: Point, radius: f32, alpha: f32) -> Result<(), Self::Error> {
        self.compositor.mask().erase_disc(center, radius, alpha);
        Ok(())
    }
    fn commit(&mut self) -> Result<(), Self::Error> {
        self.compositor.blend(Blend {
            color: Some(self.color),
            erase: self.erase,
            last: true,
            sublayer: true,
        })
    }
}

pub struct Canvas {
    surface: Surface,
    width: u32,
    height: u32,
    queue_capacity: usize,
    state: DrawState,
    stack: Vec<Snapshot>,
    fields: FlowFields,
    bleed: BleedField,
    rng: Random,
    brushes: Arc<parking_lot::RwLock<BrushRegistry>>,
    /// `None` until the first draw.
    compositor: Option<Compositor<StageHandle>>,
    path: Option<PathBuilder>,
}

impl Canvas {
    pub fn new(
        surface: Surface,
        brushes: Arc<parking_lot::RwLock<BrushRegistry>>,
        config: &EngineConfig,
    ) -> Self {
        let (width, height) = surface.lock().dimensions();
        #[allow(clippy::cast_precision_loss)]
        let mut fields = FlowFields::with_defaults(
            width as f32,
            height as f32,
            config.field_resolution,
            config.seed,
        );
        if !config.default_field.is_empty() {
            if let Err(err) = fields.activate(&config.default_field) {
                log::warn!("default field unavailable: {err}");
            }
        }
        let bleed = BleedField::new(fields.grid());
        Self {
            surface,
            width,
            height,
            queue_capacity: config.queue_capacity,
            state: DrawState::default(),
            stack: Vec::new(),
            fields,
            bleed,
            rng: Random::new(config.seed),
            brushes,
            compositor: None,
            path: None,
        }
    }
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
    /// Has the render stage been started?
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.compositor.is_some()
    }
    #[must_use]
    pub fn state(&self) -> &DrawState {
        &self.state
    }
    #[must_use]
    pub fn fields(&self) -> &FlowFields {
        &self.fields
    }
    #[must_use]
    pub fn bleed(&self) -> &BleedField {
        &self.bleed
    }
    #[must_use]
    pub fn is_stroking(&self) -> bool {
        self.state.stroking
    }
    #[must_use]
    pub fn is_filling(&self) -> bool {
        self.state.filling
    }
    #[must_use]
    pub fn is_hatching(&self) -> bool {
        self.state.hatching
    }

    fn provision<'c>(
        slot: &'c mut Option<Compositor<StageHandle>>,
        surface: &Surface,
        capacity: usize,
    ) -> Result<&'c mut Compositor<StageHandle>, EngineError> {
        let compositor = match slot.take() {
            Some(compositor) => compositor,
            None => {
                let (width, height) = surface.lock().dimensions();
                let stage = StageHandle::spawn(surface.clone(), capacity)?;
                log::debug!("canvas ready, {width}x{height}");
                Compositor::new(stage, width as usize, height as usize)
            }
        };
        Ok(slot.insert(compositor))
    }
    fn compositor(&mut self) -> Result<&mut Compositor<StageHandle>, EngineError> {
        Self::provision(&mut self.compositor, &self.surface, self.queue_capacity)
    }
    /// Color and mode for paint, honoring erase mode.
    fn paint(&self, color: Color) -> (Color, bool) {
        match self.state.erase {
            Some(erase) => (erase, true),
            None => (color, false),
        }
    }

    // Styles

    /// Stroke with a named brush. Fails if the brush is unknown.
    /// # Errors
    /// [`EngineError::Brush`] for unknown brushes.
    pub fn set_stroke(&mut self, brush: &str, color: Color, weight: f32) -> Result<(), EngineError> {
        self.brushes.read().get(brush)?;
        self.state.stroke = StrokeStyle::new(brush, color, weight);
        self.state.stroking = true;
        Ok(())
    }
    /// Change the stroke color, enabling strokes.
    pub fn stroke(&mut self, color: Color) {
        self.state.stroke.color = color;
        self.state.stroking = true;
    }
    pub fn no_stroke(&mut self) {
        self.state.stroking = false;
    }
    /// Fill with `color` at `opacity` (`0..=1`), enabling fills.
    pub fn fill_style(&mut self, color: Color, opacity: f32) {
        self.state.fill.color = color;
        self.state.fill.settings.opacity = opacity;
        self.state.fill.settings = self.state.fill.settings.sanitized();
        self.state.filling = true;
    }
    pub fn fill_bleed(&mut self, strength: f32, direction: BleedDirection) {
        self.state.fill.settings.strength = strength;
        self.state.fill.settings.direction = direction;
        self.state.fill.settings = self.state.fill.settings.sanitized();
    }
    pub fn fill_texture(&mut self, texture: f32, border: f32) {
        self.state.fill.settings.texture = texture;
        self.state.fill.settings.border = border;
        self.state.fill.settings = self.state.fill.settings.sanitized();
    }
    pub fn no_fill(&mut self) {
        self.state.filling = false;
    }
    /// Hatch every closed shape, enabling hatching.
    pub fn hatch_style(&mut self, spacing: f32, angle: f32, options: HatchOptions) {
        self.state.hatch = HatchStyle {
            spacing,
            angle,
            options,
        };
        self.state.hatching = true;
    }
    /// Brush used for hatch lines.
    /// # Errors
    /// [`EngineError::Brush`] for unknown brushes.
    pub fn hatch_brush(&mut self, brush: &str, color: Color, weight: f32) -> Result<(), EngineError> {
        self.brushes.read().get(brush)?;
        self.state.hatch_stroke = StrokeStyle::new(brush, color, weight);
        Ok(())
    }
    pub fn no_hatch(&mut self) {
        self.state.hatching = false;
    }
    /// Every following draw lifts paint towards `color` until [`Self::no_erase`].
    pub fn erase(&mut self, color: Color) {
        self.state.erase = Some(color);
    }
    pub fn no_erase(&mut self) {
        self.state.erase = None;
    }

    // Transform and state

    pub fn translate(&mut self, dx: f32, dy: f32) {
        let transform = &mut self.state.transform;
        transform.origin = transform.apply(Point::new(dx, dy));
    }
    /// Degrees, clockwise on screen.
    pub fn rotate(&mut self, degrees: f32) {
        if degrees.is_finite() {
            self.state.transform.rotation += degrees;
        }
    }
    pub fn scale(&mut self, factor: f32) {
        if factor > 0.0 && factor.is_finite() {
            self.state.transform.scale *= factor;
        } else {
            log::warn!("ignoring canvas scale {factor}");
        }
    }
    pub fn reset_transform(&mut self) {
        self.state.transform = Transform::default();
    }
    /// Push styles, transform, active field and bleed memory.
    pub fn save(&mut self) {
        self.stack.push(Snapshot {
            state: self.state.clone(),
            bleed: self.bleed.save(),
            field: self.fields.active_name().map(ToOwned::to_owned),
        });
    }
    /// Pop what the matching [`Self::save`] pushed. Unbalanced restores are ignored.
    pub fn restore(&mut self) {
        let Some(snapshot) = self.stack.pop() else {
            log::warn!("restore without a matching save");
            return;
        };
        self.state = snapshot.state;
        self.bleed.restore(snapshot.bleed);
        if self.fields.active_name() != snapshot.field.as_deref() {
            match snapshot.field {
                Some(name) => {
                    if let Err(err) = self.fields.activate(&name) {
                        log::warn!("could not restore flow field: {err}");
                    }
                }
                None => self.fields.deactivate(),
            }
        }
    }

    // Fields and randomness

    /// Activate a named flow field.
    /// # Errors
    /// [`EngineError::Field`] if no such field exists.
    pub fn field(&mut self, name: &str) -> Result<(), EngineError> {
        self.fields.activate(name)?;
        Ok(())
    }
    pub fn no_field(&mut self) {
        self.fields.deactivate();
    }
    /// Regenerate the active field for a new point in time.
    pub fn refresh_field(&mut self, time: f32) {
        self.fields.refresh(time);
    }
    pub fn seed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    // Device-space building blocks, for [`Renderable`] implementations.

    /// A polygon mapped through `anchor` and the transform.
    #[must_use]
    pub fn to_device(&self, polygon: &Polygon, anchor: Anchor) -> Polygon {
        let transform = self.state.transform;
        Polygon::new(
            polygon
                .vertices()
                .iter()
                .map(|&v| transform.apply(anchor.place(v)))
                .collect(),
        )
    }
    fn device_plot(&self, plot: &Plot) -> Plot {
        let mut plot = plot.clone();
        plot.rotate(plot.rotation() - self.state.transform.rotation);
        plot
    }
    /// An irregular device-space outline of `plot` walked from `anchor`.
    pub fn polygonize(&mut self, plot: &Plot, anchor: Anchor, side: f32) -> Polygon {
        let start = self.state.transform.apply(Point::new(anchor.x, anchor.y));
        let plot = self.device_plot(plot);
        plot.gen_pol(
            &self.fields,
            &mut self.rng,
            start.x,
            start.y,
            anchor.scale * self.state.transform.scale,
            side,
        )
    }
    fn stroke_device(
        &mut self,
        style: &StrokeStyle,
        start: Point,
        trajectory: Trajectory<'_>,
    ) -> Result<(), EngineError> {
        let mut brush = self.brushes.read().get(&style.brush)?.clone();
        brush.weight *= style.weight * self.state.transform.scale;
        let dabs = brush.stroke(&self.fields, start, trajectory, &mut self.rng);
        if dabs.is_empty() {
            return Ok(());
        }
        let (color, erase) = self.paint(style.color);
        let compositor = self.compositor()?;
        compositor.blend(Blend {
            color: Some(color),
            erase,
            ..Blend::default()
        })?;
        let mask = compositor.mask();
        for dab in &dabs {
            mask.apply(dab);
        }
        Ok(())
    }
    fn line_device(&mut self, style: &StrokeStyle, a: Point, b: Point) -> Result<(), EngineError> {
        let length = a.distance(b);
        if !(length > 0.0) {
            return Ok(());
        }
        let trajectory = Trajectory::Line {
            length,
            heading: util::heading(a, b),
            follow_field: self.fields.is_active(),
        };
        self.stroke_device(style, a, trajectory)
    }
    /// Stroke a straight run between two canvas points with the stroke brush.
    /// # Errors
    /// If the brush is unknown or the stage is gone.
    pub fn stroke_segment(&mut self, a: Point, b: Point) -> Result<(), EngineError> {
        if !self.state.stroking {
            return Ok(());
        }
        let transform = self.state.transform;
        let style = self.state.stroke.clone();
        self.line_device(&style, transform.apply(a), transform.apply(b))
    }
    /// Stroke along `plot` from a canvas point, `scale` canvas units per plot unit.
    /// # Errors
    /// If the brush is unknown or the stage is gone.
    pub fn stroke_plot(&mut self, plot: &Plot, start: Point, scale: f32) -> Result<(), EngineError> {
        if !self.state.stroking {
            return Ok(());
        }
        let start = self.state.transform.apply(start);
        let plot = self.device_plot(plot);
        let style = self.state.stroke.clone();
        let scale = scale * self.state.transform.scale;
        self.stroke_device(&style, start, Trajectory::Plot { plot: &plot, scale })
    }
    /// Bleed-fill a device-space outline with the fill style.
    /// # Errors
    /// If the stage is gone.
    pub fn fill_outline(&mut self, outline: &Polygon) -> Result<(), EngineError> {
        if outline.is_degenerate() {
            return Ok(());
        }
        let settings = self.state.fill.settings;
        let (color, erase) = self.paint(self.state.fill.color);
        let compositor = Self::provision(&mut self.compositor, &self.surface, self.queue_capacity)?;
        compositor.blend(Blend {
            color: Some(color),
            erase,
            ..Blend::default()
        })?;
        let mut painter = MaskPainter {
            compositor,
            color,
            erase,
        };
        fill::fill(outline, &settings, &mut self.bleed, &mut self.rng, &mut painter)
    }
    /// Hatch device-space outlines with the hatch style and brush.
    /// # Errors
    /// If the hatch brush is unknown or the stage is gone.
    pub fn hatch_outlines(&mut self, outlines: &[&Polygon]) -> Result<(), EngineError> {
        let HatchStyle {
            spacing,
            angle,
            options,
        } = self.state.hatch;
        let transform = self.state.transform;
        let lines = hatch::hatch(
            outlines,
            spacing * transform.scale,
            transform.heading(angle),
            options,
            &mut self.rng,
        );
        let style = self.state.hatch_stroke.clone();
        for line in lines {
            self.line_device(&style, line.a, line.b)?;
        }
        Ok(())
    }

    // Primitives

    /// Straight stroke, bent by the active field if there is one. Zero length draws nothing.
    /// # Errors
    /// If the brush is unknown or the stage is gone.
    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<(), EngineError> {
        self.stroke_segment(Point::new(x1, y1), Point::new(x2, y2))
    }
    /// Stroke `length` units from a point, following the field deflected by `heading`.
    /// # Errors
    /// If the brush is unknown or the stage is gone.
    pub fn flow_line(&mut self, x: f32, y: f32, length: f32, heading: f32) -> Result<(), EngineError> {
        if !self.state.stroking {
            return Ok(());
        }
        let transform = self.state.transform;
        let style = self.state.stroke.clone();
        let trajectory = Trajectory::Line {
            length: length * transform.scale,
            heading: transform.heading(heading),
            follow_field: true,
        };
        self.stroke_device(&style, transform.apply(Point::new(x, y)), trajectory)
    }
    /// Render a plot with every enabled style, starting at `x, y`.
    /// # Errors
    /// If a brush is unknown or the stage is gone.
    pub fn plot(&mut self, plot: &Plot, x: f32, y: f32, scale: f32) -> Result<(), EngineError> {
        plot.render(self, Anchor { x, y, scale })
    }
    /// # Errors
    /// If a brush is unknown or the stage is gone.
    pub fn polygon(&mut self, points: &[Point]) -> Result<(), EngineError> {
        Polygon::new(points.to_vec()).render(self, Anchor::default())
    }
    /// # Errors
    /// If a brush is unknown or the stage is gone.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<(), EngineError> {
        Polygon::from_rect(x, y, width, height).render(self, Anchor::default())
    }
    /// Circle of the given diameter about `x, y`. Irregular circles wobble a little.
    /// # Errors
    /// If a brush is unknown or the stage is gone.
    pub fn circle(&mut self, x: f32, y: f32, diameter: f32, irregular: bool) -> Result<(), EngineError> {
        if !(diameter > 0.0) {
            return Ok(());
        }
        let (start, plot) = Plot::circle(Point::new(x, y), diameter / 2.0, &mut self.rng, irregular);
        plot.render(self, Anchor::at(start.x, start.y))
    }
    /// Stroke a clockwise arc, angles in radians from +x.
    /// # Errors
    /// If the brush is unknown or the stage is gone.
    pub fn arc(&mut self, x: f32, y: f32, radius: f32, start: f32, end: f32) -> Result<(), EngineError> {
        match Plot::arc(Point::new(x, y), radius, start, end) {
            Some((from, plot)) => plot.draw(self, Anchor::at(from.x, from.y)),
            None => Ok(()),
        }
    }
    /// Stroke a smooth path through points with pressures. `curvature` in `0..=1`.
    /// # Errors
    /// If the brush is unknown or the stage is gone.
    pub fn spline(&mut self, points: &[(Point, f32)], curvature: f32) -> Result<(), EngineError> {
        match Plot::spline(points, curvature) {
            Some((from, plot)) => plot.draw(self, Anchor::at(from.x, from.y)),
            None => Ok(()),
        }
    }
    /// Place a picture with its top-left corner at a canvas point. Images are not rotated or
    /// scaled by the transform.
    /// # Errors
    /// If the stage is gone.
    pub fn image(&mut self, image: image::RgbaImage, x: f32, y: f32) -> Result<(), EngineError> {
        let at = self.state.transform.apply(Point::new(x, y));
        let (x, y) = (
            az::saturating_cast::<f32, i64>(at.x.round()),
            az::saturating_cast::<f32, i64>(at.y.round()),
        );
        self.compositor()?.image(image, x, y)
    }
    /// Cover everything with a color.
    /// # Errors
    /// If the stage is gone.
    pub fn background(&mut self, color: Color) -> Result<(), EngineError> {
        self.compositor()?.clear(color)
    }

    // Paths

    /// Start collecting a path. `curvature` in `0..=1` rounds its corners.
    pub fn begin_path(&mut self, curvature: f32) {
        self.path = Some(PathBuilder {
            curvature,
            subpaths: Vec::new(),
        });
    }
    /// Start a new sub-path.
    pub fn move_to(&mut self, x: f32, y: f32) {
        match self.path.as_mut() {
            Some(path) => path.subpaths.push(vec![(Point::new(x, y), 1.0)]),
            None => log::warn!("move_to outside of a path"),
        }
    }
    pub fn line_to(&mut self, x: f32, y: f32, pressure: f32) {
        let Some(path) = self.path.as_mut() else {
            log::warn!("line_to outside of a path");
            return;
        };
        let point = (Point::new(x, y), pressure);
        match path.subpaths.last_mut() {
            Some(subpath) => subpath.push(point),
            None => path.subpaths.push(vec![point]),
        }
    }
    /// Return to the start of the current sub-path.
    pub fn close_path(&mut self) {
        if let Some(subpath) = self.path.as_mut().and_then(|p| p.subpaths.last_mut()) {
            if let Some(&first) = subpath.first() {
                subpath.push(first);
            }
        }
    }
    /// Render the collected path with every enabled style.
    /// # Errors
    /// If a brush is unknown or the stage is gone.
    pub fn end_path(&mut self) -> Result<(), EngineError> {
        let Some(path) = self.path.take() else {
            log::warn!("end_path without begin_path");
            return Ok(());
        };
        for subpath in &path.subpaths {
            if let Some((from, plot)) = Plot::spline(subpath, path.curvature) {
                plot.render(self, Anchor::at(from.x, from.y))?;
            }
        }
        Ok(())
    }

    // Frames

    /// Flush everything drawn and present it.
    /// # Errors
    /// If the stage is gone.
    pub fn end_frame(&mut self) -> Result<(), EngineError> {
        self.compositor()?.blend(Blend::last())
    }
    /// A copy of the visible surface, after everything queued before it.
    /// # Errors
    /// If the stage is gone.
    pub fn read(&mut self) -> Result<image::RgbaImage, EngineError> {
        match self.compositor.as_mut() {
            Some(compositor) => compositor.read(),
            None => Ok(self.surface.lock().clone()),
        }
    }
    /// Wait for the stage to catch up.
    /// # Errors
    /// If the stage is gone.
    pub fn sync(&mut self) -> Result<(), EngineError> {
        match self.compositor.as_mut() {
            Some(compositor) => compositor.sync(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn canvas() -> Canvas {
        let surface = Arc::new(parking_lot::Mutex::new(image::RgbaImage::new(64, 64)));
        let brushes = Arc::new(parking_lot::RwLock::new(BrushRegistry::with_defaults()));
        let config = EngineConfig {
            queue_capacity: 4,
            ..EngineConfig::default()
        };
        Canvas::new(surface, brushes, &config)
    }
    fn dark_pixels(image: &image::RgbaImage) -> usize {
        image.pixels().filter(|p| p[0] < 200).count()
    }
    #[test]
    fn lazily_ready() {
        let mut canvas = canvas();
        assert!(!canvas.is_ready());
        canvas.line(5.0, 5.0, 5.0, 5.0).unwrap();
        assert!(!canvas.is_ready());
        canvas.background(Color::WHITE).unwrap();
        assert!(canvas.is_ready());
    }
    #[test]
    fn line_shows_after_end_frame() {
        let mut canvas = canvas();
        canvas.background(Color::WHITE).unwrap();
        canvas
            .set_stroke("marker", Color::BLACK, 1.0)
            .unwrap();
        canvas.line(8.0, 32.0, 56.0, 32.0).unwrap();
        // Mixed, but not yet presented.
        assert_eq!(dark_pixels(&canvas.read().unwrap()), 0);
        canvas.line(8.0, 40.0, 56.0, 40.0).unwrap();
        canvas.end_frame().unwrap();
        let image = canvas.read().unwrap();
        assert!(dark_pixels(&image) > 0);
        assert!(image.get_pixel(32, 40)[0] < 200);
        assert_eq!(image.get_pixel(32, 5).0, [255, 255, 255, 255]);
    }
    #[test]
    fn unknown_brush() {
        let mut canvas = canvas();
        assert!(matches!(
            canvas.set_stroke("quill", Color::BLACK, 1.0),
            Err(EngineError::Brush(_))
        ));
        assert_eq!(canvas.state().stroke.brush, DEFAULT_BRUSH);
    }
    #[test]
    fn save_and_restore() {
        let mut canvas = canvas();
        canvas.save();
        canvas.no_stroke();
        canvas.fill_style(Color::rgb(10, 20, 30), 0.5);
        canvas.translate(10.0, 0.0);
        canvas.rotate(90.0);
        canvas.field("curved").unwrap();
        canvas.save();
        canvas.no_field();
        canvas.restore();
        assert_eq!(canvas.fields().active_name(), Some("curved"));
        assert!(canvas.is_filling());
        canvas.restore();
        assert_eq!(canvas.state(), &DrawState::default());
        assert_eq!(canvas.fields().active_name(), None);
        // Unbalanced, ignored.
        canvas.restore();
        assert_eq!(canvas.state(), &DrawState::default());
    }
    #[test]
    fn transform_maps_points_and_headings() {
        let mut canvas = canvas();
        canvas.translate(10.0, 20.0);
        canvas.rotate(90.0);
        canvas.scale(2.0);
        let transform = canvas.state().transform;
        let mapped = transform.apply(Point::new(1.0, 0.0));
        assert!((mapped.x - 10.0).abs() < 1e-4);
        assert!((mapped.y - 22.0).abs() < 1e-4);
        // Heading 0 (+x) turned clockwise on screen points down, heading -90.
        assert!((transform.heading(0.0) + 90.0).abs() < 1e-4);
        canvas.reset_transform();
        assert_eq!(canvas.state().transform, Transform::default());
    }
    #[test]
    fn scoped_fill_keeps_bleed_memory() {
        let mut canvas = canvas();
        canvas.background(Color::WHITE).unwrap();
        let before = canvas.bleed().clone();
        canvas.save();
        canvas.no_stroke();
        canvas.fill_style(Color::rgb(0, 60, 200), 0.8);
        canvas.rect(16.0, 16.0, 32.0, 32.0).unwrap();
        assert_ne!(canvas.bleed(), &before);
        canvas.restore();
        assert_eq!(canvas.bleed(), &before);
        canvas.end_frame().unwrap();
        let image = canvas.read().unwrap();
        let center = image.get_pixel(32, 32);
        assert!(center[2] > center[0], "fill should be blue, got {center:?}");
    }
    #[test]
    fn tangled_fills_still_commit() {
        let failed = MaskError::from(lyon_tessellation::TessellationError::GeometryBuilder(
            lyon_tessellation::GeometryBuilderError::TooManyVertices,
        ));
        assert!(!tolerate(Err(failed), 12));
        assert!(tolerate(Ok(()), 12));

        let mut canvas = canvas();
        canvas.background(Color::WHITE).unwrap();
        let before = canvas.bleed().clone();
        canvas.no_stroke();
        canvas.fill_style(Color::rgb(0, 60, 200), 0.8);
        // A bowtie crosses itself in the middle.
        let bowtie = [
            Point::new(8.0, 8.0),
            Point::new(56.0, 56.0),
            Point::new(56.0, 8.0),
            Point::new(8.0, 56.0),
        ];
        canvas.polygon(&bowtie).unwrap();
        assert_ne!(canvas.bleed(), &before);
        canvas.end_frame().unwrap();
        let image = canvas.read().unwrap();
        let upper = image.get_pixel(32, 20);
        assert!(upper[2] > upper[0], "fill should be blue, got {upper:?}");
    }
    #[test]
    fn path_builder() {
        let mut canvas = canvas();
        canvas.background(Color::WHITE).unwrap();
        canvas
            .set_stroke("marker", Color::BLACK, 1.0)
            .unwrap();
        canvas.begin_path(0.5);
        canvas.move_to(10.0, 10.0);
        canvas.line_to(50.0, 10.0, 1.0);
        canvas.line_to(50.0, 50.0, 1.0);
        canvas.close_path();
        canvas.end_path().unwrap();
        canvas.end_frame().unwrap();
        assert!(dark_pixels(&canvas.read().unwrap()) > 0);
        // Consumed.
        canvas.end_path().unwrap();
    }
    #[test]
    fn erasing_lifts_paint() {
        let mut canvas = canvas();
        canvas.background(Color::BLACK).unwrap();
        canvas
            .set_stroke("marker", Color::BLACK, 1.0)
            .unwrap();
        canvas.erase(Color::WHITE);
        canvas.line(8.0, 32.0, 56.0, 32.0).unwrap();
        canvas.no_erase();
        canvas.end_frame().unwrap();
        let image = canvas.read().unwrap();
        assert!(image.get_pixel(32, 32)[0] > 0);
    }
}
