//! # Brush
//!
//! Named paint tools. A [`BrushDescriptor`] walks a trajectory and turns it into [`Dab`]s, small
//! marks which a rasterizer accumulates into a coverage mask.

use std::sync::Arc;

use crate::field::FlowFields;
use crate::plot::Plot;
use crate::position::Position;
use crate::random::Random;
use crate::util::{heading, Point};

/// Spacing is clamped to at least this many pixels.
const MIN_SPACING: f32 = 0.05;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BrushError {
    #[error("no brush named {0:?}")]
    UnknownBrush(String),
    #[error("brush {0:?} needs a tip for its kind")]
    MissingTip(String),
    #[error("brush {name:?} has an invalid {parameter}")]
    InvalidParameter {
        name: String,
        parameter: &'static str,
    },
}

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum BrushKind {
    /// Vibrating clusters of dots, like graphite.
    #[default]
    Default,
    /// Solid discs.
    Marker,
    /// Scattered squares.
    Spray,
    /// Shapes drawn by a tip function.
    Custom,
    /// A coverage image stamped along the path.
    Image,
}

/// How tips are turned as they are stamped.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum Rotation {
    #[default]
    None,
    Random,
    /// Follow the direction of travel.
    Natural,
}

/// Width multiplier along the stroke.
#[derive(Clone)]
pub enum Pressure {
    /// `1 - a * |2t - 1|^(1/b)` for `curve = [a, b]`, mapped so `0.0` lands on `min_max[0]` and
    /// `1.0` on `min_max[1]`. The middle of the stroke always gets `min_max[1]`.
    Standard { curve: [f32; 2], min_max: [f32; 2] },
    /// Any function of stroke progress returning `0..=1`, mapped like [`Pressure::Standard`].
    Custom {
        min_max: [f32; 2],
        curve: Arc<dyn Fn(f32) -> f32 + Send + Sync>,
    },
}
impl std::fmt::Debug for Pressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard { curve, min_max } => f
                .debug_struct("Standard")
                .field("curve", curve)
                .field("min_max", min_max)
                .finish(),
            Self::Custom { min_max, .. } => f
                .debug_struct("Custom")
                .field("min_max", min_max)
                .finish_non_exhaustive(),
        }
    }
}
impl Pressure {
    /// Pressure at stroke progress `t` in `0..=1`.
    #[must_use]
    pub fn at(&self, t: f32) -> f32 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let (raw, [low, high]) = match self {
            Self::Standard {
                curve: [a, b],
                min_max,
            } => {
                let exponent = 1.0 / b.max(0.0);
                (1.0 - a * (2.0 * t - 1.0).abs().powf(exponent), *min_max)
            }
            Self::Custom { min_max, curve } => (curve(t).clamp(0.0, 1.0), *min_max),
        };
        low + (high - low) * raw
    }
}

/// A coverage image used as a brush tip, row-major, `0..=1`.
#[derive(Clone, Debug, PartialEq)]
pub struct TipImage {
    width: usize,
    height: usize,
    coverage: Vec<f32>,
}
impl TipImage {
    /// `None` if the size does not match the data, or is zero.
    #[must_use]
    pub fn new(width: usize, height: usize, coverage: Vec<f32>) -> Option<Self> {
        (width > 0 && height > 0 && width.checked_mul(height)? == coverage.len()).then_some(Self {
            width,
            height,
            coverage,
        })
    }
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }
    /// Nearest-neighbor sample at normalized `u, v`, zero outside.
    #[must_use]
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let (x, y) = (u * self.width as f32, v * self.height as f32);
        let x = az::saturating_cast::<f32, usize>(x).min(self.width - 1);
        let y = az::saturating_cast::<f32, usize>(y).min(self.height - 1);
        self.coverage[y * self.width + x]
    }
}

/// A shape in tip space, where one unit is the stroke weight.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TipShape {
    Rect { x: f32, y: f32, w: f32, h: f32 },
    Disc { x: f32, y: f32, radius: f32 },
}

/// Collects the shapes of a custom tip.
#[derive(Default, Debug)]
pub struct TipBuilder {
    shapes: smallvec::SmallVec<[TipShape; 4]>,
}
impl TipBuilder {
    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.shapes.push(TipShape::Rect { x, y, w, h });
    }
    pub fn disc(&mut self, x: f32, y: f32, radius: f32) {
        self.shapes.push(TipShape::Disc { x, y, radius });
    }
}

pub type TipFn = Arc<dyn Fn(&mut TipBuilder, f32) + Send + Sync>;

#[derive(Clone)]
pub enum Tip {
    /// Called with the current pressure for every stamp.
    Custom(TipFn),
    Image(Arc<TipImage>),
}
impl std::fmt::Debug for Tip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::Image(image) => f
                .debug_tuple("Image")
                .field(&(image.width, image.height))
                .finish(),
        }
    }
}

/// A single mark left by a brush.
#[derive(Clone, Debug, PartialEq)]
pub enum Dab {
    Disc {
        center: Point,
        radius: f32,
        alpha: f32,
    },
    Quad {
        corners: [Point; 4],
        alpha: f32,
    },
    Image {
        tip: Arc<TipImage>,
        center: Point,
        /// Side length of the stamped square, pixels.
        size: f32,
        /// Degrees.
        angle: f32,
        alpha: f32,
    },
}

/// Where a stroke goes.
#[derive(Copy, Clone, Debug)]
pub enum Trajectory<'a> {
    /// Straight, or along the active flow field deflected by `heading`.
    Line {
        length: f32,
        heading: f32,
        follow_field: bool,
    },
    /// Along a plot, `scale` pixels per plot unit.
    Plot { plot: &'a Plot, scale: f32 },
}
impl Trajectory<'_> {
    /// Length in pixels.
    #[must_use]
    pub fn length(&self) -> f32 {
        match self {
            Self::Line { length, .. } => *length,
            Self::Plot { plot, scale } => plot.length() * scale,
        }
    }
}

#[derive(Clone, Debug)]
pub struct BrushDescriptor {
    /// Base stroke width, pixels.
    pub weight: f32,
    /// Positional jitter, pixels.
    pub vibration: f32,
    /// `0..=1`, how consistently dots reach full opacity.
    pub definition: f32,
    /// Dot density for [`BrushKind::Default`], dots per stamp for [`BrushKind::Spray`].
    pub quality: f32,
    /// `0..=1`
    pub opacity: f32,
    /// Distance between stamps, pixels.
    pub spacing: f32,
    pub pressure: Pressure,
    pub kind: BrushKind,
    pub rotate: Rotation,
    pub tip: Option<Tip>,
}

impl BrushDescriptor {
    /// Check the descriptor is usable.
    /// # Errors
    /// Names the first bad parameter, or a missing tip for tip-based kinds.
    pub fn validate(&self, name: &str) -> Result<(), BrushError> {
        let invalid = |parameter| BrushError::InvalidParameter {
            name: name.to_owned(),
            parameter,
        };
        for (value, parameter) in [
            (self.weight, "weight"),
            (self.vibration, "vibration"),
            (self.definition, "definition"),
            (self.quality, "quality"),
            (self.opacity, "opacity"),
            (self.spacing, "spacing"),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(parameter));
            }
        }
        match (self.kind, &self.tip) {
            (BrushKind::Custom, Some(Tip::Custom(_))) | (BrushKind::Image, Some(Tip::Image(_))) => {
                Ok(())
            }
            (BrushKind::Custom | BrushKind::Image, _) => Err(BrushError::MissingTip(name.to_owned())),
            _ => Ok(()),
        }
    }
    /// Walk `trajectory` from `start`, stamping every `spacing` pixels.
    #[must_use]
    pub fn stroke(
        &self,
        fields: &FlowFields,
        start: Point,
        trajectory: Trajectory<'_>,
        rng: &mut Random,
    ) -> Vec<Dab> {
        let total = trajectory.length();
        if !(total > 0.0) || !total.is_finite() {
            return Vec::new();
        }
        let spacing = self.spacing.max(MIN_SPACING);
        let steps = az::saturating_cast::<f32, usize>((total / spacing - 1e-3).ceil()).max(1);
        #[allow(clippy::cast_precision_loss)]
        let advance = total / steps as f32;

        let mut position = Position::new(start.x, start.y);
        let mut dabs = Vec::new();
        for step in 1..=steps {
            let from = position.point();
            let plot_pressure = match trajectory {
                Trajectory::Line {
                    heading,
                    follow_field,
                    ..
                } => {
                    position.move_to(fields, advance, heading, advance, follow_field);
                    1.0
                }
                Trajectory::Plot { plot, scale } => {
                    position.plot_to(fields, plot, advance, advance, scale);
                    plot.pressure(position.plotted())
                }
            };
            #[allow(clippy::cast_precision_loss)]
            let progress = step as f32 / steps as f32;
            let pressure = self.pressure.at(progress) * plot_pressure;
            let to = position.point();
            self.stamp(to, heading(from, to), pressure, rng, &mut dabs);
        }
        dabs
    }
    /// Dabs for a single stamp at `at`, travelling towards `travel` degrees.
    pub fn stamp(
        &self,
        at: Point,
        travel: f32,
        pressure: f32,
        rng: &mut Random,
        out: &mut Vec<Dab>,
    ) {
        let size = self.weight * pressure;
        if !(size > 0.0) {
            return;
        }
        let angle = match self.rotate {
            Rotation::None => 0.0,
            Rotation::Random => rng.range(0.0, 360.0),
            Rotation::Natural => travel,
        };
        let jitter = self.vibration * pressure;
        match (self.kind, &self.tip) {
            (BrushKind::Default, _) => {
                let dots = az::saturating_cast::<f32, usize>(self.quality.cbrt().round()).max(1);
                for _ in 0..dots {
                    let offset = Point::new(rng.gaussian(0.0, jitter), rng.gaussian(0.0, jitter));
                    out.push(Dab::Disc {
                        center: at + offset * 0.5,
                        radius: size * 0.5 * rng.range(0.6, 1.0),
                        alpha: self.opacity
                            * (self.definition + (1.0 - self.definition) * rng.next()),
                    });
                }
            }
            (BrushKind::Spray, _) => {
                let count = az::saturating_cast::<f32, usize>(self.quality * pressure).max(1);
                for _ in 0..count {
                    let center = at + Point::new(rng.gaussian(0.0, jitter), rng.gaussian(0.0, jitter));
                    let side = self.weight * rng.range(0.5, 1.0);
                    out.push(Dab::Quad {
                        corners: square(center, side, angle),
                        alpha: self.opacity,
                    });
                }
            }
            (BrushKind::Custom, Some(Tip::Custom(draw))) => {
                let mut tip = TipBuilder::default();
                draw(&mut tip, pressure);
                let center = at + Point::new(rng.range(-jitter, jitter), rng.range(-jitter, jitter));
                let place = |p: Point| center + (p * size).rotated(angle);
                for shape in tip.shapes {
                    out.push(match shape {
                        TipShape::Rect { x, y, w, h } => Dab::Quad {
                            corners: [
                                place(Point::new(x, y)),
                                place(Point::new(x + w, y)),
                                place(Point::new(x + w, y + h)),
                                place(Point::new(x, y + h)),
                            ],
                            alpha: self.opacity,
                        },
                        TipShape::Disc { x, y, radius } => Dab::Disc {
                            center: place(Point::new(x, y)),
                            radius: radius * size,
                            alpha: self.opacity,
                        },
                    });
                }
            }
            (BrushKind::Image, Some(Tip::Image(image))) => out.push(Dab::Image {
                tip: Arc::clone(image),
                center: at,
                size,
                angle,
                alpha: self.opacity,
            }),
            // Tip-less custom and image brushes fall back to a plain marker.
            (BrushKind::Marker | BrushKind::Custom | BrushKind::Image, _) => out.push(Dab::Disc {
                center: at + Point::new(rng.range(-jitter, jitter), rng.range(-jitter, jitter)),
                radius: size * 0.5,
                alpha: self.opacity,
            }),
        }
    }
}

fn square(center: Point, side: f32, angle: f32) -> [Point; 4] {
    let h = side * 0.5;
    [
        Point::new(-h, -h),
        Point::new(h, -h),
        Point::new(h, h),
        Point::new(-h, h),
    ]
    .map(|corner| center + corner.rotated(angle))
}

/// Brushes by name.
#[derive(Clone, Debug, Default)]
pub struct BrushRegistry {
    brushes: hashbrown::HashMap<String, BrushDescriptor>,
}

impl BrushRegistry {
    /// A registry holding the standard set.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        for (name, brush) in standard_brushes() {
            // Standard brushes are valid, re-validating keeps a single code path.
            if let Err(err) = registry.add(name, brush) {
                log::error!("standard brush rejected: {err}");
            }
        }
        registry
    }
    /// Register or replace a brush.
    /// # Errors
    /// The descriptor is rejected if [`BrushDescriptor::validate`] fails.
    pub fn add(&mut self, name: impl Into<String>, brush: BrushDescriptor) -> Result<(), BrushError> {
        let name = name.into();
        brush.validate(&name)?;
        log::debug!("registered brush {name:?} ({})", brush.kind);
        self.brushes.insert(name, brush);
        Ok(())
    }
    /// # Errors
    /// [`BrushError::UnknownBrush`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&BrushDescriptor, BrushError> {
        self.brushes
            .get(name)
            .ok_or_else(|| BrushError::UnknownBrush(name.to_owned()))
    }
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.brushes.contains_key(name)
    }
    /// Sorted brush names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.brushes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
    /// Resize every brush, e.g. for a canvas with a different pixel density.
    pub fn scale_all(&mut self, factor: f32) {
        if !(factor > 0.0) || !factor.is_finite() {
            log::warn!("ignoring brush scale {factor}");
            return;
        }
        for brush in self.brushes.values_mut() {
            brush.weight *= factor;
            brush.vibration *= factor;
            brush.spacing *= factor;
        }
    }
}

#[allow(clippy::too_many_lines)]
fn standard_brushes() -> Vec<(&'static str, BrushDescriptor)> {
    #[allow(clippy::too_many_arguments)]
    fn pencil(
        weight: f32,
        vibration: f32,
        definition: f32,
        quality: f32,
        opacity: u8,
        spacing: f32,
        curve: [f32; 2],
        min_max: [f32; 2],
    ) -> BrushDescriptor {
        BrushDescriptor {
            weight,
            vibration,
            definition,
            quality,
            opacity: f32::from(opacity) / 255.0,
            spacing,
            pressure: Pressure::Standard { curve, min_max },
            kind: BrushKind::Default,
            rotate: Rotation::None,
            tip: None,
        }
    }
    let spray = BrushDescriptor {
        kind: BrushKind::Spray,
        ..pencil(0.3, 12.0, 15.0, 40.0, 120, 0.65, [0.0, 0.1], [0.15, 1.2])
    };
    let marker = BrushDescriptor {
        kind: BrushKind::Marker,
        ..pencil(2.5, 0.08, 0.5, 4.0, 30, 0.4, [0.35, 0.25], [1.5, 1.0])
    };
    let marker2 = BrushDescriptor {
        kind: BrushKind::Custom,
        rotate: Rotation::Natural,
        tip: Some(Tip::Custom(Arc::new(|tip: &mut TipBuilder, _pressure: f32| {
            tip.rect(-1.5, -1.5, 3.0, 3.0);
            tip.rect(1.0, 1.0, 1.0, 1.0);
        }))),
        ..pencil(2.5, 0.08, 0.5, 4.0, 23, 0.6, [0.35, 0.25], [1.35, 1.0])
    };
    vec![
        ("pen", pencil(0.4, 0.35, 0.5, 8.0, 180, 0.3, [0.15, 0.2], [1.4, 0.9])),
        ("rotring", pencil(0.2, 0.05, 0.5, 300.0, 250, 0.15, [0.05, 0.2], [1.2, 0.95])),
        ("2B", pencil(0.4, 0.45, 0.1, 9.0, 150, 0.2, [0.15, 0.2], [1.5, 1.0])),
        ("HB", pencil(0.5, 0.5, 0.4, 4.0, 100, 0.25, [0.15, 0.2], [1.5, 1.0])),
        ("2H", pencil(0.4, 0.4, 0.3, 2.0, 100, 0.4, [0.15, 0.2], [1.2, 1.0])),
        ("cpencil", pencil(0.4, 0.6, 0.8, 7.0, 120, 0.15, [0.15, 0.2], [0.95, 1.2])),
        ("charcoal", pencil(0.35, 1.5, 0.5, 300.0, 110, 0.07, [0.15, 0.2], [1.3, 0.8])),
        ("hatch_brush", pencil(0.2, 0.4, 0.3, 2.0, 150, 0.15, [0.5, 0.7], [1.2, 0.9])),
        ("spray", spray),
        ("marker", marker),
        ("marker2", marker2),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::field::DEFAULT_RESOLUTION;
    use crate::plot::PlotKind;

    fn fields() -> FlowFields {
        FlowFields::new(200.0, 200.0, DEFAULT_RESOLUTION)
    }
    #[test]
    fn standard_pressure() {
        let pressure = Pressure::Standard {
            curve: [0.2, 0.5],
            min_max: [2.0, 1.0],
        };
        assert!((pressure.at(0.5) - 1.0).abs() < 1e-6);
        // Ends: raw = 1 - 0.2 = 0.8, 2.0 + (1.0 - 2.0) * 0.8
        assert!((pressure.at(0.0) - 1.2).abs() < 1e-6);
        assert!((pressure.at(1.0) - 1.2).abs() < 1e-6);
        assert!((pressure.at(7.0) - 1.2).abs() < 1e-6);

        let flat = Pressure::Standard {
            curve: [0.0, 0.1],
            min_max: [0.15, 1.2],
        };
        assert!((flat.at(0.1) - 1.2).abs() < 1e-6);
        let custom = Pressure::Custom {
            min_max: [0.0, 10.0],
            curve: Arc::new(|t: f32| t),
        };
        assert!((custom.at(0.25) - 2.5).abs() < 1e-6);
    }
    #[test]
    fn registry_defaults() {
        let mut registry = BrushRegistry::with_defaults();
        assert_eq!(registry.names().len(), 11);
        assert!(registry.contains("2B"));
        assert_eq!(
            registry.get("crayon").unwrap_err(),
            BrushError::UnknownBrush("crayon".to_owned())
        );
        let before = registry.get("pen").unwrap().weight;
        registry.scale_all(2.0);
        assert!((registry.get("pen").unwrap().weight - before * 2.0).abs() < 1e-6);
    }
    #[test]
    fn tipless_custom_rejected() {
        let mut registry = BrushRegistry::default();
        let mut brush = BrushRegistry::with_defaults().get("marker").unwrap().clone();
        brush.kind = BrushKind::Image;
        assert_eq!(
            registry.add("stamp", brush.clone()),
            Err(BrushError::MissingTip("stamp".to_owned()))
        );
        brush.kind = BrushKind::Marker;
        brush.opacity = f32::NAN;
        assert!(matches!(
            registry.add("stamp", brush),
            Err(BrushError::InvalidParameter {
                parameter: "opacity",
                ..
            })
        ));
    }
    #[test]
    fn marker_line() {
        let registry = BrushRegistry::with_defaults();
        let mut marker = registry.get("marker").unwrap().clone();
        marker.spacing = 1.0;
        marker.vibration = 0.0;
        let mut rng = Random::new(3);
        let dabs = marker.stroke(
            &fields(),
            Point::new(10.0, 50.0),
            Trajectory::Line {
                length: 10.0,
                heading: 0.0,
                follow_field: false,
            },
            &mut rng,
        );
        assert_eq!(dabs.len(), 10);
        let Some(Dab::Disc { center, .. }) = dabs.last() else {
            panic!("marker should stamp discs");
        };
        assert!((center.x - 20.0).abs() < 1e-3);
        assert!((center.y - 50.0).abs() < 1e-3);
    }
    #[test]
    fn zero_length_is_empty() {
        let registry = BrushRegistry::with_defaults();
        let mut rng = Random::new(3);
        let dabs = registry.get("pen").unwrap().stroke(
            &fields(),
            Point::ZERO,
            Trajectory::Line {
                length: 0.0,
                heading: 0.0,
                follow_field: false,
            },
            &mut rng,
        );
        assert!(dabs.is_empty());
    }
    #[test]
    fn custom_tip_follows_travel() {
        let registry = BrushRegistry::with_defaults();
        let mut marker2 = registry.get("marker2").unwrap().clone();
        marker2.vibration = 0.0;
        let mut rng = Random::new(3);
        let mut dabs = Vec::new();
        // Heading 90 is straight up the screen.
        marker2.stamp(Point::new(50.0, 50.0), 90.0, 1.0, &mut rng, &mut dabs);
        assert_eq!(dabs.len(), 2);
        let Dab::Quad { corners, .. } = &dabs[0] else {
            panic!("rect tips stamp quads");
        };
        // A 3x3 rect scaled by weight 2.5 is still 7.5 across after turning.
        assert!((corners[0].distance(corners[1]) - 7.5).abs() < 1e-3);
    }
    #[test]
    fn plot_trajectory_scales() {
        let registry = BrushRegistry::with_defaults();
        let mut marker = registry.get("marker").unwrap().clone();
        marker.spacing = 1.0;
        let mut plot = Plot::new(PlotKind::Segments);
        plot.add_segment(0.0, 10.0, 1.0, true);
        plot.end_plot(0.0, 1.0, true);
        let mut rng = Random::new(3);
        let dabs = marker.stroke(
            &fields(),
            Point::new(20.0, 20.0),
            Trajectory::Plot {
                plot: &plot,
                scale: 2.0,
            },
            &mut rng,
        );
        assert_eq!(dabs.len(), 20);
    }
    #[test]
    fn tip_image_sampling() {
        assert!(TipImage::new(2, 2, vec![0.0; 3]).is_none());
        let image = TipImage::new(2, 1, vec![0.25, 1.0]).unwrap();
        assert_eq!(image.sample(0.1, 0.5), 0.25);
        assert_eq!(image.sample(0.9, 0.5), 1.0);
        assert_eq!(image.sample(1.5, 0.5), 0.0);
    }
}
