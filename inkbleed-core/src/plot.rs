//! # Plots
//!
//! A stroke path described by headings and lengths rather than coordinates, with a pressure
//! sample per segment. Angle and pressure are functions of arc length, so the same plot can be
//! walked at any scale, flowed through a field, or polygonized into an irregular outline.

use crate::field::FlowFields;
use crate::polygon::{line_intersection, Polygon};
use crate::position::Position;
use crate::random::Random;
use crate::util::{heading, map, wrap_degrees, Point};

/// Polygonization walk step, in pixels.
const POLYGON_STEP: f32 = 0.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PlotKind {
    /// Angle and pressure are constant along each segment.
    Segments,
    /// Angle and pressure interpolate linearly from each segment's start value to the next's.
    Curve,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Plot {
    kind: PlotKind,
    segments: Vec<f32>,
    /// Start angle of each segment, plus the terminal angle. Degrees in `[0, 360)`.
    angles: Vec<f32>,
    /// Start pressure of each segment, plus the terminal pressure.
    pressures: Vec<f32>,
    length: f32,
    rotation: f32,
}

impl Plot {
    #[must_use]
    pub fn new(kind: PlotKind) -> Self {
        Self {
            kind,
            segments: Vec::new(),
            angles: Vec::new(),
            pressures: Vec::new(),
            length: 0.0,
            rotation: 0.0,
        }
    }
    #[must_use]
    pub fn kind(&self) -> PlotKind {
        self.kind
    }
    /// Total arc length, always the sum of [`Self::segments`].
    #[must_use]
    pub fn length(&self) -> f32 {
        self.length
    }
    #[must_use]
    pub fn segments(&self) -> &[f32] {
        &self.segments
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
    fn normalize(angle: f32, degrees: bool) -> f32 {
        wrap_degrees(if degrees { angle } else { angle.to_degrees() })
    }
    /// Append a segment travelling `length` at `angle` (radians unless `degrees`).
    pub fn add_segment(&mut self, angle: f32, length: f32, pressure: f32, degrees: bool) {
        let angle = Self::normalize(angle, degrees);
        let length = if length.is_finite() { length.max(0.0) } else { 0.0 };
        // Drop the provisional terminal values.
        self.angles.truncate(self.segments.len());
        self.pressures.truncate(self.segments.len());

        self.segments.push(length);
        self.angles.extend_from_slice(&[angle, angle]);
        self.pressures.extend_from_slice(&[pressure, pressure]);
        self.length = self.segments.iter().sum();
    }
    /// Fix the terminal angle and pressure.
    pub fn end_plot(&mut self, angle: f32, pressure: f32, degrees: bool) {
        if self.segments.is_empty() {
            return;
        }
        let angle = Self::normalize(angle, degrees);
        if let Some(last) = self.angles.last_mut() {
            *last = angle;
        }
        if let Some(last) = self.pressures.last_mut() {
            *last = pressure;
        }
    }
    /// Offset every sampled angle, in degrees.
    pub fn rotate(&mut self, degrees: f32) {
        self.rotation = degrees;
    }
    #[must_use]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }
    /// Segment containing arc length `d` and the arc length where it starts.
    /// Lengths past either end resolve to the first or last segment.
    #[must_use]
    pub fn calc_index(&self, d: f32) -> (usize, f32) {
        let mut start = 0.0;
        let last = self.segments.len().saturating_sub(1);
        for (i, &segment) in self.segments.iter().enumerate() {
            if d < start + segment || i == last {
                return (i, start);
            }
            start += segment;
        }
        (0, 0.0)
    }
    /// Heading at arc length `d`, in degrees.
    #[must_use]
    pub fn angle(&self, d: f32) -> f32 {
        if self.segments.is_empty() {
            return self.rotation;
        }
        let (i, start) = self.calc_index(d);
        let angle = match self.kind {
            PlotKind::Segments => self.angles[i],
            PlotKind::Curve => {
                let (mut from, mut to) = (self.angles[i], self.angles[i + 1]);
                // Turn the short way around.
                if (to - from).abs() > 180.0 {
                    if from > to {
                        from -= 360.0;
                    } else {
                        to -= 360.0;
                    }
                }
                map(d - start, 0.0, self.segments[i], from, to, true)
            }
        };
        angle + self.rotation
    }
    /// Pressure at arc length `d`.
    #[must_use]
    pub fn pressure(&self, d: f32) -> f32 {
        if self.segments.is_empty() {
            return 1.0;
        }
        let (i, start) = self.calc_index(d);
        match self.kind {
            PlotKind::Segments => self.pressures[i],
            PlotKind::Curve => map(
                d - start,
                0.0,
                self.segments[i],
                self.pressures[i],
                self.pressures[i + 1],
                true,
            ),
        }
    }
    /// Walk the plot from `(x, y)` and emit an irregular outline. `side` controls vertex
    /// density as a fraction of each segment's length.
    #[must_use]
    pub fn gen_pol(
        &self,
        fields: &FlowFields,
        rng: &mut Random,
        x: f32,
        y: f32,
        scale: f32,
        side: f32,
    ) -> Polygon {
        if !(scale > 0.0 && scale.is_finite()) {
            return Polygon::new(Vec::new());
        }
        let steps = az::saturating_cast::<f32, usize>((self.length * scale / POLYGON_STEP).round());
        let mut position = Position::new(x, y);
        let mut vertices = Vec::new();
        let mut progress = 0.0;
        let mut next_index = 0;
        for _ in 0..steps {
            position.plot_to(fields, self, POLYGON_STEP, POLYGON_STEP, scale);
            let (index, _) = self.calc_index(position.plotted());
            progress += POLYGON_STEP;
            let entered = index >= next_index;
            if entered || progress >= self.segments[index] * scale * side * rng.range(0.7, 1.3) {
                vertices.push(position.point());
                progress = 0.0;
                if entered {
                    next_index = index + 1;
                }
            }
        }
        Polygon::new(vertices)
    }

    /// Closed circle of `radius` about `center`, starting at a random angle. When `irregular`,
    /// each quarter is lengthened by up to 20%.
    ///
    /// Returns the start point along with the plot.
    #[must_use]
    pub fn circle(center: Point, radius: f32, rng: &mut Random, irregular: bool) -> (Point, Self) {
        let quarter = std::f32::consts::PI * radius / 2.0;
        let start = rng.range(0.0, 360.0);
        let mut plot = Self::new(PlotKind::Curve);
        for k in 0..4u8 {
            let jitter = if irregular { 1.0 + 0.2 * rng.next() } else { 1.0 };
            plot.add_segment(start - 90.0 * f32::from(k), quarter * jitter, 1.0, true);
        }
        plot.end_plot(start - 360.0, 1.0, true);
        // Travel is clockwise on screen, so the center lies to the right of the start heading.
        let (sin, cos) = start.to_radians().sin_cos();
        (
            Point::new(center.x - radius * sin, center.y - radius * cos),
            plot,
        )
    }
    /// Clockwise arc from angle `start` to `end` (radians, measured clockwise from +x).
    ///
    /// `None` for an empty sweep or radius.
    #[must_use]
    pub fn arc(center: Point, radius: f32, start: f32, end: f32) -> Option<(Point, Self)> {
        let sweep = end - start;
        if !(sweep > 0.0 && sweep.is_finite() && radius > 0.0) {
            return None;
        }
        // Keep each piece under a half turn so interpolation can't take the short way round.
        let pieces =
            az::saturating_cast::<f32, u16>((sweep.to_degrees() / 90.0 - 1e-3).ceil()).max(1);
        let piece = sweep / f32::from(pieces);
        let mut plot = Self::new(PlotKind::Curve);
        for k in 0..pieces {
            let at = start + piece * f32::from(k);
            plot.add_segment(270.0 - at.to_degrees(), radius * piece, 1.0, true);
        }
        plot.end_plot(270.0 - end.to_degrees(), 1.0, true);
        let (sin, cos) = start.sin_cos();
        Some((
            Point::new(center.x + radius * cos, center.y + radius * sin),
            plot,
        ))
    }
    /// Smooth path through `points` (each with a pressure), rounding every corner with a circular
    /// arc. `curvature` in `[0, 1]` sets how much of each adjoining run an arc may consume; zero
    /// produces straight segments.
    ///
    /// `None` with fewer than two points.
    #[must_use]
    pub fn spline(points: &[(Point, f32)], curvature: f32) -> Option<(Point, Self)> {
        let [(first, _), .., (_, last_pressure)] = points else {
            return None;
        };
        let curvature = if curvature.is_finite() {
            curvature.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let kind = if curvature > 0.0 {
            PlotKind::Curve
        } else {
            PlotKind::Segments
        };
        let mut plot = Self::new(kind);
        // Length at the start of the current run already consumed by the previous corner.
        let mut consumed = 0.0;
        let mut last_heading = 0.0;
        for (i, pair) in points.windows(2).enumerate() {
            let [(p1, pressure), (p2, _)] = pair else {
                continue;
            };
            let run = p1.distance(*p2);
            let a1 = heading(*p1, *p2);
            last_heading = a1;
            let next = (kind == PlotKind::Curve).then(|| points.get(i + 2)).flatten();
            match next {
                Some((p3, corner_pressure)) => {
                    let a2 = heading(*p2, *p3);
                    let cut = curvature * 0.5 * (run - consumed).min(p2.distance(*p3));
                    let straight = (run - consumed - cut).max(0.0);
                    plot.add_segment(a1, straight, *pressure, true);
                    match corner_arc(*p2, a1, a2, cut) {
                        Some(arc) => {
                            plot.add_segment(a1, arc, *corner_pressure, true);
                            consumed = cut;
                        }
                        None => {
                            // Collinear or reversing: finish the run, turn in place.
                            plot.add_segment(a1, cut, *pressure, true);
                            plot.add_segment(a1, 0.0, *corner_pressure, true);
                            consumed = 0.0;
                        }
                    }
                }
                None => {
                    plot.add_segment(a1, (run - consumed).max(0.0), *pressure, true);
                    consumed = 0.0;
                }
            }
        }
        plot.end_plot(last_heading, *last_pressure, true);
        Some((*first, plot))
    }
}

/// Length of the arc rounding the corner at `corner`, tangent to both runs at distance `cut`.
fn corner_arc(corner: Point, incoming: f32, outgoing: f32, cut: f32) -> Option<f32> {
    let turn = wrap_degrees(outgoing - incoming);
    if cut <= f32::EPSILON || turn < 0.5 || turn > 359.5 {
        return None;
    }
    let into = Point::from_heading(incoming);
    let out = Point::from_heading(outgoing);
    let tangent_in = corner - into * cut;
    let tangent_out = corner + out * cut;
    let center = line_intersection(
        tangent_in,
        tangent_in + into.rotated(90.0),
        tangent_out,
        tangent_out + out.rotated(90.0),
    )?;
    let radius = tangent_in.distance(center);
    if radius <= f32::EPSILON {
        return None;
    }
    let chord = tangent_in.distance(tangent_out);
    let subtended = 2.0 * (chord / 2.0 / radius).min(1.0).asin();
    Some(radius * subtended)
}
