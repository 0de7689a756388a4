//! Vertex loops and the segment intersection tests hatching and filling are built on.

use crate::util::Point;
use smallvec::SmallVec;

/// A straight segment between two points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    pub a: Point,
    pub b: Point,
}
impl Segment {
    #[must_use]
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }
    #[must_use]
    pub fn length(&self) -> f32 {
        self.a.distance(self.b)
    }
    /// Bit-exact key, for caching.
    fn key(&self) -> [u32; 4] {
        [
            self.a.x.to_bits(),
            self.a.y.to_bits(),
            self.b.x.to_bits(),
            self.b.y.to_bits(),
        ]
    }
}

/// Axis-aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}
impl Bounds {
    /// Smallest box containing all points, `None` if there are none.
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(
            Self {
                min: first,
                max: first,
            },
            |b, p| Self {
                min: Point::new(b.min.x.min(p.x), b.min.y.min(p.y)),
                max: Point::new(b.max.x.max(p.x), b.max.y.max(p.y)),
            },
        ))
    }
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
    #[must_use]
    pub fn center(&self) -> Point {
        self.min.lerp(self.max, 0.5)
    }
    #[must_use]
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

fn cross(a: Point, b: Point) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Intersection of the infinite lines through `a1, a2` and `b1, b2`. `None` if parallel.
#[must_use]
pub fn line_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let da = a2 - a1;
    let db = b2 - b1;
    let denominator = cross(da, db);
    if denominator.abs() <= f32::EPSILON * da.length() * db.length() {
        return None;
    }
    let t = cross(b1 - a1, db) / denominator;
    Some(a1 + da * t)
}

/// Intersection of two segments, endpoints inclusive. With `extend_first`, `first` is treated
/// as an infinite line.
#[must_use]
pub fn intersect_segments(first: Segment, second: Segment, extend_first: bool) -> Option<Point> {
    let da = first.b - first.a;
    let db = second.b - second.a;
    let denominator = cross(da, db);
    if denominator.abs() <= f32::EPSILON * da.length() * db.length() {
        return None;
    }
    let offset = second.a - first.a;
    let t = cross(offset, db) / denominator;
    let u = cross(offset, da) / denominator;
    let within = |v: f32| (0.0..=1.0).contains(&v);
    if within(u) && (extend_first || within(t)) {
        Some(first.a + da * t)
    } else {
        None
    }
}

/// A closed loop of vertices.
pub struct Polygon {
    vertices: Vec<Point>,
    bounds: Option<Bounds>,
    /// Results of [`Polygon::intersect`], keyed by the query segment.
    cache: parking_lot::Mutex<hashbrown::HashMap<[u32; 4], SmallVec<[Point; 4]>>>,
}

impl Clone for Polygon {
    fn clone(&self) -> Self {
        Self::new(self.vertices.clone())
    }
}
impl std::fmt::Debug for Polygon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Polygon")
            .field("vertices", &self.vertices)
            .finish_non_exhaustive()
    }
}
impl PartialEq for Polygon {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices
    }
}

impl Polygon {
    #[must_use]
    pub fn new(vertices: Vec<Point>) -> Self {
        let bounds = Bounds::from_points(vertices.iter().copied());
        Self {
            vertices,
            bounds,
            cache: parking_lot::Mutex::default(),
        }
    }
    #[must_use]
    pub fn from_rect(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::new(vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ])
    }
    #[must_use]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
    /// Can this enclose any area?
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }
    /// Edges, including the closing edge from the last vertex back to the first.
    pub fn sides(&self) -> impl Iterator<Item = Segment> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| Segment::new(self.vertices[i], self.vertices[(i + 1) % n]))
    }
    /// Bounding box, degenerate at the origin for an empty polygon.
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds.unwrap_or(Bounds {
            min: Point::ZERO,
            max: Point::ZERO,
        })
    }
    /// Vertex average.
    #[must_use]
    pub fn centroid(&self) -> Point {
        if self.vertices.is_empty() {
            return Point::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.vertices.len() as f32;
        let sum = self
            .vertices
            .iter()
            .fold(Point::ZERO, |acc, &v| acc + v);
        sum * (1.0 / n)
    }
    /// Even-odd containment test.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        if !self.bounds().contains(p) {
            return false;
        }
        let mut inside = false;
        for side in self.sides() {
            let (a, b) = (side.a, side.b);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }
    /// Every point where `segment` crosses an edge. Results are cached per query.
    ///
    /// An edge counts when its endpoints lie on opposite sides of the query line, a vertex on the
    /// line belonging to the side below it. A crossing through a vertex is reported once, and a
    /// vertex that only touches the line is reported twice or not at all, so hits always pair up
    /// inside-outside.
    pub fn intersect(&self, segment: Segment) -> SmallVec<[Point; 4]> {
        let key = segment.key();
        if let Some(hit) = self.cache.lock().get(&key) {
            return hit.clone();
        }
        let direction = segment.b - segment.a;
        let reach = direction.x * direction.x + direction.y * direction.y;
        let points: SmallVec<[Point; 4]> = if reach > 0.0 {
            self.sides()
                .filter_map(|side| {
                    let above_a = cross(direction, side.a - segment.a);
                    let above_b = cross(direction, side.b - segment.a);
                    if (above_a > 0.0) == (above_b > 0.0) {
                        return None;
                    }
                    let hit = side.a + (side.b - side.a) * (above_a / (above_a - above_b));
                    let offset = hit - segment.a;
                    let t = (offset.x * direction.x + offset.y * direction.y) / reach;
                    (0.0..=1.0).contains(&t).then_some(hit)
                })
                .collect()
        } else {
            SmallVec::new()
        };
        self.cache.lock().insert(key, points.clone());
        points
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn segment_crossings() {
        let a = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = Segment::new(Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        let hit = intersect_segments(a, b, false).unwrap();
        assert!((hit.x - 5.0).abs() < 1e-5 && (hit.y - 5.0).abs() < 1e-5);

        let short = Segment::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        assert!(intersect_segments(short, b, false).is_none());
        assert!(intersect_segments(short, b, true).is_some());

        let parallel = Segment::new(Point::new(0.0, 1.0), Point::new(10.0, 11.0));
        assert!(intersect_segments(a, parallel, true).is_none());
        assert!(line_intersection(a.a, a.b, parallel.a, parallel.b).is_none());
    }
    #[test]
    fn square_queries() {
        let square = Polygon::from_rect(0.0, 0.0, 100.0, 100.0);
        assert_eq!(square.sides().count(), 4);
        assert_eq!(square.centroid(), Point::new(50.0, 50.0));
        assert!(square.contains(Point::new(10.0, 90.0)));
        assert!(!square.contains(Point::new(-1.0, 50.0)));

        let across = Segment::new(Point::new(-10.0, 50.0), Point::new(110.0, 50.0));
        let hits = square.intersect(across);
        assert_eq!(hits.len(), 2);
        // Cached result is identical.
        assert_eq!(square.intersect(across), hits);
        let miss = Segment::new(Point::new(-10.0, 150.0), Point::new(110.0, 150.0));
        assert!(square.intersect(miss).is_empty());
    }
    #[test]
    fn vertex_crossings_pair_up() {
        let diamond = Polygon::new(vec![
            Point::new(50.0, 0.0),
            Point::new(100.0, 50.0),
            Point::new(50.0, 100.0),
            Point::new(0.0, 50.0),
        ]);
        // Through two vertices at once.
        let widest = Segment::new(Point::new(-10.0, 50.0), Point::new(110.0, 50.0));
        let mut hits = diamond.intersect(widest);
        hits.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_eq!(hits.len(), 2);
        assert!((hits[0].x - 0.0).abs() < 1e-4 && (hits[1].x - 100.0).abs() < 1e-4);
        // Only touching the top vertex.
        let touch = Segment::new(Point::new(-10.0, 0.0), Point::new(110.0, 0.0));
        assert_eq!(diamond.intersect(touch).len() % 2, 0);

        // A concave notch whose inner vertex sits on the query line.
        let notched = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(50.0, 50.0),
            Point::new(0.0, 100.0),
        ]);
        let through = Segment::new(Point::new(-10.0, 50.0), Point::new(110.0, 50.0));
        assert_eq!(notched.intersect(through).len() % 2, 0);
    }
    #[test]
    fn empty_polygon() {
        let empty = Polygon::new(Vec::new());
        assert!(empty.is_degenerate());
        assert_eq!(empty.sides().count(), 0);
        assert!(!empty.contains(Point::ZERO));
    }
}
