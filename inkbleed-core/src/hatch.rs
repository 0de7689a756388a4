//! Hatching: parallel strokes clipped to a set of polygons.

use crate::polygon::{Bounds, Polygon, Segment};
use crate::random::Random;
use crate::util::{map, Point};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct HatchOptions {
    /// Endpoint jitter, as a multiple of spacing. Zero disables.
    pub rand: f32,
    /// Join the end of each hatch line to the start of the next.
    pub continuous: bool,
    /// Spacing growth from one line to the next, `0..=1`.
    pub gradient: f32,
}

/// Hatch `polygons` with lines `spacing` apart at `angle` degrees.
///
/// Intersections along each sweep line are paired up, inside-outside, so holes and concave
/// outlines are respected as long as the outlines are closed.
pub fn hatch(
    polygons: &[&Polygon],
    spacing: f32,
    angle: f32,
    options: HatchOptions,
    rng: &mut Random,
) -> Vec<Segment> {
    let Some(bounds) = polygons
        .iter()
        .filter(|p| !p.is_degenerate())
        .map(|p| p.bounds())
        .reduce(Bounds::union)
    else {
        return Vec::new();
    };
    if !(spacing > 0.0) {
        return Vec::new();
    }
    let direction = Point::from_heading(angle.rem_euclid(180.0));
    let normal = Point::new(-direction.y, direction.x);
    let project = |p: Point, axis: Point| p.x * axis.x + p.y * axis.y;

    let corners = bounds.corners();
    let (low, high) = corners
        .iter()
        .map(|&c| project(c, normal))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    let center = bounds.center();
    let along = project(center, direction);
    let reach = bounds.width().hypot(bounds.height());
    let growth = if options.gradient > 0.0 {
        map(options.gradient, 0.0, 1.0, 1.0, 1.1, true)
    } else {
        1.0
    };

    // Intersections per sweep line, sorted along the line.
    let mut rows: Vec<Vec<Point>> = Vec::new();
    let mut offset = low + spacing * 0.5;
    let mut gap = spacing;
    while offset <= high {
        let mid = normal * offset + direction * along;
        let line = Segment::new(mid - direction * reach, mid + direction * reach);
        let mut hits: Vec<Point> = polygons
            .iter()
            .flat_map(|p| p.intersect(line))
            .collect();
        hits.sort_by(|a, b| project(*a, direction).total_cmp(&project(*b, direction)));
        if !hits.is_empty() {
            rows.push(hits);
        }
        offset += gap;
        gap *= growth;
    }

    let mut segments = Vec::new();
    let mut previous_end: Option<Point> = None;
    for row in &mut rows {
        let mut first_start = None;
        let mut last_end = None;
        for pair in row.chunks_exact_mut(2) {
            if options.rand != 0.0 {
                for p in pair.iter_mut() {
                    p.x += options.rand * spacing * rng.range(-1.0, 1.0);
                    p.y += options.rand * spacing * rng.range(-1.0, 1.0);
                }
            }
            let segment = Segment::new(pair[0], pair[1]);
            first_start.get_or_insert(segment.a);
            last_end = Some(segment.b);
            segments.push(segment);
        }
        if options.continuous {
            if let (Some(end), Some(start)) = (previous_end, first_start) {
                segments.push(Segment::new(end, start));
            }
        }
        if last_end.is_some() {
            previous_end = last_end;
        }
    }
    segments
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn square_horizontal() {
        let square = Polygon::from_rect(0.0, 0.0, 100.0, 100.0);
        let mut rng = Random::new(0);
        let lines = hatch(&[&square], 10.0, 0.0, HatchOptions::default(), &mut rng);
        assert_eq!(lines.len(), 10);
        for line in &lines {
            assert!((line.length() - 100.0).abs() < 1e-3);
            assert!((line.a.y - line.b.y).abs() < 1e-3);
        }
    }
    #[test]
    fn continuous_joins_rows() {
        let square = Polygon::from_rect(0.0, 0.0, 100.0, 100.0);
        let mut rng = Random::new(0);
        let options = HatchOptions {
            continuous: true,
            ..HatchOptions::default()
        };
        let lines = hatch(&[&square], 10.0, 45.0, options, &mut rng);
        let plain = hatch(&[&square], 10.0, 45.0, HatchOptions::default(), &mut rng);
        assert_eq!(lines.len(), plain.len() * 2 - 1);
    }
    #[test]
    fn gradient_spreads_lines() {
        let square = Polygon::from_rect(0.0, 0.0, 100.0, 100.0);
        let mut rng = Random::new(0);
        let even = hatch(&[&square], 5.0, 90.0, HatchOptions::default(), &mut rng);
        let spread = hatch(
            &[&square],
            5.0,
            90.0,
            HatchOptions {
                gradient: 1.0,
                ..HatchOptions::default()
            },
            &mut rng,
        );
        assert!(spread.len() < even.len());
    }
    #[test]
    fn rows_through_vertices() {
        let diamond = Polygon::new(vec![
            Point::new(50.0, 0.0),
            Point::new(100.0, 50.0),
            Point::new(50.0, 100.0),
            Point::new(0.0, 50.0),
        ]);
        let mut rng = Random::new(0);
        let lines = hatch(&[&diamond], 20.0, 0.0, HatchOptions::default(), &mut rng);
        let mut lengths: Vec<f32> = lines.iter().map(Segment::length).collect();
        lengths.sort_by(f32::total_cmp);
        assert_eq!(lines.len(), 5);
        assert!((lengths[4] - 100.0).abs() < 1e-2);
        for line in &lines {
            assert!(line.length() > 1.0);
            let middle = (line.a + line.b) * 0.5;
            assert!(diamond.contains(middle));
        }
    }
    #[test]
    fn nothing_to_hatch() {
        let mut rng = Random::new(0);
        let line = Polygon::new(vec![Point::ZERO, Point::new(5.0, 5.0)]);
        assert!(hatch(&[&line], 5.0, 0.0, HatchOptions::default(), &mut rng).is_empty());
        assert!(hatch(&[], 5.0, 0.0, HatchOptions::default(), &mut rng).is_empty());
    }
}
