//! Small numeric and geometric helpers, used throughout the crate.
//!
//! Angles in this crate are in degrees with screen coordinates (y pointing down).
//! A heading of 0 points along +x, a heading of 90 points up the screen.

/// A point (or vector) in canvas pixel space.
#[derive(Copy, Clone, PartialEq, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}
impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
    #[must_use]
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }
    /// Unit vector in the same direction, or zero if degenerate.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
    /// Rotate this vector about the origin.
    #[must_use]
    pub fn rotated(self, degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
    /// Unit vector travelling along a heading.
    #[must_use]
    pub fn from_heading(degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(cos, -sin)
    }
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}
impl std::ops::Add for Point {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl std::ops::Sub for Point {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl std::ops::Mul<f32> for Point {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}
impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}
impl From<Point> for [f32; 2] {
    fn from(value: Point) -> Self {
        [value.x, value.y]
    }
}

/// Re-map `value` from the range `[in_min, in_max]` onto `[out_min, out_max]`,
/// optionally clamping to the output range.
///
/// A degenerate input range maps everything onto `out_min`.
#[must_use]
pub fn map(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32, clamp: bool) -> f32 {
    let span = in_max - in_min;
    if span.abs() <= f32::EPSILON {
        return out_min;
    }
    let mapped = out_min + (value - in_min) / span * (out_max - out_min);
    if clamp {
        if out_min < out_max {
            mapped.clamp(out_min, out_max)
        } else {
            mapped.clamp(out_max, out_min)
        }
    } else {
        mapped
    }
}

/// Heading (degrees) of travel from `from` towards `to`.
#[must_use]
pub fn heading(from: Point, to: Point) -> f32 {
    -(to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Wrap an angle into `[0, 360)`.
#[must_use]
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid may round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn map_clamps_both_directions() {
        assert!((map(5.0, 0.0, 10.0, 0.0, 1.0, false) - 0.5).abs() < 1e-6);
        assert!((map(20.0, 0.0, 10.0, 0.0, 1.0, true) - 1.0).abs() < 1e-6);
        // Descending output range
        assert!((map(20.0, 0.0, 10.0, 1.0, 0.0, true)).abs() < 1e-6);
        assert!((map(3.0, 1.0, 1.0, 7.0, 9.0, true) - 7.0).abs() < 1e-6);
    }
    #[test]
    fn heading_convention() {
        let origin = Point::ZERO;
        assert!(heading(origin, Point::new(1.0, 0.0)).abs() < 1e-4);
        // Up the screen is negative y.
        assert!((heading(origin, Point::new(0.0, -1.0)) - 90.0).abs() < 1e-4);
        let dir = Point::from_heading(90.0);
        assert!(dir.x.abs() < 1e-6 && (dir.y + 1.0).abs() < 1e-6);
    }
    #[test]
    fn wrap() {
        assert!((wrap_degrees(-10.0) - 350.0).abs() < 1e-4);
        assert!((wrap_degrees(725.0) - 5.0).abs() < 1e-4);
    }
}
