use serde::{Deserialize, Serialize};

/// A point in the plane, either in screen space or in normalized model space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    fn offset_by(&self, direction: Point, length: f64) -> Point {
        Point::new(self.x + direction.x * length, self.y + direction.y * length)
    }
}

/// A line in Hessian normal form: every point `p` on it satisfies `normal · p = offset`,
/// with `normal` of unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalLine {
    normal: Point,
    offset: f64,
}

impl NormalLine {
    /// Builds the line whose normal makes `angle_degrees` with the x axis and which lies
    /// `distance` away from `origin` along that normal.
    ///
    /// The angle is measured counter-clockwise as seen on a screen, where y grows
    /// downwards, so the normal is `(cos(-θ), sin(-θ))`.
    pub fn from_polar(origin: Point, angle_degrees: f64, distance: f64) -> Self {
        let radians = -angle_degrees.to_radians();
        let normal = Point::new(radians.cos(), radians.sin());

        Self {
            normal,
            offset: normal.dot(&origin) + distance,
        }
    }

    /// Builds the zero set of `bias + wx·x + wy·y`.
    ///
    /// # Returns
    /// `None` when both weights are zero, since no line is described then.
    pub fn from_weights(bias: f64, wx: f64, wy: f64) -> Option<Self> {
        let magnitude = wx.hypot(wy);
        if magnitude == 0.0 || !magnitude.is_finite() {
            return None;
        }

        Some(Self {
            normal: Point::new(wx / magnitude, wy / magnitude),
            offset: -bias / magnitude,
        })
    }

    pub fn normal(&self) -> Point {
        self.normal
    }

    /// Signed distance from the coordinate origin to the line.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// The point of the line closest to `p`.
    pub fn project(&self, p: Point) -> Point {
        p.offset_by(self.normal, self.offset - self.normal.dot(&p))
    }

    /// The point of the line closest to the coordinate origin.
    pub fn foot(&self) -> Point {
        self.project(Point::ORIGIN)
    }

    /// A drawable segment of length `2 * half_length` centered on the projection of `center`.
    pub fn segment(&self, center: Point, half_length: f64) -> (Point, Point) {
        let mid = self.project(center);
        let direction = Point::new(-self.normal.y, self.normal.x);

        (
            mid.offset_by(direction, half_length),
            mid.offset_by(direction, -half_length),
        )
    }
}
