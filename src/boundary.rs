//! Decision boundary extraction.
//!
//! A classifier trained over `[1, x, y, <cross terms>]` separates the plane along the zero set of
//!
//! ```text
//! bias + a·x + b·y + c·x² + e·x·y + A·y² + d·x³
//! ```
//!
//! which is at most quadratic in `y`. The extractor walks `x` over a fixed grid and solves for `y`
//! at every sample, then assembles the roots into drawable polylines.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ensure_len, EngineError, Result},
    features::{CrossTerm, FeatureSet},
    geometry::Point,
};

/// Upper bound on the number of grid samples a [`BoundaryDomain`] may ask for.
pub const MAX_GRID_SAMPLES: usize = 1_000_000;

/// The `x` grid the discriminant is sampled on, in normalized space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryDomain {
    #[serde(default = "BoundaryDomain::default_from")]
    pub from: f64,
    #[serde(default = "BoundaryDomain::default_to")]
    pub to: f64,
    #[serde(default = "BoundaryDomain::default_step")]
    pub step: f64,
}

impl BoundaryDomain {
    fn default_from() -> f64 {
        -5.0
    }

    fn default_to() -> f64 {
        5.0
    }

    fn default_step() -> f64 {
        0.01
    }

    /// # Errors
    /// `InvalidInput` for an empty range, a non-positive step, or a grid of more than
    /// [`MAX_GRID_SAMPLES`] samples.
    pub fn validate(&self) -> Result<()> {
        if !(self.from.is_finite() && self.to.is_finite() && self.from < self.to) {
            return Err(EngineError::InvalidInput("boundary domain must be a finite, non-empty range"));
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(EngineError::InvalidInput("boundary step must be positive"));
        }
        let intervals = self.intervals();
        if !(intervals.is_finite() && intervals < MAX_GRID_SAMPLES as f64) {
            return Err(EngineError::InvalidInput("boundary grid has too many samples"));
        }
        Ok(())
    }

    fn intervals(&self) -> f64 {
        ((self.to - self.from) / self.step).round().max(1.0)
    }

    /// The grid points, both ends included.
    fn xs(&self) -> impl Iterator<Item = f64> + '_ {
        let intervals = self.intervals() as usize;
        (0..=intervals).map(move |i| self.from + (self.to - self.from) * i as f64 / intervals as f64)
    }
}

impl Default for BoundaryDomain {
    fn default() -> Self {
        Self {
            from: Self::default_from(),
            to: Self::default_to(),
            step: Self::default_step(),
        }
    }
}

/// The learned discriminant with inactive terms set to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Discriminant {
    pub bias: f64,
    pub x: f64,
    pub y: f64,
    pub xx: f64,
    pub xy: f64,
    pub yy: f64,
    pub xxx: f64,
    quadratic: bool,
}

impl Discriminant {
    /// Reads `coefficients` laid out as rows built from `features` are.
    ///
    /// # Errors
    /// `ShapeMismatch` if there isn't exactly one coefficient per feature column.
    pub fn new(coefficients: ArrayView1<f64>, features: &FeatureSet) -> Result<Self> {
        ensure_len("coefficients", coefficients.len(), features.row_len())?;

        let term = |t: CrossTerm| features.column_of(t).map_or(0.0, |i| coefficients[i]);

        Ok(Self {
            bias: coefficients[0],
            x: coefficients[1],
            y: coefficients[2],
            xx: term(CrossTerm::XX),
            xy: term(CrossTerm::XY),
            yy: term(CrossTerm::YY),
            xxx: term(CrossTerm::XXX),
            quadratic: features.contains(CrossTerm::YY),
        })
    }

    pub fn eval(&self, x: f64, y: f64) -> f64 {
        self.free_term(x) + self.linear_term(x) * y + self.yy * y * y
    }

    /// Everything that does not depend on `y`.
    fn free_term(&self, x: f64) -> f64 {
        self.bias + self.x * x + self.xx * x * x + self.xxx * x * x * x
    }

    /// The factor multiplying `y`.
    fn linear_term(&self, x: f64) -> f64 {
        self.y + self.xy * x
    }

    fn is_quadratic(&self) -> bool {
        self.quadratic && self.yy != 0.0
    }

    fn roots(&self, x: f64) -> Roots {
        let b = self.linear_term(x);
        let c = self.free_term(x);

        if !self.is_quadratic() {
            let y = -c / b;
            return if b != 0.0 && y.is_finite() {
                Roots::One(y)
            } else {
                Roots::None
            };
        }

        let a = self.yy;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return Roots::None;
        }

        // q carries the sign of b so that -b and sq never cancel; the other root comes from c / q
        let sq = disc.sqrt();
        let q = -0.5 * (b + b.signum() * sq);
        if q == 0.0 {
            return Roots::Two(0.0, 0.0);
        }

        let (far, near) = (q / a, c / q);
        let (upper, lower) = if b.is_sign_negative() {
            (far, near)
        } else {
            (near, far)
        };
        if upper.is_finite() && lower.is_finite() {
            Roots::Two(upper, lower)
        } else {
            Roots::None
        }
    }
}

enum Roots {
    None,
    One(f64),
    Two(f64, f64),
}

/// One continuous polyline of a decision boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BoundaryCurve {
    points: Vec<Point>,
}

impl BoundaryCurve {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// All the branches of a decision boundary, ordered by `x`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Boundary {
    pub curves: Vec<BoundaryCurve>,
}

impl Boundary {
    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}

/// A maximal run of consecutive solvable grid samples.
#[derive(Default)]
struct Interval {
    points: Vec<Point>,
    points_rev: Vec<Point>,
    closed_left: bool,
    closed_right: bool,
}

impl Interval {
    fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Turns a learned discriminant into drawable curves.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundaryExtractor {
    domain: BoundaryDomain,
}

impl BoundaryExtractor {
    pub fn new(domain: BoundaryDomain) -> Self {
        Self { domain }
    }

    pub fn domain(&self) -> &BoundaryDomain {
        &self.domain
    }

    /// Extracts the zero set of the discriminant described by `coefficients` and `features`.
    ///
    /// With a `y²` term every solvable `x` yields two roots that are recorded into two parallel
    /// branches. Where the roots meet, at the edge of a gap in the solvable region, the two
    /// branches get stitched into one path; where they run off the domain they are kept apart.
    ///
    /// # Errors
    /// `ShapeMismatch` if `coefficients` doesn't match `features`, `InvalidInput` for an invalid
    /// domain.
    pub fn extract(&self, coefficients: ArrayView1<f64>, features: &FeatureSet) -> Result<Boundary> {
        self.domain.validate()?;
        let discriminant = Discriminant::new(coefficients, features)?;

        let curves = self
            .intervals(&discriminant)
            .into_iter()
            .flat_map(assemble)
            .filter(|curve| !curve.is_empty())
            .collect();

        Ok(Boundary { curves })
    }

    fn intervals(&self, discriminant: &Discriminant) -> Vec<Interval> {
        let mut intervals = Vec::new();
        let mut current = Interval::default();
        let mut gap_before = false;
        let mut prev_sign: Option<bool> = None;

        for x in self.domain.xs() {
            // a sign change of the y factor between two samples is a vertical asymptote
            let sign = discriminant.linear_term(x) > 0.0;
            let crossed = !discriminant.is_quadratic() && prev_sign.is_some_and(|s| s != sign);
            prev_sign = Some(sign);

            if crossed && !current.is_empty() {
                intervals.push(std::mem::take(&mut current));
            }

            match discriminant.roots(x) {
                Roots::None => {
                    if !current.is_empty() {
                        current.closed_right = true;
                        intervals.push(std::mem::take(&mut current));
                    }
                    gap_before = true;
                }
                Roots::One(y) => {
                    current.points.push(Point::new(x, y));
                }
                Roots::Two(upper, lower) => {
                    if current.is_empty() {
                        current.closed_left = gap_before;
                    }
                    current.points.push(Point::new(x, upper));
                    current.points_rev.push(Point::new(x, lower));
                }
            }
        }

        if !current.is_empty() {
            intervals.push(current);
        }

        intervals
    }
}

/// Builds the curves of one solvable interval.
fn assemble(interval: Interval) -> Vec<BoundaryCurve> {
    let Interval {
        points,
        points_rev,
        closed_left,
        closed_right,
    } = interval;

    if points_rev.is_empty() {
        return vec![BoundaryCurve::new(points)];
    }

    if !closed_left && !closed_right {
        return vec![BoundaryCurve::new(points), BoundaryCurve::new(points_rev)];
    }

    let mut path = stitch(points, points_rev);
    if closed_left && closed_right {
        if let Some(&first) = path.first() {
            path.push(first);
        }
    }

    vec![BoundaryCurve::new(path)]
}

/// Concatenates `a` and `b` in whichever of the four orderings puts their facing endpoints
/// closest together.
fn stitch(mut a: Vec<Point>, mut b: Vec<Point>) -> Vec<Point> {
    if a.is_empty() || b.is_empty() {
        a.extend(b);
        return a;
    }
    let (a_first, a_last) = (a[0], a[a.len() - 1]);
    let (b_first, b_last) = (b[0], b[b.len() - 1]);

    let candidates = [
        a_last.distance(&b_first),
        a_last.distance(&b_last),
        a_first.distance(&b_last),
        a_first.distance(&b_first),
    ];
    let best = candidates
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, &d)| if d < best.1 { (i, d) } else { best })
        .0;

    let (mut head, tail) = match best {
        0 => (a, b),
        1 => {
            b.reverse();
            (a, b)
        }
        2 => (b, a),
        _ => {
            a.reverse();
            (a, b)
        }
    };

    let skip = usize::from(head.last() == tail.first());
    head.extend(tail.into_iter().skip(skip));
    head
}
