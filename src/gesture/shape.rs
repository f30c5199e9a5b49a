//! Shape classification for drawn strokes.
//!
//! A stroke is resampled to evenly spaced points and reduced to a handful of
//! geometric features; classification is a pure function of those features.
//!
//! | Shape | Closed | Net turning | Total turning | Corners | Other |
//! |---|---|---|---|---|---|
//! | Infinity | yes | ~0 | 2.5π..=4π | <= 4 | at most two crossings |
//! | Triangle | yes | ~±2π | - | 3 | |
//! | Circle | yes | ~±2π | - | <= 1 | radius variation < 0.2, aspect 0.5..=2 |

use super::{GestureConfig, Point, Shape};
use std::f64::consts::PI;

/// Points per resampled stroke.
const RESAMPLE_POINTS: usize = 64;

/// Gap between first and last point, relative to path length, below which a
/// stroke counts as closed.
const CLOSURE_MAX_RATIO: f64 = 0.2;

/// Per-point turning (radians) that marks a point as part of a corner (~20°).
const CORNER_STEP_RAD: f64 = 0.35;

/// Accumulated turning (radians) a run of corner points needs (~45°).
const CORNER_MIN_RAD: f64 = 0.78;

const CIRCLE_MAX_RADIUS_VARIATION: f64 = 0.2;

/// A figure eight turns about 3π in total; scribbles turn far more.
const INFINITY_MAX_TURNING: f64 = 4.0 * PI;
const INFINITY_MAX_CORNERS: usize = 4;
/// A resampled point can land on the crossing itself, so zero is allowed.
const INFINITY_MAX_CROSSINGS: usize = 2;

/// Geometric summary of a stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFeatures {
    pub path_length: f64,
    /// Distance between first and last point divided by path length.
    pub closure_ratio: f64,
    /// Bounding box width / height.
    pub aspect_ratio: f64,
    /// Coefficient of variation of the distance to the centroid.
    pub radius_variation: f64,
    /// Signed sum of turning angles (radians).
    pub net_turning: f64,
    /// Sum of absolute turning angles (radians).
    pub total_turning: f64,
    pub corners: usize,
    pub self_intersections: usize,
}

impl ShapeFeatures {
    /// Extracts features, or `None` if the stroke is too small to judge.
    pub fn extract(points: &[Point], min_size: f64) -> Option<Self> {
        if points.len() < 3 {
            return None;
        }
        let path_length = path_length(points);
        let (min, max) = bounding_box(points);
        let width = max.x - min.x;
        let height = max.y - min.y;
        if width.max(height) < min_size || path_length <= 0.0 {
            return None;
        }

        let closure_ratio = points[0].distance(points[points.len() - 1]) / path_length;
        let closed = closure_ratio <= CLOSURE_MAX_RATIO;

        let mut resampled = resample(points, RESAMPLE_POINTS);
        let spacing = path_length / (RESAMPLE_POINTS - 1) as f64;
        if closed && resampled.len() > 1 {
            let first = resampled[0];
            if resampled
                .last()
                .map(|last| last.distance(first) < spacing * 0.5)
                .unwrap_or(false)
            {
                resampled.pop();
            }
        }
        if resampled.len() < 4 {
            return None;
        }

        let turning = turning_angles(&resampled, closed);
        let net_turning = turning.iter().sum();
        let total_turning = turning.iter().map(|a| a.abs()).sum();

        Some(Self {
            path_length,
            closure_ratio,
            aspect_ratio: width / height.max(f64::EPSILON),
            radius_variation: radius_variation(&resampled),
            net_turning,
            total_turning,
            corners: count_corners(&turning, closed),
            self_intersections: count_self_intersections(&resampled, closed),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closure_ratio <= CLOSURE_MAX_RATIO
    }
}

/// Classifies a stroke. Strokes that match no shape yield `None`.
pub fn classify_shape(points: &[Point], config: &GestureConfig) -> Option<Shape> {
    let features = ShapeFeatures::extract(points, config.shape_min_size)?;
    classify_features(&features)
}

pub fn classify_features(features: &ShapeFeatures) -> Option<Shape> {
    if !features.is_closed() {
        return None;
    }

    let net = features.net_turning.abs();
    let one_full_turn = (net - 2.0 * PI).abs() < PI / 2.0;

    // Two loops turning in opposite directions cancel out
    if net < PI / 2.0
        && (2.5 * PI..=INFINITY_MAX_TURNING).contains(&features.total_turning)
        && features.corners <= INFINITY_MAX_CORNERS
        && features.self_intersections <= INFINITY_MAX_CROSSINGS
    {
        return Some(Shape::Infinity);
    }
    if features.corners == 3 && one_full_turn {
        return Some(Shape::Triangle);
    }
    if features.corners <= 1
        && one_full_turn
        && features.radius_variation < CIRCLE_MAX_RADIUS_VARIATION
        && (0.5..=2.0).contains(&features.aspect_ratio)
        && features.self_intersections <= 1
    {
        return Some(Shape::Circle);
    }
    None
}

fn path_length(points: &[Point]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}

fn bounding_box(points: &[Point]) -> (Point, Point) {
    let mut min = points[0];
    let mut max = points[0];
    for p in points {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

/// Resamples a path to `n` points spaced evenly along its length.
fn resample(points: &[Point], n: usize) -> Vec<Point> {
    let interval = path_length(points) / (n - 1) as f64;
    let mut out = Vec::with_capacity(n);
    out.push(points[0]);
    if interval <= 0.0 {
        return out;
    }

    let mut accumulated = 0.0;
    let mut prev = points[0];
    let mut i = 1;
    while i < points.len() {
        let current = points[i];
        let d = prev.distance(current);
        if d > 0.0 && accumulated + d >= interval {
            let q = prev.lerp(current, (interval - accumulated) / d);
            out.push(q);
            prev = q;
            accumulated = 0.0;
        } else {
            accumulated += d;
            prev = current;
            i += 1;
        }
    }

    // Rounding can leave the final point out
    let last = points[points.len() - 1];
    while out.len() < n {
        out.push(last);
    }
    out.truncate(n);
    out
}

/// Signed turning angle at each point. Closed paths wrap around so every
/// point has a turn; open paths skip the endpoints.
fn turning_angles(points: &[Point], closed: bool) -> Vec<f64> {
    let n = points.len();
    let range = if closed { 0..n } else { 1..n - 1 };
    range
        .map(|i| {
            let prev = points[(i + n - 1) % n];
            let current = points[i];
            let next = points[(i + 1) % n];
            let (ax, ay) = (current.x - prev.x, current.y - prev.y);
            let (bx, by) = (next.x - current.x, next.y - current.y);
            if (ax == 0.0 && ay == 0.0) || (bx == 0.0 && by == 0.0) {
                0.0
            } else {
                (ax * by - ay * bx).atan2(ax * bx + ay * by)
            }
        })
        .collect()
}

/// Counts runs of sharply turning points whose combined turn is large.
fn count_corners(turning: &[f64], closed: bool) -> usize {
    let n = turning.len();
    if n == 0 {
        return 0;
    }
    // Start a closed path on a straight point so no corner is split in two
    let start = if closed {
        match turning.iter().position(|a| a.abs() <= CORNER_STEP_RAD) {
            Some(i) => i,
            None => return 0,
        }
    } else {
        0
    };

    let mut corners = 0;
    let mut run = 0.0_f64;
    for k in 0..n {
        let angle = turning[(start + k) % n];
        if angle.abs() > CORNER_STEP_RAD {
            run += angle;
        } else {
            if run.abs() >= CORNER_MIN_RAD {
                corners += 1;
            }
            run = 0.0;
        }
    }
    if run.abs() >= CORNER_MIN_RAD {
        corners += 1;
    }
    corners
}

fn radius_variation(points: &[Point]) -> f64 {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let centroid = Point::new(cx, cy);

    let radii: Vec<f64> = points.iter().map(|p| p.distance(centroid)).collect();
    let mean = radii.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return f64::INFINITY;
    }
    let variance = radii.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt() / mean
}

/// Proper crossings between non-adjacent segments.
fn count_self_intersections(points: &[Point], closed: bool) -> usize {
    let n = points.len();
    let segments = if closed { n } else { n - 1 };
    let segment = |i: usize| (points[i], points[(i + 1) % n]);

    let mut count = 0;
    for i in 0..segments {
        for j in (i + 2)..segments {
            if closed && i == 0 && j == segments - 1 {
                continue;
            }
            let (a, b) = segment(i);
            let (c, d) = segment(j);
            if segments_cross(a, b, c, d) {
                count += 1;
            }
        }
    }
    count
}

fn segments_cross(a: Point, b: Point, c: Point, d: Point) -> bool {
    let orient = |p: Point, q: Point, r: Point| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
    let d1 = orient(a, b, c);
    let d2 = orient(a, b, d);
    let d3 = orient(c, d, a);
    let d4 = orient(c, d, b);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

#[cfg(test)]
#[path = "tests/shape_tests.rs"]
mod tests;
