//! Gesture recognition for the wand.
//!
//! Raw samples come from two independent streams: motion/orientation readings
//! and touch sequences. Each detector turns its stream into discrete
//! [`Gesture`] values; tilt is the one intentionally continuous kind.
//!
//! - **`motion`**: shake (delta magnitude, cooldown-gated) and tilt (baseline deviation).
//! - **`touch`**: tap, hold, swipe, and stroke collection in drawing mode.
//! - **`shape`**: pure classification of a finished stroke into a [`Shape`].
//!
//! Detectors only keep the previous sample and the time of their last
//! emission. Timestamps are sample time in milliseconds, never wall-clock.

pub mod motion;
pub mod shape;
pub mod touch;

pub use motion::{ShakeDetector, TiltTracker};
pub use shape::{classify_shape, ShapeFeatures};
pub use touch::{classify_swipe, TouchTracker};

use crate::protocol::DeviceInfo;
use serde::{Deserialize, Serialize};

/// A 3-axis acceleration reading in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// A 2D screen point in pixels, +y pointing down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub acceleration: Vec3,
    pub timestamp_ms: u64,
}

/// Device orientation in degrees: `beta` is front/back tilt, `gamma` left/right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientationSample {
    pub beta: f64,
    pub gamma: f64,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
}

impl TouchPoint {
    pub fn new(x: f64, y: f64, timestamp_ms: u64) -> Self {
        Self { x, y, timestamp_ms }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        }
    }
}

/// The closed set of drawable shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Circle,
    Triangle,
    Infinity,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Circle => "circle",
            Shape::Triangle => "triangle",
            Shape::Infinity => "infinity",
        }
    }
}

/// A recognised gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    Shake {
        intensity: f64,
    },
    /// Normalised deviation from the calibrated baseline, each axis in -1..=1.
    Tilt {
        x: f64,
        y: f64,
    },
    Tap {
        count: u32,
    },
    Hold,
    Swipe {
        direction: SwipeDirection,
        distance: f64,
        duration_ms: u64,
    },
    Draw(Shape),
}

/// Recognition thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Minimum acceleration delta between samples for a shake (m/s²). Default: 15
    pub shake_threshold: f64,
    /// Minimum time between two shakes. Default: 500ms
    pub shake_cooldown_ms: u64,
    /// Deviation from baseline before tilt is reported (degrees). Default: 5
    pub tilt_threshold_deg: f64,
    /// Deviation mapped to a full-scale tilt of 1.0 (degrees). Default: 45
    pub tilt_range_deg: f64,
    pub tap_max_duration_ms: u64,
    /// Maximum finger travel for taps and holds (px). Default: 10
    pub tap_max_movement: f64,
    /// Taps starting this soon after the previous one raise the tap count. Default: 350ms
    pub multi_tap_window_ms: u64,
    pub hold_min_duration_ms: u64,
    pub swipe_min_distance: f64,
    pub swipe_max_duration_ms: u64,
    /// Strokes whose bounding box is smaller than this are not classified (px). Default: 40
    pub shape_min_size: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            shake_threshold: 15.0,
            shake_cooldown_ms: 500,
            tilt_threshold_deg: 5.0,
            tilt_range_deg: 45.0,
            tap_max_duration_ms: 300,
            tap_max_movement: 10.0,
            multi_tap_window_ms: 350,
            hold_min_duration_ms: 600,
            swipe_min_distance: 50.0,
            swipe_max_duration_ms: 500,
            shape_min_size: 40.0,
        }
    }
}

impl GestureConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let positive = [
            ("shake_threshold", self.shake_threshold),
            ("tilt_range_deg", self.tilt_range_deg),
            ("swipe_min_distance", self.swipe_min_distance),
            ("shape_min_size", self.shape_min_size),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                anyhow::bail!("gesture.{} must be positive, got {}", name, value);
            }
        }
        if self.tilt_threshold_deg < 0.0 || self.tap_max_movement < 0.0 {
            anyhow::bail!("gesture thresholds must not be negative");
        }
        if self.tap_max_duration_ms >= self.hold_min_duration_ms {
            anyhow::bail!(
                "gesture.tap_max_duration_ms ({}) must be shorter than hold_min_duration_ms ({})",
                self.tap_max_duration_ms,
                self.hold_min_duration_ms
            );
        }
        Ok(())
    }
}

/// Combines all detectors for one wand.
///
/// Motion kinds whose sensor the device lacks are never produced; touch
/// gestures are always available.
pub struct Recognizer {
    shake: Option<ShakeDetector>,
    tilt: Option<TiltTracker>,
    touch: TouchTracker,
}

impl Recognizer {
    pub fn new(config: &GestureConfig, device: &DeviceInfo) -> Self {
        Self {
            shake: device
                .has_acceleration
                .then(|| ShakeDetector::new(config)),
            tilt: device.has_orientation.then(|| TiltTracker::new(config)),
            touch: TouchTracker::new(config),
        }
    }

    pub fn on_motion(&mut self, sample: MotionSample) -> Option<Gesture> {
        self.shake.as_mut()?.push(sample)
    }

    pub fn on_orientation(&mut self, sample: OrientationSample) -> Option<Gesture> {
        self.tilt.as_mut()?.push(sample)
    }

    /// Re-centres tilt on the next orientation sample.
    pub fn calibrate_tilt(&mut self) {
        if let Some(tilt) = self.tilt.as_mut() {
            tilt.calibrate();
        }
    }

    pub fn set_drawing(&mut self, drawing: bool) {
        self.touch.set_drawing(drawing);
    }

    pub fn touch_start(&mut self, point: TouchPoint) {
        self.touch.start(point);
    }

    pub fn touch_move(&mut self, point: TouchPoint) {
        self.touch.move_to(point);
    }

    pub fn touch_end(&mut self, point: TouchPoint) -> Option<Gesture> {
        self.touch.end(point)
    }

    pub fn motion_enabled(&self) -> bool {
        self.shake.is_some()
    }

    pub fn tilt_enabled(&self) -> bool {
        self.tilt.is_some()
    }
}

#[cfg(test)]
#[path = "tests/recognizer_tests.rs"]
mod tests;
