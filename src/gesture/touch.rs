//! Touch gestures: tap, hold, swipe, and drawn strokes.

use super::shape::classify_shape;
use super::{Gesture, GestureConfig, Point, SwipeDirection, TouchPoint};

/// Classifies a finished touch as a swipe.
///
/// The dominant axis decides the direction (vertical wins ties); travel on
/// that axis must exceed the minimum distance and the touch must be faster
/// than the maximum duration.
pub fn classify_swipe(
    start: Point,
    end: Point,
    duration_ms: u64,
    config: &GestureConfig,
) -> Option<SwipeDirection> {
    if duration_ms >= config.swipe_max_duration_ms {
        return None;
    }
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    if dx.abs().max(dy.abs()) <= config.swipe_min_distance {
        return None;
    }

    let direction = if dx.abs() > dy.abs() {
        if dx > 0.0 {
            SwipeDirection::Right
        } else {
            SwipeDirection::Left
        }
    } else if dy > 0.0 {
        SwipeDirection::Down
    } else {
        SwipeDirection::Up
    };
    Some(direction)
}

#[derive(Debug, Clone)]
struct ActiveTouch {
    start: TouchPoint,
    max_travel: f64,
    stroke: Vec<Point>,
}

/// Tracks one finger from start to end.
#[derive(Debug, Clone)]
pub struct TouchTracker {
    config: GestureConfig,
    drawing: bool,
    active: Option<ActiveTouch>,
    /// End time and count of the last tap, for multi-tap counting.
    last_tap: Option<(u64, u32)>,
}

impl TouchTracker {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            config: config.clone(),
            drawing: false,
            active: None,
            last_tap: None,
        }
    }

    /// In drawing mode touches are collected as strokes and classified as shapes.
    pub fn set_drawing(&mut self, drawing: bool) {
        self.drawing = drawing;
        self.active = None;
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn start(&mut self, point: TouchPoint) {
        let stroke = if self.drawing {
            vec![point.point()]
        } else {
            Vec::new()
        };
        self.active = Some(ActiveTouch {
            start: point,
            max_travel: 0.0,
            stroke,
        });
    }

    pub fn move_to(&mut self, point: TouchPoint) {
        let drawing = self.drawing;
        if let Some(active) = self.active.as_mut() {
            active.max_travel = active
                .max_travel
                .max(active.start.point().distance(point.point()));
            if drawing {
                active.stroke.push(point.point());
            }
        }
    }

    /// Finishes the touch. A touch that was never started yields nothing.
    pub fn end(&mut self, point: TouchPoint) -> Option<Gesture> {
        self.move_to(point);
        let active = self.active.take()?;
        let duration_ms = point.timestamp_ms.saturating_sub(active.start.timestamp_ms);

        if self.drawing {
            return classify_shape(&active.stroke, &self.config).map(Gesture::Draw);
        }

        let start = active.start.point();
        let end = point.point();
        if let Some(direction) = classify_swipe(start, end, duration_ms, &self.config) {
            return Some(Gesture::Swipe {
                direction,
                distance: start.distance(end),
                duration_ms,
            });
        }

        if active.max_travel > self.config.tap_max_movement {
            return None;
        }
        if duration_ms < self.config.tap_max_duration_ms {
            let count = match self.last_tap {
                Some((last_end, count))
                    if active.start.timestamp_ms.saturating_sub(last_end)
                        <= self.config.multi_tap_window_ms =>
                {
                    count + 1
                }
                _ => 1,
            };
            self.last_tap = Some((point.timestamp_ms, count));
            return Some(Gesture::Tap { count });
        }
        if duration_ms >= self.config.hold_min_duration_ms {
            return Some(Gesture::Hold);
        }
        None
    }
}

#[cfg(test)]
#[path = "tests/touch_tests.rs"]
mod tests;
