//! Motion gestures: shake and tilt.

use super::{Gesture, GestureConfig, MotionSample, OrientationSample, Vec3};

/// Emits `Shake` when successive acceleration samples jump by more than the
/// threshold, at most once per cooldown window.
#[derive(Debug, Clone)]
pub struct ShakeDetector {
    threshold: f64,
    cooldown_ms: u64,
    previous: Option<Vec3>,
    last_emitted_ms: Option<u64>,
}

impl ShakeDetector {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            threshold: config.shake_threshold,
            cooldown_ms: config.shake_cooldown_ms,
            previous: None,
            last_emitted_ms: None,
        }
    }

    pub fn push(&mut self, sample: MotionSample) -> Option<Gesture> {
        let previous = self.previous.replace(sample.acceleration)?;
        let delta = (sample.acceleration - previous).magnitude();
        if delta <= self.threshold {
            return None;
        }

        // Condition may hold for many samples in a row; cooldown still applies
        if let Some(last) = self.last_emitted_ms {
            if sample.timestamp_ms.saturating_sub(last) < self.cooldown_ms {
                return None;
            }
        }

        self.last_emitted_ms = Some(sample.timestamp_ms);
        Some(Gesture::Shake {
            intensity: delta / self.threshold,
        })
    }
}

/// Reports orientation deviation from a baseline on every sample beyond the
/// threshold. Not cooldown-gated: the wand streams tilt for smooth parallax.
#[derive(Debug, Clone)]
pub struct TiltTracker {
    threshold_deg: f64,
    range_deg: f64,
    baseline: Option<(f64, f64)>,
}

impl TiltTracker {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            threshold_deg: config.tilt_threshold_deg,
            range_deg: config.tilt_range_deg,
            baseline: None,
        }
    }

    /// Forgets the baseline; the next sample becomes the new centre.
    pub fn calibrate(&mut self) {
        self.baseline = None;
    }

    pub fn push(&mut self, sample: OrientationSample) -> Option<Gesture> {
        let (base_beta, base_gamma) = *self
            .baseline
            .get_or_insert((sample.beta, sample.gamma));
        let dx = sample.gamma - base_gamma;
        let dy = sample.beta - base_beta;

        if dx.abs() <= self.threshold_deg && dy.abs() <= self.threshold_deg {
            return None;
        }

        Some(Gesture::Tilt {
            x: (dx / self.range_deg).clamp(-1.0, 1.0),
            y: (dy / self.range_deg).clamp(-1.0, 1.0),
        })
    }
}

#[cfg(test)]
#[path = "tests/motion_tests.rs"]
mod tests;
