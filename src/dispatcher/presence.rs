//! The altar's mirrored state: what is shown and how the room feels.

/// Host-side presence. Only dispatched commands (or the altar itself) change
/// it; `state:*` responses are built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    pub current_item: Option<String>,
    /// Reading progress, 0..=100.
    pub progress_percent: f64,
    /// 0..=1
    pub sound_level: f64,
    pub is_dimmed: bool,
    pub is_paused: bool,
    pub parallax: (f64, f64),
}

impl Default for Presence {
    fn default() -> Self {
        Self {
            current_item: None,
            progress_percent: 0.0,
            sound_level: 0.5,
            is_dimmed: false,
            is_paused: false,
            parallax: (0.0, 0.0),
        }
    }
}

impl Presence {
    /// Starts reading a new item from the top.
    pub fn open_item(&mut self, path: impl Into<String>) {
        self.current_item = Some(path.into());
        self.progress_percent = 0.0;
        self.is_paused = false;
    }

    /// Moves reading progress, clamped to 0..=100. Returns the new progress.
    pub fn scroll(&mut self, delta: f64) -> f64 {
        if delta.is_finite() {
            self.progress_percent = (self.progress_percent + delta).clamp(0.0, 100.0);
        }
        self.progress_percent
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.is_paused = !self.is_paused;
        self.is_paused
    }

    /// Returns the clamped level actually stored.
    pub fn set_sound_level(&mut self, level: f64) -> f64 {
        if level.is_finite() {
            self.sound_level = level.clamp(0.0, 1.0);
        }
        self.sound_level
    }
}
