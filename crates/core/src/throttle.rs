//! Cooling-off window for repeated notifications.
//!
//! [`NotificationThrottle`] remembers when each notification kind last
//! fired and suppresses it until the window has elapsed. State is kept in
//! memory only and starts empty on every process start.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Default cooling-off window: one hour.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Rate-limits notifications to at most one per window per kind.
#[derive(Debug)]
pub struct NotificationThrottle {
    window: Duration,
    last_fired: Mutex<HashMap<String, Instant>>,
}

impl Default for NotificationThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl NotificationThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide whether `kind` may fire now, recording the firing if so.
    pub fn should_fire(&self, kind: &str) -> bool {
        self.should_fire_at(kind, Instant::now())
    }

    /// Same as [`should_fire`](Self::should_fire) with an explicit clock.
    ///
    /// The first call for a kind always fires. Later calls fire once the
    /// window has fully elapsed since the last firing of that kind;
    /// suppressed calls leave the recorded timestamp untouched.
    pub fn should_fire_at(&self, kind: &str, now: Instant) -> bool {
        // A poisoned map only means another thread panicked mid-insert;
        // the timestamps themselves are still usable.
        let mut last_fired = self
            .last_fired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let fire = match last_fired.get(kind) {
            None => true,
            Some(last) => now.saturating_duration_since(*last) >= self.window,
        };

        if fire {
            last_fired.insert(kind.to_string(), now);
        }
        fire
    }
}
