use std::time::{Duration, Instant};

pub const DEFAULT_BLINK_INTERVAL: Duration = Duration::from_millis(500);
/// Idle time after a keystroke before blinking starts again.
pub const DEFAULT_BLINK_RESUME: Duration = Duration::from_millis(600);

/// Caret blink timer. Typing keeps the caret solid; blinking resumes once
/// the user has been idle for `resume`.
#[derive(Debug, Clone)]
pub struct CaretBlink {
    interval: Duration,
    resume: Duration,
    visible: bool,
    /// When the next toggle is due. `None` while suspended by typing.
    next_toggle: Option<Instant>,
    last_activity: Instant,
}

impl CaretBlink {
    pub fn new(interval: Duration, resume: Duration, now: Instant) -> Self {
        Self {
            interval,
            resume,
            visible: true,
            next_toggle: Some(now + interval),
            last_activity: now,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_blinking(&self) -> bool {
        self.next_toggle.is_some()
    }

    /// Keystroke or caret move: show the caret and hold it solid.
    pub fn reset(&mut self, now: Instant) {
        self.visible = true;
        self.next_toggle = None;
        self.last_activity = now;
    }

    /// Returns true when visibility changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_toggle else {
            if now.saturating_duration_since(self.last_activity) >= self.resume {
                self.next_toggle = Some(now + self.interval);
            }
            return false;
        };
        if now < due {
            return false;
        }
        self.visible = !self.visible;
        // Skip missed periods instead of toggling in a burst
        let mut next = due + self.interval;
        while next <= now {
            next += self.interval;
        }
        self.next_toggle = Some(next);
        true
    }
}
