//! Staleness tracking and scheduling decisions for preview regeneration

use std::time::Duration;

/// Layout class of the editor window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportClass {
    /// Editor and preview side by side
    Wide,
    /// Single pane; the user toggles between editor and preview
    Narrow,
}

impl ViewportClass {
    pub fn from_width(width_px: u32, breakpoint_px: u32) -> Self {
        if width_px >= breakpoint_px {
            ViewportClass::Wide
        } else {
            ViewportClass::Narrow
        }
    }
}

/// Pane shown on a narrow layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveSurface {
    #[default]
    Editor,
    Preview,
}

/// Stale flag plus a monotonically increasing generation token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StaleFlag {
    stale: bool,
    generation: u64,
}

/// Tracks whether the current artifact reflects the latest content
#[derive(Debug, Clone)]
pub struct StalenessTracker {
    flag: StaleFlag,
    wide_delay: Duration,
    narrow_delay: Duration,
}

impl StalenessTracker {
    pub fn new(wide_delay: Duration, narrow_delay: Duration) -> Self {
        // nothing has been generated yet, so a fresh tracker starts stale
        Self {
            flag: StaleFlag { stale: true, generation: 0 },
            wide_delay,
            narrow_delay,
        }
    }

    /// Flag the artifact stale and return the new generation token
    pub fn mark_stale(&mut self) -> u64 {
        self.flag.generation += 1;
        self.flag.stale = true;
        self.flag.generation
    }

    pub fn is_stale(&self) -> bool {
        self.flag.stale
    }

    pub fn generation(&self) -> u64 {
        self.flag.generation
    }

    /// True when `token` is not older than the latest flagged generation
    pub fn is_current(&self, token: u64) -> bool {
        token >= self.flag.generation
    }

    /// Record a completed regeneration. Clears the flag only for a current
    /// token and reports whether the result may be published.
    pub fn complete(&mut self, token: u64) -> bool {
        if self.is_current(token) {
            self.flag.stale = false;
            true
        } else {
            false
        }
    }

    /// Whether the surface showing the result is visible
    pub fn should_schedule(&self, viewport: ViewportClass, active: ActiveSurface) -> bool {
        match viewport {
            ViewportClass::Wide => true,
            ViewportClass::Narrow => active == ActiveSurface::Preview,
        }
    }

    pub fn schedule_delay(&self, viewport: ViewportClass) -> Duration {
        match viewport {
            ViewportClass::Wide => self.wide_delay,
            ViewportClass::Narrow => self.narrow_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> StalenessTracker {
        StalenessTracker::new(Duration::from_millis(2000), Duration::from_millis(500))
    }

    #[test]
    fn generations_increase_and_old_tokens_do_not_clear() {
        let mut t = tracker();
        let g1 = t.mark_stale();
        let g2 = t.mark_stale();
        assert!(g2 > g1);
        assert!(!t.complete(g1));
        assert!(t.is_stale());
        assert!(t.complete(g2));
        assert!(!t.is_stale());
    }

    #[test]
    fn visibility_rules() {
        let t = tracker();
        assert!(t.should_schedule(ViewportClass::Wide, ActiveSurface::Editor));
        assert!(t.should_schedule(ViewportClass::Narrow, ActiveSurface::Preview));
        assert!(!t.should_schedule(ViewportClass::Narrow, ActiveSurface::Editor));
    }

    #[test]
    fn delays_depend_on_viewport() {
        let t = tracker();
        assert_eq!(t.schedule_delay(ViewportClass::Wide), Duration::from_millis(2000));
        assert_eq!(t.schedule_delay(ViewportClass::Narrow), Duration::from_millis(500));
    }

    #[test]
    fn viewport_class_breakpoint() {
        assert_eq!(ViewportClass::from_width(1024, 1024), ViewportClass::Wide);
        assert_eq!(ViewportClass::from_width(1023, 1024), ViewportClass::Narrow);
    }
}
