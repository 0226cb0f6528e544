//! Adaptive display refresh
//!
//! Tenths of a second matter in the first minute and hardly at all after
//! ten, so the redraw interval relaxes as elapsed time grows. The tier
//! boundaries are fixed; the interval of each tier comes from config.

use std::time::Duration;
use stint_core::config::TickIntervals;
use tracing::debug;

/// Elapsed time at which refresh drops from fast to medium
pub const MEDIUM_AFTER: Duration = Duration::from_secs(60);

/// Elapsed time at which refresh drops from medium to slow
pub const SLOW_AFTER: Duration = Duration::from_secs(10 * 60);

/// Refresh-rate bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Fast,
    Medium,
    Slow,
}

impl Tier {
    pub fn for_elapsed(elapsed: Duration) -> Self {
        if elapsed < MEDIUM_AFTER {
            Tier::Fast
        } else if elapsed < SLOW_AFTER {
            Tier::Medium
        } else {
            Tier::Slow
        }
    }

    pub fn interval(self, ticks: &TickIntervals) -> Duration {
        match self {
            Tier::Fast => ticks.fast,
            Tier::Medium => ticks.medium,
            Tier::Slow => ticks.slow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Fast => "fast",
            Tier::Medium => "medium",
            Tier::Slow => "slow",
        }
    }
}

/// Refresh interval for a given elapsed time
pub fn interval_for(ticks: &TickIntervals, elapsed: Duration) -> Duration {
    Tier::for_elapsed(elapsed).interval(ticks)
}

/// Tracks the current tier so the tick interval is only changed when
/// elapsed time crosses a boundary
#[derive(Debug, Clone)]
pub struct Scheduler {
    ticks: TickIntervals,
    tier: Tier,
}

impl Scheduler {
    pub fn new(ticks: TickIntervals, elapsed: Duration) -> Self {
        Self {
            ticks,
            tier: Tier::for_elapsed(elapsed),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn interval(&self) -> Duration {
        self.tier.interval(&self.ticks)
    }

    /// Re-evaluate the tier; returns the new interval if it changed
    pub fn update(&mut self, elapsed: Duration) -> Option<Duration> {
        let tier = Tier::for_elapsed(elapsed);
        if tier == self.tier {
            return None;
        }

        debug!(from = self.tier.as_str(), to = tier.as_str(), "refresh tier changed");
        self.tier = tier;
        Some(self.interval())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::for_elapsed(Duration::ZERO), Tier::Fast);
        assert_eq!(Tier::for_elapsed(Duration::from_secs(30)), Tier::Fast);
        assert_eq!(Tier::for_elapsed(Duration::from_millis(59_999)), Tier::Fast);
        assert_eq!(Tier::for_elapsed(Duration::from_secs(60)), Tier::Medium);
        assert_eq!(Tier::for_elapsed(Duration::from_secs(2 * 60)), Tier::Medium);
        assert_eq!(Tier::for_elapsed(Duration::from_secs(9 * 60 + 59)), Tier::Medium);
        assert_eq!(Tier::for_elapsed(Duration::from_secs(10 * 60)), Tier::Slow);
        assert_eq!(Tier::for_elapsed(Duration::from_secs(5 * 3600)), Tier::Slow);
    }

    #[test]
    fn test_interval_for_uses_configured_ticks() {
        let ticks = TickIntervals {
            fast: Duration::from_millis(200),
            medium: Duration::from_millis(600),
            slow: Duration::from_millis(1500),
        };
        assert_eq!(interval_for(&ticks, Duration::ZERO), ticks.fast);
        assert_eq!(interval_for(&ticks, Duration::from_secs(120)), ticks.medium);
        assert_eq!(interval_for(&ticks, Duration::from_secs(600)), ticks.slow);
    }

    #[test]
    fn test_scheduler_reports_only_crossings() {
        let ticks = TickIntervals::default();
        let mut scheduler = Scheduler::new(ticks, Duration::from_secs(58));
        assert_eq!(scheduler.interval(), ticks.fast);

        assert_eq!(scheduler.update(Duration::from_secs(59)), None);
        assert_eq!(scheduler.update(Duration::from_secs(60)), Some(ticks.medium));
        assert_eq!(scheduler.update(Duration::from_secs(61)), None);
        assert_eq!(scheduler.update(Duration::from_secs(600)), Some(ticks.slow));
        assert_eq!(scheduler.tier(), Tier::Slow);

        // a reset drops back to the fast tier
        assert_eq!(scheduler.update(Duration::ZERO), Some(ticks.fast));
    }
}
