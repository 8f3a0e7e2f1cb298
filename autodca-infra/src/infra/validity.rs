//! Time-window and cooldown arithmetic shared by grants and jobs.

use crate::infra::contracts::Timestamp;
use serde::{Deserialize, Serialize};

/// Half-open validity interval `[valid_after, valid_until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub valid_after: Timestamp,
    pub valid_until: Timestamp,
}

/// Where a timestamp falls relative to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    NotYetValid,
    Open,
    Closed,
}

impl ValidityWindow {
    pub fn new(valid_after: Timestamp, valid_until: Timestamp) -> Self {
        Self {
            valid_after,
            valid_until,
        }
    }

    /// A window must be non-empty to be installed.
    pub fn is_well_formed(&self) -> bool {
        self.valid_after < self.valid_until
    }

    pub fn position(&self, now: Timestamp) -> WindowPosition {
        if now < self.valid_after {
            WindowPosition::NotYetValid
        } else if now >= self.valid_until {
            WindowPosition::Closed
        } else {
            WindowPosition::Open
        }
    }

    pub fn contains(&self, now: Timestamp) -> bool {
        self.position(now) == WindowPosition::Open
    }
}

/// `last_executed == 0` means the job never ran, so no cooldown applies.
/// A clock reading behind `last_executed` counts as zero elapsed time.
pub fn cooldown_elapsed(last_executed: Timestamp, refresh_interval: u64, now: Timestamp) -> bool {
    last_executed == 0 || now.saturating_sub(last_executed) >= refresh_interval
}

pub fn next_eligible_at(last_executed: Timestamp, refresh_interval: u64) -> Timestamp {
    if last_executed == 0 {
        0
    } else {
        last_executed.saturating_add(refresh_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_bound_inclusive_upper_exclusive() {
        let window = ValidityWindow::new(100, 200);
        assert!(!window.contains(99));
        assert!(window.contains(100));
        assert!(window.contains(199));
        assert!(!window.contains(200));
    }

    #[test]
    fn test_positions() {
        let window = ValidityWindow::new(100, 200);
        assert_eq!(window.position(0), WindowPosition::NotYetValid);
        assert_eq!(window.position(150), WindowPosition::Open);
        assert_eq!(window.position(u64::MAX), WindowPosition::Closed);
    }

    #[test]
    fn test_well_formed() {
        assert!(ValidityWindow::new(0, 1).is_well_formed());
        assert!(!ValidityWindow::new(5, 5).is_well_formed());
        assert!(!ValidityWindow::new(6, 5).is_well_formed());
    }

    #[test]
    fn test_cooldown() {
        assert!(cooldown_elapsed(0, 60, 1));
        assert!(!cooldown_elapsed(100, 60, 159));
        assert!(cooldown_elapsed(100, 60, 160));
        assert!(cooldown_elapsed(100, 0, 100));
        // clock behind the last run
        assert!(!cooldown_elapsed(100, 60, 50));
        assert!(cooldown_elapsed(100, 0, 50));
    }

    #[test]
    fn test_next_eligible_at() {
        assert_eq!(next_eligible_at(0, 60), 0);
        assert_eq!(next_eligible_at(100, 60), 160);
        assert_eq!(next_eligible_at(u64::MAX - 1, 60), u64::MAX);
    }
}
