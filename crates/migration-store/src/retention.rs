//! Retention window configuration for the Backup Store.

use chrono::Duration;

use crate::error::{Error, Result};

/// Default 90 days, configurable between a 30-day floor and a 365-day
/// ceiling. `tombstone` selects hard delete (`false`, the default) vs.
/// soft delete for expired rows — see `DESIGN.md` for the tradeoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    days: i64,
    pub tombstone: bool,
}

impl RetentionConfig {
    pub const MIN_DAYS: i64 = 30;
    pub const MAX_DAYS: i64 = 365;
    pub const DEFAULT_DAYS: i64 = 90;

    /// Rejects `days` outside `[MIN_DAYS, MAX_DAYS]` rather than
    /// silently coercing it to the nearest bound.
    pub fn new(days: i64, tombstone: bool) -> Result<Self> {
        if days < Self::MIN_DAYS || days > Self::MAX_DAYS {
            return Err(Error::InvalidRetentionDays(days));
        }
        Ok(Self { days, tombstone })
    }

    pub fn window(&self) -> Duration {
        Duration::days(self.days)
    }

    pub fn days(&self) -> i64 {
        self.days
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DAYS, false).expect("default retention days is within range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_ninety_days_hard_delete() {
        let cfg = RetentionConfig::default();
        assert_eq!(cfg.days(), 90);
        assert!(!cfg.tombstone);
    }

    #[test]
    fn rejects_below_the_floor() {
        assert!(matches!(
            RetentionConfig::new(29, false),
            Err(Error::InvalidRetentionDays(29))
        ));
    }

    #[test]
    fn rejects_above_the_ceiling() {
        assert!(matches!(
            RetentionConfig::new(366, false),
            Err(Error::InvalidRetentionDays(366))
        ));
    }

    #[test]
    fn boundary_values_are_accepted() {
        assert_eq!(RetentionConfig::new(30, false).unwrap().days(), 30);
        assert_eq!(RetentionConfig::new(365, false).unwrap().days(), 365);
    }
}
