//! Tunable workflow policy.

use chrono::Duration;

/// How long a declined client is blocked from re-requesting the same trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    pub cooldown: Duration,
}

impl CooldownPolicy {
    pub const DEFAULT_DAYS: i64 = 7;
    pub const MAX_DAYS: i64 = 3650;

    /// Build a policy from a whole number of days in `1..=MAX_DAYS`.
    pub fn from_days(days: i64) -> Option<Self> {
        if !(1..=Self::MAX_DAYS).contains(&days) {
            return None;
        }
        Duration::try_days(days).map(|cooldown| Self { cooldown })
    }
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            cooldown: Duration::days(Self::DEFAULT_DAYS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_one_week() {
        assert_eq!(CooldownPolicy::default().cooldown, Duration::days(7));
    }

    #[test]
    fn rejects_non_positive_windows() {
        assert!(CooldownPolicy::from_days(0).is_none());
        assert!(CooldownPolicy::from_days(-3).is_none());
        assert_eq!(
            CooldownPolicy::from_days(14).map(|p| p.cooldown),
            Some(Duration::days(14))
        );
    }

    #[test]
    fn rejects_windows_past_the_ceiling() {
        assert_eq!(
            CooldownPolicy::from_days(CooldownPolicy::MAX_DAYS).map(|p| p.cooldown),
            Some(Duration::days(3650))
        );
        assert!(CooldownPolicy::from_days(CooldownPolicy::MAX_DAYS + 1).is_none());
        assert!(CooldownPolicy::from_days(100_000_000).is_none());
        assert!(CooldownPolicy::from_days(i64::MAX).is_none());
    }
}
