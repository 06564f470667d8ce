use chrono::{Duration, NaiveDateTime};

use crate::models::{broker_now, OpenPosition};

/// Anti-whipsaw guard: blocks acting against a position that was opened
/// too recently
#[derive(Debug, Clone)]
pub struct CooldownGuard {
    pub min_interval: Duration,
    pub broker_gmt_offset_hours: i64,
}

impl Default for CooldownGuard {
    fn default() -> Self {
        Self {
            min_interval: Duration::seconds(60),
            broker_gmt_offset_hours: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CooldownVeto {
    pub ticket: u64,
    pub elapsed: Duration,
}

impl CooldownGuard {
    pub fn new(min_interval: Duration, broker_gmt_offset_hours: i64) -> Self {
        Self {
            min_interval,
            broker_gmt_offset_hours,
        }
    }

    /// Broker-adjusted wall-clock time
    pub fn now(&self) -> NaiveDateTime {
        broker_now(self.broker_gmt_offset_hours)
    }

    /// Check a position against the current broker time
    pub fn check(&self, position: &OpenPosition) -> Result<(), CooldownVeto> {
        self.check_at(self.now(), position)
    }

    /// Check a position against an explicit broker time
    pub fn check_at(&self, now: NaiveDateTime, position: &OpenPosition) -> Result<(), CooldownVeto> {
        let elapsed = (now - position.open_time).abs();
        if elapsed < self.min_interval {
            return Err(CooldownVeto {
                ticket: position.ticket,
                elapsed,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Side;

    fn position_opened_at(open_time: NaiveDateTime) -> OpenPosition {
        OpenPosition {
            ticket: 7,
            side: Side::Short,
            open_time,
        }
    }

    #[test]
    fn test_recent_position_is_vetoed() {
        let guard = CooldownGuard::default();
        let now = guard.now();
        let position = position_opened_at(now - Duration::seconds(30));

        let veto = guard.check_at(now, &position).unwrap_err();
        assert_eq!(veto.ticket, 7);
        assert_eq!(veto.elapsed, Duration::seconds(30));
    }

    #[test]
    fn test_old_position_passes() {
        let guard = CooldownGuard::default();
        let now = guard.now();
        let position = position_opened_at(now - Duration::seconds(90));

        assert!(guard.check_at(now, &position).is_ok());
    }

    #[test]
    fn test_boundary_is_not_vetoed() {
        let guard = CooldownGuard::default();
        let now = guard.now();
        let position = position_opened_at(now - Duration::seconds(60));

        assert!(guard.check_at(now, &position).is_ok());
    }

    #[test]
    fn test_future_open_time_uses_absolute_difference() {
        // Clock skew between broker and local host
        let guard = CooldownGuard::default();
        let now = guard.now();
        let position = position_opened_at(now + Duration::seconds(10));

        assert!(guard.check_at(now, &position).is_err());
    }

    #[test]
    fn test_check_uses_broker_offset() {
        // Position stamped in broker time three hours ahead of UTC
        let guard = CooldownGuard::new(Duration::seconds(60), 3);
        let position = position_opened_at(broker_now(3) - Duration::seconds(5));
        assert!(guard.check(&position).is_err());

        // Same stamp judged as if the broker ran on UTC: hours apart
        let utc_guard = CooldownGuard::new(Duration::seconds(60), 0);
        assert!(utc_guard.check(&position).is_ok());
    }
}
