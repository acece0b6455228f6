//! Phase deadline tracking
//!
//! The supervisor never sleeps. The session's poll loop asks it on every tick
//! whether the current phase has overrun.

use std::time::Duration;
use tokio::time::Instant;

/// Single-deadline timeout supervisor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutSupervisor {
    deadline: Option<Instant>,
}

impl TimeoutSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the deadline to now + `duration`
    pub fn arm(&mut self, duration: Duration) {
        self.arm_from(Instant::now(), duration);
    }

    /// Reset the deadline to `now` + `duration`
    pub fn arm_from(&mut self, now: Instant, duration: Duration) {
        self.deadline = Some(now + duration);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the armed deadline lies strictly before `now`.
    ///
    /// A disarmed supervisor never expires.
    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disarmed_never_expires() {
        let supervisor = TimeoutSupervisor::new();
        assert!(!supervisor.expired(Instant::now() + Duration::from_secs(3600)));
        assert!(supervisor.deadline().is_none());
    }

    #[test]
    fn test_expiry_is_strictly_after_deadline() {
        let start = Instant::now();
        let mut supervisor = TimeoutSupervisor::new();
        supervisor.arm_from(start, Duration::from_secs(30));

        assert!(!supervisor.expired(start));
        assert!(!supervisor.expired(start + Duration::from_secs(30)));
        assert!(supervisor.expired(start + Duration::from_millis(30_001)));
    }

    #[test]
    fn test_rearm_moves_deadline() {
        let start = Instant::now();
        let mut supervisor = TimeoutSupervisor::new();
        supervisor.arm_from(start, Duration::from_secs(1));
        supervisor.arm_from(start + Duration::from_secs(5), Duration::from_secs(1));

        assert!(!supervisor.expired(start + Duration::from_secs(5)));
        assert!(supervisor.expired(start + Duration::from_secs(7)));

        supervisor.disarm();
        assert!(!supervisor.expired(start + Duration::from_secs(60)));
    }
}
