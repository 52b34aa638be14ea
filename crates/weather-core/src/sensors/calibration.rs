//! Time-based readiness gates for sensors that need to stabilize
//!
//! Both gates use monotonic instants supplied by the caller.

use embassy_time::{Duration, Instant};

/// Warm-up gate that starts counting at the first readiness query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmUpGate {
    warm_up: Duration,
    started: Option<Instant>,
}

impl WarmUpGate {
    pub const fn new(warm_up: Duration) -> Self {
        Self {
            warm_up,
            started: None,
        }
    }

    /// Returns `false` on the first call (which starts the timer) and until
    /// the warm-up duration has elapsed since then.
    pub fn is_warm(&mut self, now: Instant) -> bool {
        match self.started {
            None => {
                self.started = Some(now);
                false
            }
            Some(started) => now.saturating_duration_since(started) >= self.warm_up,
        }
    }

    pub const fn started(&self) -> Option<Instant> {
        self.started
    }
}

/// Calibration bookkeeping for an environmentally compensated device.
///
/// The compensation timer starts at power-on, so the first compensation
/// write happens one full interval after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationState {
    powered_on_at: Instant,
    last_calibration: Instant,
    warm_up: Duration,
    compensation_interval: Duration,
}

impl CalibrationState {
    pub const fn new(
        powered_on_at: Instant,
        warm_up: Duration,
        compensation_interval: Duration,
    ) -> Self {
        Self {
            powered_on_at,
            last_calibration: powered_on_at,
            warm_up,
            compensation_interval,
        }
    }

    /// Device-internal warm-up window has elapsed
    pub fn is_warm(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.powered_on_at) >= self.warm_up
    }

    pub fn compensation_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_calibration) >= self.compensation_interval
    }

    pub fn mark_compensated(&mut self, now: Instant) {
        self.last_calibration = now;
    }

    pub const fn last_calibration_time(&self) -> Instant {
        self.last_calibration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warm_up_gate_starts_on_first_query() {
        let mut gate = WarmUpGate::new(Duration::from_secs(300));

        assert!(!gate.is_warm(Instant::from_secs(1000)));
        assert_eq!(gate.started(), Some(Instant::from_secs(1000)));
        assert!(!gate.is_warm(Instant::from_secs(1299)));
        assert!(gate.is_warm(Instant::from_secs(1300)));
    }

    #[test]
    fn test_warm_up_gate_tolerates_earlier_instant() {
        let mut gate = WarmUpGate::new(Duration::from_secs(300));
        gate.is_warm(Instant::from_secs(500));
        assert!(!gate.is_warm(Instant::from_secs(100)));
    }

    #[test]
    fn test_compensation_cadence() {
        let mut state = CalibrationState::new(
            Instant::from_secs(0),
            Duration::from_secs(1200),
            Duration::from_secs(300),
        );

        assert!(!state.compensation_due(Instant::from_secs(299)));
        assert!(state.compensation_due(Instant::from_secs(300)));

        state.mark_compensated(Instant::from_secs(300));
        assert_eq!(state.last_calibration_time(), Instant::from_secs(300));
        assert!(!state.compensation_due(Instant::from_secs(599)));
        assert!(state.compensation_due(Instant::from_secs(600)));
    }

    #[test]
    fn test_device_warm_up() {
        let state = CalibrationState::new(
            Instant::from_secs(10),
            Duration::from_secs(1200),
            Duration::from_secs(300),
        );

        assert!(!state.is_warm(Instant::from_secs(1209)));
        assert!(state.is_warm(Instant::from_secs(1210)));
    }
}
