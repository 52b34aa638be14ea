//! Monotonic time source
//!
//! Warm-up gates and compensation cadences are measured on a monotonic clock
//! so wall-clock changes (RTC sync) never shorten or extend them.

use embassy_time::Instant;

/// Source of monotonic instants
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Clock backed by the embassy time driver
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    #[inline]
    fn now(&self) -> Instant {
        (**self).now()
    }
}
