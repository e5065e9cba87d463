// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-interval request throttling

use crate::interrupt::Interrupt;
use std::time::Duration;

/// Sleeps `1/rps` seconds before every request. No burst credit is ever
/// accumulated; `rps = 0` disables throttling.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Option<Duration>,
    interrupt: Interrupt,
}

impl RateLimiter {
    pub fn new(rps: u32) -> Self {
        let interval = match rps {
            0 => None,
            n => Some(Duration::from_secs(1) / n),
        };
        Self {
            interval,
            interrupt: Interrupt::new(),
        }
    }

    /// Let a termination signal cut the wait short
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Wait out the interval. Returns false when a termination signal cut
    /// the wait short; the caller must not send in that case.
    pub fn throttle(&self) -> bool {
        match self.interval {
            Some(interval) => self.interrupt.sleep(interval),
            None => !self.interrupt.is_triggered(),
        }
    }
}
