// SPDX-License-Identifier: PMPL-1.0-or-later

//! Cooperative interruption
//!
//! Termination signals are received on a tokio runtime and latched into an
//! [`Interrupt`] flag. The execution loop polls the flag before every
//! attempt and while sleeping, then takes the partial-report path.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const SIGINT: i32 = 2;
pub const SIGTERM: i32 = 15;

const SLEEP_SLICE: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    signal: Arc<AtomicI32>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch `signal`. The first signal wins.
    pub fn trigger(&self, signal: i32) {
        let _ = self
            .signal
            .compare_exchange(0, signal, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn signal(&self) -> Option<i32> {
        match self.signal.load(Ordering::SeqCst) {
            0 => None,
            sig => Some(sig),
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.signal().is_some()
    }

    /// Sleep for `duration`, returning early if the flag is raised.
    /// Returns `false` when the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Spawn signal listeners on `runtime` that latch into the returned flag
pub fn start_signal_listener(runtime: &tokio::runtime::Runtime) -> Interrupt {
    let interrupt = Interrupt::new();

    let on_ctrl_c = interrupt.clone();
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::warn!("received SIGINT, finishing current request then writing partial reports");
                on_ctrl_c.trigger(SIGINT);
            }
            Err(e) => log::error!("failed to listen for SIGINT: {}", e),
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let on_term = interrupt.clone();
        runtime.spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    if stream.recv().await.is_some() {
                        log::warn!(
                            "received SIGTERM, finishing current request then writing partial reports"
                        );
                        on_term.trigger(SIGTERM);
                    }
                }
                Err(e) => log::error!("failed to listen for SIGTERM: {}", e),
            }
        });
    }

    interrupt
}
