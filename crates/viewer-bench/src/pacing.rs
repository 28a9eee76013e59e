//! Fixed-interval pacing applied before every batch dispatch.
//!
//! The delay is configured once per phase and never adapts to observed
//! latency. Because batches are dispatched strictly one after another, the
//! gap between the starts of two consecutive dispatches in a phase is at
//! least the configured delay.

use core::time::Duration;
use tokio_util::sync::CancellationToken;
use viewer_bench_core::{BatchPosition, Error, Result, types::Phase};

/// Per-phase delays, resolved from configuration at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pacing {
    pub spawn: Duration,
    pub reposition: Duration,
}

impl Pacing {
    /// Delay used when a wait flag is absent or given without a value.
    pub const DEFAULT_WAIT: Duration = Duration::from_millis(500);

    pub const fn uniform(delay: Duration) -> Self {
        Self {
            spawn: delay,
            reposition: delay,
        }
    }

    /// Back-to-back dispatch with no induced idle time.
    pub const fn none() -> Self {
        Self::uniform(Duration::ZERO)
    }

    pub const fn delay(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Spawn => self.spawn,
            Phase::Reposition => self.reposition,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::uniform(Self::DEFAULT_WAIT)
    }
}

/// Applies [`Pacing`] and aborts the wait when the run is cancelled.
#[derive(Clone, Debug)]
pub struct PacingClock {
    pacing: Pacing,
    cancel: CancellationToken,
}

impl PacingClock {
    pub const fn new(pacing: Pacing, cancel: CancellationToken) -> Self {
        Self { pacing, cancel }
    }

    /// Waits out the phase delay ahead of the batch at `at`.
    ///
    /// A zero delay returns immediately without touching the timer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the run is cancelled before or during
    /// the wait.
    pub async fn wait(&self, phase: Phase, at: BatchPosition) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled { phase, at });
        }

        let delay = self.pacing.delay(phase);
        if delay.is_zero() {
            return Ok(());
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled { phase, at }),
            () = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
