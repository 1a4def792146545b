//! Background telemetry receive thread.
//!
//! Owns the bus `FrameSource`, stamps every frame on arrival, decodes position
//! frames and pushes them into the estimator's [`PoseFeed`]. Transport errors
//! are logged and counted, never propagated.
//!
//! The feed must already exist when `spawn` is called; that ordering is what
//! keeps the receive path from ever seeing a half-built estimator.
//!
//! Each `TelemetryReceiver` owns exactly one thread, shut down and joined on drop.
use crane_traits::FrameSource;
use crane_traits::clock::Clock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::codec::decode_telemetry;
use crate::error::CraneError;
use crate::estimator::{PoseFeed, PushError};
use crate::hw_error::map_hw_error;

/// Poll interval while the buffer is full, so shutdown stays responsive.
const PUSH_POLL: Duration = Duration::from_millis(10);
/// Pause after the first transport error; doubles per consecutive error.
const ERROR_BACKOFF: Duration = Duration::from_millis(10);
/// Longest pause between reads while the link keeps failing.
const MAX_ERROR_BACKOFF: Duration = Duration::from_millis(250);

/// Pause before the next read after `streak` consecutive errors.
/// A closed link goes straight to the longest pause.
fn error_backoff(err: &CraneError, streak: u32) -> Duration {
    if matches!(err, CraneError::Disconnected) {
        return MAX_ERROR_BACKOFF;
    }
    let shift = streak.saturating_sub(1).min(5);
    (ERROR_BACKOFF * (1u32 << shift)).min(MAX_ERROR_BACKOFF)
}

/// Sleep for `total`, waking early on shutdown.
fn pause(shutdown: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::Relaxed) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        std::thread::sleep(left.min(PUSH_POLL));
    }
}

#[derive(Debug, Default)]
struct Counters {
    decoded: AtomicU64,
    ignored: AtomicU64,
    transport_errors: AtomicU64,
    last_ok_ms: AtomicU64,
}

/// Point-in-time copy of the receive counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiverStats {
    /// Position frames decoded and buffered.
    pub decoded: u64,
    /// Frames with another identifier or a short payload.
    pub ignored: u64,
    pub transport_errors: u64,
}

pub struct TelemetryReceiver {
    counters: Arc<Counters>,
    clock: Box<dyn Clock + Send + Sync>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl TelemetryReceiver {
    pub fn spawn<S, C>(
        mut source: S,
        feed: PoseFeed,
        telemetry_id: u32,
        recv_timeout: Duration,
        clock: C,
    ) -> Self
    where
        S: FrameSource + Send + 'static,
        C: Clock + Clone + Send + Sync + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let counters = Arc::new(Counters::default());
        let counters_clone = counters.clone();
        let epoch = clock.now();
        let watchdog_clock: Box<dyn Clock + Send + Sync> = Box::new(clock.clone());

        let join_handle = std::thread::spawn(move || {
            let mut error_streak: u32 = 0;
            'rx: loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("telemetry receiver received shutdown signal");
                    break;
                }

                let received = source.recv(recv_timeout);
                if received.is_ok() && error_streak > 0 {
                    tracing::info!(errors = error_streak, "telemetry link recovered");
                    error_streak = 0;
                }
                let frame = match received {
                    Ok(Some(f)) => f,
                    Ok(None) => continue,
                    Err(e) => {
                        let err = map_hw_error(&*e);
                        counters_clone.transport_errors.fetch_add(1, Ordering::Relaxed);
                        // One warning per failure streak; the rest go to debug.
                        if error_streak == 0 {
                            tracing::warn!(error = %err, "telemetry receive failed");
                        } else {
                            tracing::debug!(error = %err, streak = error_streak, "telemetry receive still failing");
                        }
                        error_streak = error_streak.saturating_add(1);
                        pause(&shutdown_clone, error_backoff(&err, error_streak));
                        continue;
                    }
                };
                let now = clock.now();

                let Some(mut sample) = decode_telemetry(&frame, telemetry_id, now) else {
                    counters_clone.ignored.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(id = frame.id, dlc = frame.dlc, "frame ignored");
                    continue;
                };

                // Back-pressure: wait for the consumer instead of dropping telemetry.
                let mut warned = false;
                loop {
                    match feed.push_timeout(sample, PUSH_POLL) {
                        Ok(()) => break,
                        Err(PushError::Full(s)) => {
                            if !warned {
                                tracing::debug!("telemetry buffer full; waiting for consumer");
                                warned = true;
                            }
                            if shutdown_clone.load(Ordering::Relaxed) {
                                break 'rx;
                            }
                            sample = s;
                        }
                        Err(PushError::Disconnected) => {
                            tracing::debug!("pose estimator dropped, exiting receiver");
                            break 'rx;
                        }
                    }
                }
                counters_clone.decoded.fetch_add(1, Ordering::Relaxed);
                counters_clone
                    .last_ok_ms
                    .store(clock.ms_since(epoch), Ordering::Relaxed);
            }
            tracing::trace!("telemetry receiver exiting cleanly");
        });

        Self {
            counters,
            clock: watchdog_clock,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            decoded: self.counters.decoded.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            transport_errors: self.counters.transport_errors.load(Ordering::Relaxed),
        }
    }

    /// Milliseconds since the last buffered sample, given `now_ms` on the receiver's clock.
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.counters.last_ok_ms.load(Ordering::Relaxed))
    }

    /// Stall measured on the same clock that stamps the samples.
    pub fn stalled_for_now(&self) -> u64 {
        self.stalled_for(self.clock.ms_since(self.epoch))
    }

    /// False once the thread has exited (consumer gone or shutdown).
    pub fn is_running(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TelemetryReceiver {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // The thread exits after its current recv() returns (bounded by recv_timeout)
        // or within one push poll if it is waiting on a full buffer or backing off.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("telemetry receiver joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "telemetry receiver panicked during shutdown");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let err = CraneError::Transport("no buffer space".into());
        assert_eq!(error_backoff(&err, 1), Duration::from_millis(10));
        assert_eq!(error_backoff(&err, 2), Duration::from_millis(20));
        assert_eq!(error_backoff(&err, 5), Duration::from_millis(160));
        assert_eq!(error_backoff(&err, 6), MAX_ERROR_BACKOFF);
        assert_eq!(error_backoff(&err, u32::MAX), MAX_ERROR_BACKOFF);
    }

    #[test]
    fn closed_link_waits_longest() {
        assert_eq!(error_backoff(&CraneError::Disconnected, 1), MAX_ERROR_BACKOFF);
    }

    #[test]
    fn pause_returns_early_on_shutdown() {
        let flag = AtomicBool::new(true);
        let t0 = Instant::now();
        pause(&flag, Duration::from_secs(5));
        assert!(t0.elapsed() < Duration::from_millis(100));
    }
}
