//! Online pose estimation from the telemetry stream.
//!
//! The receive path owns a [`PoseFeed`] and pushes decoded samples into a
//! bounded FIFO; the control loop owns the [`PoseEstimator`] and asks for the
//! effector position at arbitrary instants. Positions are linearly interpolated
//! between the two buffered samples that bracket the requested time.
//!
//! Both halves come from [`PoseEstimator::channel`], so the buffer is fully
//! built before anything can push into it. Arm the receive path afterwards.
//!
//! Contract: one consumer, non-decreasing query times, samples pushed in
//! timestamp order. A full buffer blocks the producer; an empty buffer blocks
//! the consumer.
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use nalgebra::Vector3;

use crate::config::{EstimatorCfg, StalePolicy};
use crate::error::CraneError;
use crate::types::PoseSample;
use crate::util::signed_secs;

/// Why a bounded push did not go through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PushError {
    /// Buffer still full when the timeout expired; the sample is handed back.
    Full(PoseSample),
    /// The estimator has been dropped.
    Disconnected,
}

/// Producer half of the telemetry buffer.
pub struct PoseFeed {
    tx: xch::Sender<PoseSample>,
}

impl PoseFeed {
    /// Append a sample, blocking while the buffer is full.
    pub fn push(&self, sample: PoseSample) -> Result<(), CraneError> {
        self.tx.send(sample).map_err(|_| CraneError::Disconnected)
    }

    /// Append a sample, blocking at most `timeout` while the buffer is full.
    pub fn push_timeout(&self, sample: PoseSample, timeout: Duration) -> Result<(), PushError> {
        match self.tx.send_timeout(sample, timeout) {
            Ok(()) => Ok(()),
            Err(xch::SendTimeoutError::Timeout(s)) => Err(PushError::Full(s)),
            Err(xch::SendTimeoutError::Disconnected(_)) => Err(PushError::Disconnected),
        }
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }
}

/// Consumer half: bracket tracking and interpolation.
pub struct PoseEstimator {
    rx: xch::Receiver<PoseSample>,
    capacity: usize,
    ahead: Option<PoseSample>,
    behind: Option<PoseSample>,
    last_estimate: Option<Vector3<f64>>,
    query_timeout: Duration,
    stale_policy: StalePolicy,
}

impl core::fmt::Debug for PoseEstimator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PoseEstimator")
            .field("capacity", &self.capacity)
            .field("buffered", &self.rx.len())
            .field("ahead", &self.ahead.map(|s| s.position))
            .field("behind", &self.behind.map(|s| s.position))
            .finish()
    }
}

impl PoseEstimator {
    /// Build the buffer and both halves with default query settings.
    pub fn channel(capacity: usize) -> (PoseFeed, PoseEstimator) {
        Self::with_config(&EstimatorCfg {
            capacity,
            ..EstimatorCfg::default()
        })
    }

    pub fn with_config(cfg: &EstimatorCfg) -> (PoseFeed, PoseEstimator) {
        let capacity = cfg.capacity.max(1);
        let (tx, rx) = xch::bounded(capacity);
        let est = PoseEstimator {
            rx,
            capacity,
            ahead: None,
            behind: None,
            last_estimate: None,
            query_timeout: Duration::from_millis(cfg.query_timeout_ms),
            stale_policy: cfg.stale_policy,
        };
        (PoseFeed { tx }, est)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// Current `(ahead, behind)` pair, once both exist.
    pub fn bracket(&self) -> Option<(PoseSample, PoseSample)> {
        Some((self.ahead?, self.behind?))
    }

    /// Last interpolated position, falling back to the newest consumed sample.
    pub fn last_known(&self) -> Option<Vector3<f64>> {
        self.last_estimate
            .or_else(|| self.behind.map(|s| s.position))
            .or_else(|| self.ahead.map(|s| s.position))
    }

    /// Position at `t`, blocking until a sample newer than `t` has arrived.
    ///
    /// Fails with `InsufficientData` if `t` precedes every sample seen so far
    /// and with `Disconnected` once the feed is gone and the buffer drained.
    pub fn query_at(&mut self, t: Instant) -> Result<Vector3<f64>, CraneError> {
        self.advance(t, |rx| rx.recv().map_err(|_| CraneError::Disconnected))?;
        self.interpolate(t)
    }

    /// Like [`query_at`](Self::query_at), but gives up at `deadline` and then
    /// applies the configured [`StalePolicy`].
    pub fn query_before(
        &mut self,
        t: Instant,
        deadline: Instant,
    ) -> Result<Vector3<f64>, CraneError> {
        let advanced = self.advance(t, |rx| {
            rx.recv_deadline(deadline).map_err(|e| match e {
                xch::RecvTimeoutError::Timeout => CraneError::Timeout,
                xch::RecvTimeoutError::Disconnected => CraneError::Disconnected,
            })
        });
        match advanced {
            Ok(()) => self.interpolate(t),
            Err(CraneError::Timeout) => match self.stale_policy {
                StalePolicy::LastKnown => {
                    let p = self.last_known().ok_or(CraneError::Timeout)?;
                    tracing::debug!("pose query timed out; holding last known position");
                    Ok(p)
                }
                StalePolicy::Fail => Err(CraneError::Timeout),
            },
            Err(e) => Err(e),
        }
    }

    /// Bounded query using the configured timeout. The wait is wall time;
    /// `t` is on whatever clock stamped the samples.
    pub fn query_bounded(&mut self, t: Instant) -> Result<Vector3<f64>, CraneError> {
        let deadline = Instant::now() + self.query_timeout;
        self.query_before(t, deadline)
    }

    /// Move the bracket forward until `behind` is strictly after `t`.
    ///
    /// Every consumed sample at or before `t` becomes `ahead`, so the ahead
    /// pointer never moves backwards.
    fn advance<F>(&mut self, t: Instant, mut pop: F) -> Result<(), CraneError>
    where
        F: FnMut(&xch::Receiver<PoseSample>) -> Result<PoseSample, CraneError>,
    {
        loop {
            match self.behind {
                Some(b) if b.timestamp > t => return Ok(()),
                Some(b) => self.ahead = Some(b),
                None => {}
            }
            self.behind = Some(pop(&self.rx)?);
        }
    }

    fn interpolate(&mut self, t: Instant) -> Result<Vector3<f64>, CraneError> {
        let (Some(a), Some(b)) = (self.ahead, self.behind) else {
            return Err(CraneError::InsufficientData);
        };
        let span = signed_secs(a.timestamp, b.timestamp);
        if span <= 0.0 {
            return Err(CraneError::InsufficientData);
        }
        let k = signed_secs(a.timestamp, t) / span;
        let p = a.position + (b.position - a.position) * k;
        tracing::trace!(k, x = p.x, y = p.y, z = p.z, "pose interpolated");
        self.last_estimate = Some(p);
        Ok(p)
    }
}
