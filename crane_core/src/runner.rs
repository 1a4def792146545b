//! Control loop: perception → pose estimate → decision → command frame.
//!
//! `Crane` is produced by [`crate::builder::CraneBuilder`], which has already
//! built the estimator buffer and armed the receive thread. Each `step` runs
//! one decision cycle; `run` paces steps at `control.rate_hz`.
//!
//! Nothing here is fatal for a single cycle. A cycle without a usable pose or
//! observation is skipped (the previous command stays in force on the board),
//! and send failures are logged and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crane_traits::FrameSink;
use crane_traits::clock::Clock;
use nalgebra::Vector3;

use crate::codec::CommandEncoder;
use crate::config::ControlCfg;
use crate::decider::{Decider, TaskState};
use crate::error::{CraneError, Result};
use crate::estimator::PoseEstimator;
use crate::hw_error::map_hw_error;
use crate::perception::Perception;
use crate::receiver::{ReceiverStats, TelemetryReceiver};
use crate::types::Command;

/// What happened to the command of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Sent,
    /// Encoded but the bus refused it.
    SendFailed(CraneError),
    /// No command this cycle.
    Skipped(CraneError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// State after the decision.
    pub state: TaskState,
    pub circle_count: u32,
    pub pose: Option<Vector3<f64>>,
    pub command: Option<Command>,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub cycles: u64,
    pub sent: u64,
    pub send_errors: u64,
    pub skipped: u64,
    pub final_state: TaskState,
    pub circle_count: u32,
    pub receiver: ReceiverStats,
}

pub struct Crane {
    pub(crate) decider: Decider,
    pub(crate) estimator: PoseEstimator,
    pub(crate) receiver: TelemetryReceiver,
    pub(crate) perception: Box<dyn Perception + Send>,
    pub(crate) sink: Box<dyn FrameSink + Send>,
    pub(crate) encoder: CommandEncoder,
    pub(crate) control: ControlCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) last_command: Option<Command>,
    pub(crate) cycles: u64,
    pub(crate) sent: u64,
    pub(crate) send_errors: u64,
    pub(crate) skipped: u64,
}

impl core::fmt::Debug for Crane {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Crane")
            .field("decider", &self.decider)
            .field("estimator", &self.estimator)
            .field("rate_hz", &self.control.rate_hz)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl Crane {
    pub fn builder() -> crate::builder::CraneBuilder {
        crate::builder::CraneBuilder::default()
    }

    pub fn decider(&self) -> &Decider {
        &self.decider
    }

    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    pub fn receiver_stats(&self) -> ReceiverStats {
        self.receiver.stats()
    }

    /// Milliseconds since the receive thread last buffered a sample.
    pub fn telemetry_stalled_ms(&self) -> u64 {
        self.receiver.stalled_for_now()
    }

    /// Last command handed to the bus, whether or not the send succeeded.
    pub fn last_command(&self) -> Option<Command> {
        self.last_command
    }

    /// Run one decision cycle.
    pub fn step(&mut self) -> CycleReport {
        self.cycles += 1;

        let obs = match self.perception.observe(&*self.clock) {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!(error = %e, "perception failed; skipping cycle");
                return self.skip(None, CraneError::Perception(e.to_string()));
            }
        };

        let pose = match self.estimator.query_bounded(obs.timestamp) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(error = %e, "no pose for this cycle");
                return self.skip(None, e);
            }
        };

        let cmd = self.decider.decide(
            &pose,
            obs.odom_to_map,
            &obs.targets,
            obs.fine_aligned,
        );
        if !cmd.is_finite() {
            tracing::warn!(?cmd, "non-finite command dropped");
            return self.skip(Some(pose), CraneError::InsufficientData);
        }

        let frame = self.encoder.encode(&cmd);
        self.last_command = Some(cmd);
        let outcome = match self.sink.send(&frame) {
            Ok(()) => {
                self.sent += 1;
                CycleOutcome::Sent
            }
            Err(e) => {
                let err = map_hw_error(&*e);
                self.send_errors += 1;
                tracing::warn!(error = %err, "command send failed");
                CycleOutcome::SendFailed(err)
            }
        };

        CycleReport {
            state: self.decider.state(),
            circle_count: self.decider.circle_count(),
            pose: Some(pose),
            command: Some(cmd),
            outcome,
        }
    }

    fn skip(&mut self, pose: Option<Vector3<f64>>, reason: CraneError) -> CycleReport {
        self.skipped += 1;
        CycleReport {
            state: self.decider.state(),
            circle_count: self.decider.circle_count(),
            pose,
            command: None,
            outcome: CycleOutcome::Skipped(reason),
        }
    }

    /// Step at `control.rate_hz` until `shutdown` is set or `max_cycles` cycles have run.
    ///
    /// Fails only when the telemetry feed is gone for good.
    pub fn run(&mut self, shutdown: &AtomicBool, max_cycles: Option<u64>) -> Result<RunSummary> {
        let period = Duration::from_micros(crate::util::period_us(self.control.rate_hz));
        let start_cycles = self.cycles;
        let mut last_state = self.decider.state();
        tracing::info!(rate_hz = self.control.rate_hz, ?max_cycles, "control loop started");

        while !shutdown.load(Ordering::Relaxed) {
            if max_cycles.is_some_and(|n| self.cycles - start_cycles >= n) {
                break;
            }
            let t0 = self.clock.now();
            let report = self.step();

            if report.state != last_state {
                tracing::info!(
                    from = %last_state,
                    to = %report.state,
                    circle = report.circle_count,
                    "task state changed"
                );
                last_state = report.state;
            }
            if let CycleOutcome::Skipped(CraneError::Disconnected) = report.outcome {
                return Err(
                    eyre::Report::new(CraneError::Disconnected)
                        .wrap_err("telemetry receiver stopped"),
                );
            }

            let spent = self.clock.now().saturating_duration_since(t0);
            self.clock.sleep(period.saturating_sub(spent));
        }

        let summary = self.summary();
        tracing::info!(
            cycles = summary.cycles,
            sent = summary.sent,
            skipped = summary.skipped,
            send_errors = summary.send_errors,
            state = %summary.final_state,
            "control loop stopped"
        );
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            cycles: self.cycles,
            sent: self.sent,
            send_errors: self.send_errors,
            skipped: self.skipped,
            final_state: self.decider.state(),
            circle_count: self.decider.circle_count(),
            receiver: self.receiver.stats(),
        }
    }
}
