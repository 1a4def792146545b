#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motion-control core for the gantry effector (hardware-agnostic).
//!
//! All bus traffic goes through `crane_traits::FrameSink` and
//! `crane_traits::FrameSource`; vision and localization come in through the
//! [`perception::Perception`] seam.
//!
//! ## Architecture
//!
//! - **Codec**: telemetry decode and command encode for the effector board (`codec`)
//! - **Estimation**: bounded telemetry buffer with bracket interpolation (`estimator`)
//! - **Receive path**: background thread feeding the estimator (`receiver`)
//! - **Decision**: nine-state pick-and-place sequencer with hysteresis (`decider`)
//! - **Loop**: `CraneBuilder` wires everything, `Crane` runs cycles (`builder`, `runner`)
//!
//! ## Units
//!
//! Positions are meters everywhere inside the crate. The bus carries signed
//! 16-bit millimeters for telemetry; command scaling is configurable (see
//! `codec::CommandEncoder`).

pub mod builder;
pub mod codec;
pub mod config;
mod conversions;
pub mod decider;
pub mod error;
pub mod estimator;
pub mod fixed_point;
pub mod hw_error;
pub mod mocks;
pub mod perception;
pub mod receiver;
pub mod runner;
pub mod types;
pub mod util;

pub use builder::CraneBuilder;
pub use codec::{COMMAND_ID, CommandEncoder, TELEMETRY_ID, WireCommand, decode_telemetry};
pub use config::{BusCfg, ControlCfg, DeciderCfg, EstimatorCfg, StalePolicy};
pub use decider::{Decider, TaskState};
pub use error::{BuildError, CraneError, Result};
pub use estimator::{PoseEstimator, PoseFeed, PushError};
pub use perception::{Observation, Perception, StaticPerception};
pub use receiver::{ReceiverStats, TelemetryReceiver};
pub use runner::{Crane, CycleOutcome, CycleReport, RunSummary};
pub use types::{Command, PoseSample, Target, TargetKind, localization_from_raw};

/// Convenience re-exports for binaries and tests.
pub mod prelude {
    pub use crate::{
        Command, Crane, CraneBuilder, CraneError, Decider, PoseEstimator, StaticPerception,
        Target, TargetKind, TaskState,
    };
    pub use crane_traits::clock::{Clock, MonotonicClock};
    pub use crane_traits::{CanFrame, FrameSink, FrameSource};
}
