//! Validating builder for [`Crane`].
//!
//! `build()` is the only place the receive path is armed: the estimator buffer
//! and its producer handle are created first, then the producer is moved into
//! a freshly spawned [`TelemetryReceiver`]. Nothing can push before the buffer
//! exists.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crane_traits::clock::{Clock, MonotonicClock};
use crane_traits::{FrameSink, FrameSource};

use crate::codec::CommandEncoder;
use crate::config::{BusCfg, ControlCfg, DeciderCfg, EstimatorCfg};
use crate::decider::Decider;
use crate::error::{BuildError, Result};
use crate::estimator::PoseEstimator;
use crate::perception::Perception;
use crate::receiver::TelemetryReceiver;
use crate::runner::Crane;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

type BoxedSource = Box<dyn FrameSource + Send>;

/// Builder for `Crane`. Configuration is validated on `build()`.
pub struct CraneBuilder<K = Missing, T = Missing, P = Missing> {
    sink: Option<Box<dyn FrameSink + Send>>,
    source: Option<BoxedSource>,
    perception: Option<Box<dyn Perception + Send>>,
    decider: Option<DeciderCfg>,
    estimator: Option<EstimatorCfg>,
    bus: Option<BusCfg>,
    control: Option<ControlCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _k: PhantomData<K>,
    _t: PhantomData<T>,
    _p: PhantomData<P>,
}

impl Default for CraneBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            sink: None,
            source: None,
            perception: None,
            decider: None,
            estimator: None,
            bus: None,
            control: None,
            clock: None,
            _k: PhantomData,
            _t: PhantomData,
            _p: PhantomData,
        }
    }
}

fn validate(
    decider: &DeciderCfg,
    estimator: &EstimatorCfg,
    bus: &BusCfg,
    control: &ControlCfg,
) -> std::result::Result<(), BuildError> {
    if !(decider.judge_distance.is_finite() && decider.judge_distance > 0.0) {
        return Err(BuildError::InvalidConfig("judge_distance must be > 0"));
    }
    let heights = [
        decider.safe_height,
        decider.crawl_height,
        decider.short_place_height,
        decider.tall_place_height,
    ];
    if heights.iter().any(|h| !h.is_finite()) {
        return Err(BuildError::InvalidConfig("heights must be finite"));
    }
    if estimator.capacity == 0 {
        return Err(BuildError::InvalidConfig("estimator capacity must be >= 1"));
    }
    if estimator.query_timeout_ms == 0 {
        return Err(BuildError::InvalidConfig("query_timeout_ms must be >= 1"));
    }
    if bus.command_id == bus.telemetry_id {
        return Err(BuildError::InvalidConfig(
            "command and telemetry ids must differ",
        ));
    }
    if bus.recv_timeout_ms == 0 {
        return Err(BuildError::InvalidConfig("recv_timeout_ms must be >= 1"));
    }
    if !(bus.position_scale.is_finite() && bus.position_scale > 0.0) {
        return Err(BuildError::InvalidConfig("position_scale must be > 0"));
    }
    if !(bus.z_scale.is_finite() && bus.z_scale > 0.0) {
        return Err(BuildError::InvalidConfig("z_scale must be > 0"));
    }
    if control.rate_hz == 0 {
        return Err(BuildError::InvalidConfig("rate_hz must be > 0"));
    }
    Ok(())
}

impl<K, T, P> CraneBuilder<K, T, P> {
    /// Fallible build available in any type-state; reports the first missing piece.
    pub fn try_build(self) -> Result<Crane> {
        let sink = self
            .sink
            .ok_or_else(|| eyre::Report::new(BuildError::MissingCommandSink))?;
        let source = self
            .source
            .ok_or_else(|| eyre::Report::new(BuildError::MissingTelemetrySource))?;
        let perception = self
            .perception
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPerception))?;

        let decider_cfg = self.decider.unwrap_or_default();
        let estimator_cfg = self.estimator.unwrap_or_default();
        let bus = self.bus.unwrap_or_default();
        let control = self.control.unwrap_or_default();
        validate(&decider_cfg, &estimator_cfg, &bus, &control).map_err(eyre::Report::new)?;

        let clock: Arc<dyn Clock + Send + Sync> =
            self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));

        // Build: the buffer and both of its halves exist from here on.
        let (feed, estimator) = PoseEstimator::with_config(&estimator_cfg);
        // Arm: only now does anything start pushing.
        let receiver = TelemetryReceiver::spawn(
            source,
            feed,
            bus.telemetry_id,
            Duration::from_millis(bus.recv_timeout_ms),
            clock.clone(),
        );
        tracing::info!(
            capacity = estimator.capacity(),
            telemetry_id = bus.telemetry_id,
            command_id = bus.command_id,
            "telemetry receiver armed"
        );

        Ok(Crane {
            decider: Decider::new(decider_cfg),
            estimator,
            receiver,
            perception,
            sink,
            encoder: CommandEncoder {
                command_id: bus.command_id,
                position_scale: bus.position_scale,
                z_scale: bus.z_scale,
            },
            control,
            clock,
            last_command: None,
            cycles: 0,
            sent: 0,
            send_errors: 0,
            skipped: 0,
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<K, T, P> CraneBuilder<K, T, P> {
    pub fn with_decider(mut self, cfg: DeciderCfg) -> Self {
        self.decider = Some(cfg);
        self
    }

    pub fn with_estimator(mut self, cfg: EstimatorCfg) -> Self {
        self.estimator = Some(cfg);
        self
    }

    pub fn with_bus(mut self, cfg: BusCfg) -> Self {
        self.bus = Some(cfg);
        self
    }

    pub fn with_control(mut self, cfg: ControlCfg) -> Self {
        self.control = Some(cfg);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Apply every section of a loaded TOML config.
    pub fn with_config(self, cfg: &crane_config::Config) -> Self {
        self.with_decider((&cfg.decider).into())
            .with_estimator((&cfg.estimator).into())
            .with_bus(cfg.into())
            .with_control((&cfg.control).into())
    }

    fn retype<K2, T2, P2>(self) -> CraneBuilder<K2, T2, P2> {
        CraneBuilder {
            sink: self.sink,
            source: self.source,
            perception: self.perception,
            decider: self.decider,
            estimator: self.estimator,
            bus: self.bus,
            control: self.control,
            clock: self.clock,
            _k: PhantomData,
            _t: PhantomData,
            _p: PhantomData,
        }
    }
}

// Setters that advance type-state
impl<T, P> CraneBuilder<Missing, T, P> {
    pub fn with_command_sink(
        mut self,
        sink: impl FrameSink + Send + 'static,
    ) -> CraneBuilder<Set, T, P> {
        self.sink = Some(Box::new(sink));
        self.retype()
    }
}

impl<K, P> CraneBuilder<K, Missing, P> {
    pub fn with_telemetry_source(
        mut self,
        source: impl FrameSource + Send + 'static,
    ) -> CraneBuilder<K, Set, P> {
        self.source = Some(Box::new(source));
        self.retype()
    }
}

impl<K, T> CraneBuilder<K, T, Missing> {
    pub fn with_perception(
        mut self,
        perception: impl Perception + Send + 'static,
    ) -> CraneBuilder<K, T, Set> {
        self.perception = Some(Box::new(perception));
        self.retype()
    }
}

impl CraneBuilder<Set, Set, Set> {
    /// Validate, build the estimator, arm the receiver. Only available once
    /// sink, source and perception are set.
    pub fn build(self) -> Result<Crane> {
        self.try_build()
    }
}
