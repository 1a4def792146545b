use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crane_core::mocks::{FailingSink, IdleSource, RecordingSink, ScriptedSource};
use crane_core::{
    BuildError, BusCfg, ControlCfg, Crane, CraneBuilder, CycleOutcome, EstimatorCfg,
    StalePolicy, StaticPerception, Target, TargetKind, TaskState, WireCommand,
};
use crane_hardware::SimulatedGantry;
use crane_traits::clock::{Clock, ManualClock};
use nalgebra::Vector2;

fn weight_scene() -> StaticPerception {
    StaticPerception::new(vec![Target::new(0.7, 0.1, TargetKind::Weight)])
        .with_latency(Duration::from_millis(5))
}

#[test]
fn try_build_reports_missing_pieces() {
    let err = Crane::builder().try_build().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingCommandSink)
    ));

    let err = CraneBuilder::default()
        .with_command_sink(RecordingSink::new())
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingTelemetrySource)
    ));

    let err = CraneBuilder::default()
        .with_command_sink(RecordingSink::new())
        .with_telemetry_source(IdleSource)
        .try_build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingPerception)
    ));
}

#[test]
fn build_rejects_invalid_config() {
    let err = Crane::builder()
        .with_command_sink(RecordingSink::new())
        .with_telemetry_source(IdleSource)
        .with_perception(weight_scene())
        .with_control(ControlCfg { rate_hz: 0 })
        .build()
        .unwrap_err();
    assert!(format!("{err}").contains("rate_hz"));
}

#[test]
fn cycle_without_telemetry_is_skipped() {
    let sink = RecordingSink::new();
    let mut crane = Crane::builder()
        .with_command_sink(sink.clone())
        .with_telemetry_source(ScriptedSource::frames([]))
        .with_perception(weight_scene())
        .with_estimator(EstimatorCfg {
            query_timeout_ms: 10,
            ..EstimatorCfg::default()
        })
        .build()
        .unwrap();

    let report = crane.step();
    assert_eq!(report.command, None);
    assert!(matches!(report.outcome, CycleOutcome::Skipped(_)));
    assert!(sink.frames().is_empty());
    assert_eq!(crane.summary().skipped, 1);
}

#[test]
fn injected_clock_drives_stamps_and_pacing() {
    let clock = Arc::new(ManualClock::new());
    let gantry = SimulatedGantry::new().with_period(Duration::from_millis(1));
    let (cmd, telemetry) = gantry.split();
    let mut crane = Crane::builder()
        .with_command_sink(cmd)
        .with_telemetry_source(telemetry)
        .with_perception(weight_scene())
        .with_estimator(EstimatorCfg {
            query_timeout_ms: 200,
            stale_policy: StalePolicy::Fail,
            ..EstimatorCfg::default()
        })
        .with_clock(clock.clone())
        .build()
        .unwrap();

    // Telemetry collected so far is stamped at the clock origin.
    std::thread::sleep(Duration::from_millis(20));
    for _ in 0..5 {
        clock.advance(Duration::from_millis(20));
        assert_eq!(crane.step().outcome, CycleOutcome::Sent);
    }

    let summary = crane.run(&AtomicBool::new(false), Some(5)).unwrap();
    assert_eq!(summary.sent, 10);
    assert_eq!(summary.skipped, 0);
    // 50 Hz pacing sleeps on the injected clock, not the wall.
    assert_eq!(clock.ms_since(clock.origin()), 200);
}

#[test]
fn send_failures_are_counted_not_fatal() {
    let gantry = SimulatedGantry::new().with_period(Duration::from_millis(1));
    let (_cmd, telemetry) = gantry.split();
    let mut crane = Crane::builder()
        .with_command_sink(FailingSink)
        .with_telemetry_source(telemetry)
        .with_perception(weight_scene())
        .with_control(ControlCfg { rate_hz: 200 })
        .build()
        .unwrap();

    let shutdown = AtomicBool::new(false);
    let summary = crane.run(&shutdown, Some(20)).unwrap();
    assert_eq!(summary.cycles, 20);
    assert_eq!(summary.sent, 0);
    assert!(summary.send_errors > 0);
    assert_eq!(summary.send_errors + summary.skipped, 20);
    assert!(crane.last_command().is_some());
}

#[test]
fn unlocalized_scene_sends_neutral_commands() {
    let gantry = SimulatedGantry::new().with_period(Duration::from_millis(1));
    let handle = gantry.handle();
    let (_cmd, telemetry) = gantry.split();
    let sink = RecordingSink::new();
    let mut crane = Crane::builder()
        .with_command_sink(sink.clone())
        .with_telemetry_source(telemetry)
        .with_perception(weight_scene().with_odom_to_map(None))
        .build()
        .unwrap();

    for _ in 0..10 {
        crane.step();
    }
    assert_eq!(crane.decider().state(), TaskState::ForApprox);
    let frames = sink.frames();
    assert!(!frames.is_empty());
    for f in frames {
        assert_eq!(WireCommand::from_bytes(&f.data), Some(WireCommand::default()));
    }
    handle.close();
}

#[test]
fn simulated_gantry_reaches_the_weight() {
    let gantry = SimulatedGantry::new()
        .with_speed(20_000.0)
        .with_period(Duration::from_millis(1));
    let handle = gantry.handle();
    let (cmd, telemetry) = gantry.split();

    let mut crane = Crane::builder()
        .with_command_sink(cmd)
        .with_telemetry_source(telemetry)
        .with_perception(weight_scene().with_odom_to_map(Some(Vector2::zeros())))
        .with_bus(BusCfg {
            recv_timeout_ms: 5,
            ..BusCfg::default()
        })
        .build()
        .unwrap();

    let mut reached = false;
    for _ in 0..1500 {
        let report = crane.step();
        assert!(!matches!(report.outcome, CycleOutcome::SendFailed(_)));
        if report.state == TaskState::BeforeCrawl {
            reached = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(reached, "stuck in {}", crane.decider().state());
    assert_eq!(crane.decider().circle_count(), 2);
    assert!(handle.commands_seen() > 0);
    let stats = crane.receiver_stats();
    assert!(stats.decoded > 0);
    assert_eq!(stats.transport_errors, 0);
}
