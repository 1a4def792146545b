use std::time::{Duration, Instant};

use crane_core::{
    CommandEncoder, Decider, DeciderCfg, PoseEstimator, PoseSample, TELEMETRY_ID, Target,
    TargetKind, decode_telemetry,
};
use crane_traits::CanFrame;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{Vector2, Vector3};

fn configure(g: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>) {
    // BENCH_SAMPLE_SIZE=10 cargo bench -p crane_core --bench hot_path
    match std::env::var("BENCH_SAMPLE_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
    {
        Some(n) => g.sample_size(n.max(10)),
        None => g.sample_size(50),
    };
}

pub fn bench_codec(c: &mut Criterion) {
    let mut g = c.benchmark_group("codec");
    configure(&mut g);
    let frame = CanFrame::new(TELEMETRY_ID, &[0x04, 0xB0, 0xFD, 0x0D, 0xFE, 0xFC, 0, 0]);
    let now = Instant::now();
    g.bench_function("decode_telemetry", |b| {
        b.iter(|| decode_telemetry(black_box(&frame), TELEMETRY_ID, now))
    });
    let enc = CommandEncoder::default();
    let cmd = crane_core::Command {
        x: 0.6375,
        y: -0.4874,
        z: -0.26,
        grip: true,
    };
    g.bench_function("encode_command", |b| b.iter(|| enc.encode(black_box(&cmd))));
    g.finish();
}

pub fn bench_estimator(c: &mut Criterion) {
    let mut g = c.benchmark_group("estimator");
    configure(&mut g);
    // 1 kHz telemetry, queried at 50 Hz: 20 pops per query.
    g.bench_function("query_at_50hz_over_1khz", |b| {
        b.iter_batched(
            || {
                let base = Instant::now();
                let (feed, est) = PoseEstimator::channel(2048);
                for i in 0..1000u64 {
                    let x = i as f64 * 1e-3;
                    feed.push(PoseSample::new(
                        Vector3::new(x, -x, 0.0),
                        base + Duration::from_millis(i),
                    ))
                    .ok();
                }
                (feed, est, base)
            },
            |(_feed, mut est, base)| {
                for q in 0..49u64 {
                    let t = base + Duration::from_micros(q * 20_000 + 500);
                    black_box(est.query_at(t).ok());
                }
            },
            BatchSize::SmallInput,
        );
    });
    g.finish();
}

pub fn bench_decider(c: &mut Criterion) {
    let mut g = c.benchmark_group("decider");
    configure(&mut g);
    let targets = vec![
        Target::new(1.0, 1.0, TargetKind::ShortWood),
        Target::new(0.7, 0.1, TargetKind::Weight),
        Target::new(0.2, 0.9, TargetKind::Center),
    ];
    g.bench_function("decide_not_ready", |b| {
        let mut d = Decider::new(DeciderCfg::default());
        let far = Vector3::new(5.0, 5.0, 0.0);
        b.iter(|| {
            d.decide(
                black_box(&far),
                Some(Vector2::new(0.01, 0.02)),
                black_box(&targets),
                false,
            )
        })
    });
    g.finish();
}

criterion_group!(benches, bench_codec, bench_estimator, bench_decider);
criterion_main!(benches);
