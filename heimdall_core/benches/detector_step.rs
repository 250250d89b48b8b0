use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use heimdall_core::mocks::NoopRangeFinder;
use heimdall_core::{DetectionMode, DetectorTuning, LaneConfig, Timeouts, build_detector};
use heimdall_traits::RangeReading;

// Generate a synthetic trace: alternating background and in-zone streaks
// with additive noise and occasional weak returns.
fn synth_readings(n: usize, seed: u32) -> Vec<RangeReading> {
    // tiny PRNG
    let mut state = seed.max(1);
    let mut next_u32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        x
    };
    let mut v = Vec::with_capacity(n);
    for i in 0..n {
        let r = next_u32();
        if r % 97 == 0 {
            v.push(RangeReading::weak());
            continue;
        }
        let noise = (r % 40) as i32 - 20;
        // ~40-sample passes separated by ~40 samples of empty road
        let base = if (i / 40) % 2 == 0 { 900 } else { 150 };
        v.push(RangeReading::target(base + noise));
    }
    v
}

pub fn bench_detector_step(c: &mut Criterion) {
    let mut g = c.benchmark_group("detector_step");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=10 BENCH_MEAS_MS=50 cargo bench -p heimdall_core --bench detector_step
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }
    if let Ok(ms) = std::env::var("BENCH_MEAS_MS")
        && let Ok(ms_u64) = ms.parse::<u64>()
    {
        g.measurement_time(std::time::Duration::from_millis(ms_u64));
    }

    let n = 10_000usize;
    let trace = synth_readings(n, 0xC0FFEE);

    for mode in [
        DetectionMode::SmoothedThreshold,
        DetectionMode::VotingWindow,
        DetectionMode::StrengthDecay,
    ] {
        g.bench_function(format!("step_{mode:?}"), |b| {
            b.iter_batched(
                || {
                    let mut det = build_detector(
                        NoopRangeFinder,
                        mode,
                        DetectorTuning::default(),
                        Timeouts::default(),
                        vec![LaneConfig::default()],
                        None,
                    )
                    .expect("build detector");
                    det.begin();
                    det
                },
                |mut det| {
                    for &r in &trace {
                        black_box(det.step_from_raw(r));
                    }
                    black_box(det.totals()[0]);
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

criterion_group!(detector, bench_detector_step);
criterion_main!(detector);
