//! Counting and histogram runs: config mapping, sensor assembly, and the
//! output paths hung off the run loop.

use crate::cli::HistogramShape;
use eyre::WrapErr;
use heimdall_config::Config;
use heimdall_core::runner::{self, RunParams, RunSummary, SamplingMode};
use heimdall_core::{CycleStatus, DetectorTuning, LaneConfig, Timeouts};
use heimdall_traits::RangeFinder;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Map the validated config onto run parameters, honoring the `--direct`
/// sampling override.
fn run_params(cfg: &Config, direct: bool, max_cycles: Option<u64>) -> RunParams {
    let sampling = if direct {
        SamplingMode::Direct
    } else {
        (&cfg.sensor).into()
    };
    RunParams {
        mode: cfg.detector.algorithm.into(),
        tuning: DetectorTuning::from(&cfg.detector),
        timeouts: Timeouts::from(&cfg.sensor),
        lanes: cfg.lanes.iter().map(LaneConfig::from).collect(),
        sampling,
        sample_rate_hz: cfg.sensor.sample_rate_hz,
        max_cycles,
    }
}

/// Display labels for events and the final summary, resolved once up front.
fn lane_labels(cfg: &Config) -> Vec<String> {
    cfg.lanes
        .iter()
        .enumerate()
        .map(|(i, l)| l.name.clone().unwrap_or_else(|| format!("lane{i}")))
        .collect()
}

#[cfg(feature = "hardware")]
fn make_sensor(cfg: &Config) -> eyre::Result<heimdall_hardware::TfMiniUart> {
    use heimdall_config::RunMode;
    // Free-running matches the sensor's own frame clock; direct and paced
    // runs trigger one measurement per read.
    let sensor = match cfg.sensor.mode {
        RunMode::Event => heimdall_hardware::TfMiniUart::free_running(
            &cfg.sensor.port,
            cfg.sensor.baud,
            cfg.sensor.sample_rate_hz.min(1000) as u16,
        ),
        RunMode::Direct | RunMode::Paced => {
            heimdall_hardware::TfMiniUart::triggered(&cfg.sensor.port, cfg.sensor.baud)
        }
    }
    .wrap_err_with(|| format!("failed to open rangefinder on {}", cfg.sensor.port))?;
    Ok(sensor)
}

/// Simulation builds play a deterministic scene: `HEIMDALL_SIM_PASSES`
/// targets cross the first configured lane, with a background return one
/// below the far sentinel (provably outside every validated zone).
#[cfg(not(feature = "hardware"))]
fn make_sensor(cfg: &Config) -> eyre::Result<heimdall_hardware::SimulatedRangeFinder> {
    let background = cfg.far_sentinel_cm() - 1;
    let target = env_parse("HEIMDALL_SIM_TARGET_CM")
        .unwrap_or_else(|| cfg.lanes.first().map_or(150, |l| (l.min_cm + l.max_cm) / 2));
    let passes = env_parse("HEIMDALL_SIM_PASSES").unwrap_or(3);
    let frames_on = env_parse("HEIMDALL_SIM_FRAMES_ON").unwrap_or(40);
    let frames_off = env_parse("HEIMDALL_SIM_FRAMES_OFF").unwrap_or(60);
    Ok(heimdall_hardware::SimulatedRangeFinder::passing_targets(
        background, target, frames_on, frames_off, passes,
    ))
}

#[cfg(not(feature = "hardware"))]
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

pub fn run_count(
    cfg: &Config,
    cycles: Option<u64>,
    raw_log: Option<&Path>,
    direct: bool,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let sensor = make_sensor(cfg)?;
    let params = run_params(cfg, direct, cycles);
    let labels = lane_labels(cfg);

    let mut raw = match raw_log {
        Some(path) => {
            let mut w = csv::Writer::from_path(path)
                .wrap_err_with(|| format!("failed to open raw log {}", path.display()))?;
            w.write_record(["ms_since_start", "distance_cm"])
                .wrap_err("failed to write raw log header")?;
            Some(w)
        }
        None => None,
    };

    let started = std::time::Instant::now();
    let (summary, _detector) = runner::run(sensor, params, shutdown, |status| {
        let CycleStatus::Processed(report) = status else {
            return;
        };
        if let Some(w) = raw.as_mut() {
            // Raw log write failures do not stop the run.
            let row = [
                report.ms_since_start.to_string(),
                report.distance_cm.to_string(),
            ];
            if let Err(e) = w.write_record(row) {
                tracing::warn!(error = %e, "raw log write failed");
            }
        }
        for ev in &report.departures {
            let label = labels.get(ev.lane).map_or("?", String::as_str);
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "event": "departure",
                        "ms_since_start": report.ms_since_start,
                        "lane": ev.lane,
                        "label": label,
                        "total": ev.total,
                    })
                );
            } else {
                println!(
                    "[{:>8} ms] {label} departure, total {}",
                    report.ms_since_start, ev.total
                );
            }
        }
    })?;

    if let Some(mut w) = raw {
        w.flush().wrap_err("failed to flush raw log")?;
    }

    print_summary(&labels, &summary, json, started.elapsed());
    Ok(())
}

fn print_summary(labels: &[String], summary: &RunSummary, json: bool, wall: Duration) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "event": "summary",
                "labels": labels,
                "totals": summary.totals,
                "cycles": summary.cycles,
                "skipped": summary.skipped,
                "duration_ms": wall.as_millis() as u64,
            })
        );
        return;
    }
    println!("\n--- Lane Totals ---");
    for (label, total) in labels.iter().zip(&summary.totals) {
        println!("{label}: {total}");
    }
    println!("cycles: {} (skipped: {})", summary.cycles, summary.skipped);
    println!("-------------------");
}

pub fn run_histogram(
    cfg: &Config,
    cycles: u64,
    shape: HistogramShape,
    max_cm: Option<i32>,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let sensor = make_sensor(cfg)?;
    let params = run_params(cfg, false, Some(cycles));
    let (summary, detector) = runner::run(sensor, params, shutdown, |_| {})?;
    tracing::debug!(
        cycles = summary.cycles,
        skipped = summary.skipped,
        "histogram sampling finished"
    );

    match shape {
        HistogramShape::Table => print!("{}", detector.histogram_table()),
        HistogramShape::Chart => {
            // Default chart span: the zones plus one bin of margin.
            let clip = max_cm
                .unwrap_or_else(|| cfg.lanes.iter().map(|l| l.max_cm).max().unwrap_or(0) + 100);
            println!("{}", detector.histogram_chart(clip));
        }
    }
    Ok(())
}

pub fn run_self_check(cfg: &Config) -> eyre::Result<()> {
    let mut sensor = make_sensor(cfg)?;
    let timeout = Duration::from_millis(cfg.sensor.read_timeout_ms);
    match sensor.read(timeout) {
        Ok(r) if r.is_weak() => {
            println!("sensor ok (no target in view)");
            Ok(())
        }
        Ok(r) => {
            println!("sensor ok: target at {} cm", r.distance_cm);
            Ok(())
        }
        Err(e) => Err(eyre::eyre!("sensor read failed: {e}")),
    }
}
