// src/main.rs

mod chart;
mod config;
mod detect;
mod fit;
mod segment;
mod source;
mod types;

use anyhow::Result;
use clap::Parser;
use detect::ColorBandDetector;
use segment::{RunOutcome, RunSegmenter};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::{BoundingBox, Config, SampleSet};

/// Extracts the note-drop delay curve from a gameplay capture.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("✓ configuration loaded from {}", args.config.display());

    let samples = collect_samples(&config)?;
    info!("{} samples accumulated", samples.len());

    let poly = fit::fit_polynomial(samples.as_slice(), config.fit.degree)?;
    println!(
        "fitted delay curve (degree {}, over positions [{:.1}, {:.1}]):",
        poly.degree(),
        poly.domain().0,
        poly.domain().1
    );
    print!("{poly}");

    if config.chart.show {
        chart::show(samples.as_slice(), &poly)?;
    }

    Ok(())
}

#[derive(Debug, Default)]
struct RunStats {
    frames: u64,
    frames_with_detections: u64,
    runs_accepted: usize,
    runs_rejected: usize,
}

/// Runs the sequential detect → segment pipeline over the whole stream.
fn collect_samples(config: &Config) -> Result<SampleSet> {
    let mut source = source::open(&config.source)?;
    let detector = ColorBandDetector::new(&config.detection);
    let mut segmenter = RunSegmenter::new(&config.run);

    let mut samples = SampleSet::default();
    let mut stats = RunStats::default();

    while let Some(frame) = source.next_frame()? {
        stats.frames += 1;

        let boxes = match detector.detect(&frame) {
            Ok(boxes) => boxes,
            Err(e) => {
                warn!("skipping frame at {:.1} ms: {e}", frame.timestamp_ms);
                continue;
            }
        };
        if !boxes.is_empty() {
            stats.frames_with_detections += 1;
        }

        let positions: Vec<f64> = boxes.iter().map(BoundingBox::center_y).collect();
        match segmenter.observe(&positions, frame.timestamp_ms) {
            Some(RunOutcome::Accepted(run)) => {
                stats.runs_accepted += 1;
                samples.extend(run);
            }
            Some(RunOutcome::Rejected { .. }) => stats.runs_rejected += 1,
            None => {}
        }

        if stats.frames % 500 == 0 {
            info!(
                "processed {} frames, {} samples so far",
                stats.frames,
                samples.len()
            );
        }
    }

    // A run still open here is dropped without evaluation.
    info!(
        "done: {} frames, {} with detections, {} runs kept, {} discarded",
        stats.frames, stats.frames_with_detections, stats.runs_accepted, stats.runs_rejected
    );
    Ok(samples)
}
