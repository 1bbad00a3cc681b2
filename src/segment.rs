// src/segment.rs

use crate::types::{RunConfig, Sample};
use tracing::{debug, warn};

/// A run must span more than two buffered entries to be evaluated at all.
const MIN_RUN_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Accumulating,
}

/// Outcome of a run closed by a gap frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Accepted(Vec<Sample>),
    Rejected { len: usize, first: f64, last: f64 },
}

/// Groups consecutive frames with at least one detection into runs and
/// turns each valid run into samples relative to its anchor frame.
///
/// The buffer is cleared on every Accumulating → Idle transition. A run
/// still open when the stream ends is dropped without evaluation.
pub struct RunSegmenter {
    state: State,
    buffer: Vec<(f64, f64)>, // (position, timestamp_ms)
    entry_max: f64,
    exit_min: f64,
    anchor_reference: f64,
}

impl RunSegmenter {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            state: State::Idle,
            buffer: Vec::new(),
            entry_max: config.entry_max,
            exit_min: config.exit_min,
            anchor_reference: config.anchor_reference,
        }
    }

    /// Feeds the detected positions of one frame. Returns an outcome only
    /// when a gap frame closes a run; multiple detections in one frame
    /// buffer multiple entries sharing that frame's timestamp.
    pub fn observe(&mut self, positions: &[f64], timestamp_ms: f64) -> Option<RunOutcome> {
        if positions.is_empty() {
            return match self.state {
                State::Idle => None,
                State::Accumulating => Some(self.close_run()),
            };
        }

        self.state = State::Accumulating;
        for &position in positions {
            self.buffer.push((position, timestamp_ms));
        }
        None
    }

    fn close_run(&mut self) -> RunOutcome {
        let run = std::mem::take(&mut self.buffer);
        self.state = State::Idle;

        let len = run.len();
        let first = run[0].0;
        let last = run[len - 1].0;

        if len < MIN_RUN_LEN {
            debug!("discarding {len}-entry blip");
            return RunOutcome::Rejected { len, first, last };
        }
        if first > self.entry_max || last < self.exit_min {
            warn!(
                "discarding run outside the drop envelope: len={} first={:.1} last={:.1}",
                len, first, last
            );
            return RunOutcome::Rejected { len, first, last };
        }

        // Earliest entry wins anchor ties.
        let mut anchor = 0;
        for (i, entry) in run.iter().enumerate() {
            if (entry.0 - self.anchor_reference).abs() < (run[anchor].0 - self.anchor_reference).abs()
            {
                anchor = i;
            }
        }
        let anchor_ts = run[anchor].1;

        let samples = run
            .iter()
            .map(|&(position, timestamp_ms)| Sample {
                position,
                delay_ms: anchor_ts - timestamp_ms,
            })
            .collect();
        RunOutcome::Accepted(samples)
    }
}
