//! # Text Readout
//!
//! Renders pipeline output as a single status line: the detected note between
//! its neighbours, frequency, cents, a needle bar and the matched target.
//! Text only refreshes every [`TEXT_REFRESH`]; the pipeline itself still runs
//! on every frame.

use std::time::{Duration, Instant};
use tuner_core::display::DisplayMapper;
use tuner_core::tuning::calculate_cents_deviation;
use tuner_core::{PipelineOutput, TuningConfiguration};

/// Minimum time between two printed status lines.
pub const TEXT_REFRESH: Duration = Duration::from_millis(250);

/// Width of the needle bar in characters. Odd, so zero has its own column.
const BAR_WIDTH: usize = 41;

/// Lets an update through at most once per interval.
#[derive(Debug)]
pub struct RefreshGate {
    interval: Duration,
    last: Option<Instant>,
}

impl RefreshGate {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Returns `true` (and restarts the interval) if enough time has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) <= self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Needle bar such as `-----|----[====]----|-----` with the needle as `^`.
pub fn needle_bar(angle: f32, mapper: &DisplayMapper) -> String {
    let max_angle = mapper.config().max_angle;
    let norm = (angle / max_angle).clamp(-1.0, 1.0);
    let needle = ((norm + 1.0) / 2.0 * (BAR_WIDTH - 1) as f32).round() as usize;
    let center = BAR_WIDTH / 2;

    (0..BAR_WIDTH)
        .map(|i| {
            if i == needle {
                '^'
            } else if i == center {
                '|'
            } else {
                '-'
            }
        })
        .collect()
}

/// Formats one status line for `out`.
pub fn format_line(
    out: &PipelineOutput,
    tuning: &TuningConfiguration,
    mapper: &DisplayMapper,
) -> String {
    let notes: Vec<String> = out
        .note
        .neighbors(2)
        .iter()
        .enumerate()
        .map(|(i, note)| {
            if i == 2 {
                format!("[{note}]")
            } else {
                format!(" {note} ")
            }
        })
        .collect();

    let target = out
        .nearest_target_index
        .and_then(|i| tuning.targets().get(i))
        .map(|t| {
            let off = calculate_cents_deviation(out.frequency_hz, t.frequency_hz);
            format!("  string {} {:+.0} c", t.note, off)
        })
        .unwrap_or_default();

    format!(
        "{:<30} {:>5.0} Hz  {:+7.2} c  {}{}{}",
        notes.concat(),
        out.frequency_hz,
        out.stabilized_detune_cents,
        needle_bar(out.angle_radians, mapper),
        if out.tuned { "  IN TUNE" } else { "" },
        target,
    )
}
