//! Heuristic, advisory-only time estimates shown to polling clients.
//! Nothing here gates control flow.

use chrono::{DateTime, Utc};

use crate::domain::MediaKind;

pub const SAFETY_MULTIPLIER: f64 = 1.1;

/// Below this progress the percent extrapolation is too noisy to trust much.
const STABLE_PROGRESS_PERCENT: f64 = 30.0;
const LOW_PROGRESS_MAX_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageCost {
    pub base_seconds: f64,
    pub per_content_minute_seconds: f64,
}

const fn cost(base_seconds: f64, per_content_minute_seconds: f64) -> StageCost {
    StageCost {
        base_seconds,
        per_content_minute_seconds,
    }
}

/// Download, process, analyze.
const VIDEO_STAGES: [StageCost; 3] = [cost(10.0, 3.0), cost(5.0, 2.0), cost(15.0, 6.0)];
const AUDIO_STAGES: [StageCost; 3] = [cost(5.0, 1.0), cost(3.0, 1.0), cost(10.0, 5.0)];

pub fn stage_costs(kind: MediaKind) -> &'static [StageCost; 3] {
    match kind {
        MediaKind::Video => &VIDEO_STAGES,
        MediaKind::Audio => &AUDIO_STAGES,
    }
}

/// Expected total wall-clock seconds for content of the given length.
pub fn estimate_processing_time(content_minutes: f64, kind: MediaKind) -> f64 {
    let minutes = content_minutes.max(0.0);
    let total: f64 = stage_costs(kind)
        .iter()
        .map(|stage| stage.base_seconds + minutes * stage.per_content_minute_seconds)
        .sum();
    total * SAFETY_MULTIPLIER
}

pub fn estimate_time_remaining(
    progress_percent: f64,
    started_at: DateTime<Utc>,
    content_minutes: f64,
    kind: MediaKind,
) -> f64 {
    let elapsed = (Utc::now() - started_at).num_milliseconds().max(0) as f64 / 1000.0;
    remaining_after(progress_percent, elapsed, content_minutes, kind)
}

/// Blends the model estimate with `elapsed / progress * (100 - progress)`.
pub fn remaining_after(
    progress_percent: f64,
    elapsed_seconds: f64,
    content_minutes: f64,
    kind: MediaKind,
) -> f64 {
    let progress = progress_percent.clamp(0.0, 100.0);
    if progress >= 100.0 {
        return 0.0;
    }
    let elapsed = elapsed_seconds.max(0.0);
    let model_remaining = (estimate_processing_time(content_minutes, kind) - elapsed).max(0.0);
    if progress <= 0.0 {
        return model_remaining;
    }

    let extrapolated = elapsed / progress * (100.0 - progress);
    let weight = extrapolation_weight(progress);
    (1.0 - weight) * model_remaining + weight * extrapolated
}

fn extrapolation_weight(progress: f64) -> f64 {
    if progress < STABLE_PROGRESS_PERCENT {
        LOW_PROGRESS_MAX_WEIGHT * progress / STABLE_PROGRESS_PERCENT
    } else {
        LOW_PROGRESS_MAX_WEIGHT
            + (1.0 - LOW_PROGRESS_MAX_WEIGHT) * (progress - STABLE_PROGRESS_PERCENT)
                / (100.0 - STABLE_PROGRESS_PERCENT)
    }
}
