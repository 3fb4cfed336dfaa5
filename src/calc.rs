use crate::errors::CoercionError;
use crate::models::{format_number, parse_finite, MetricValue, Metrics};

pub const TOTAL_REPS: &str = "total_reps";
pub const REPS_LIST: &str = "reps_list";
pub const SETS: &str = "sets";
pub const DISTANCE_KM: &str = "distance_km";
pub const DURATION: &str = "duration";
pub const STYLE: &str = "style";

/// Parses `mm:ss`, `hh:mm:ss` or a plain number of seconds.
pub fn parse_duration(raw: &str) -> Result<u32, CoercionError> {
    let invalid = || CoercionError::InvalidDuration(raw.to_string());
    let parts = raw
        .trim()
        .split(':')
        .map(|part| parse_finite(part).filter(|n| *n >= 0.0).ok_or_else(invalid))
        .collect::<Result<Vec<f64>, _>>()?;

    let seconds = match parts.as_slice() {
        [secs] => *secs,
        [mins, secs] => mins * 60.0 + secs,
        [hours, mins, secs] => hours * 3600.0 + mins * 60.0 + secs,
        _ => return Err(invalid()),
    };
    Ok(seconds.round() as u32)
}

/// `h:mm:ss` when there are hours, `m:ss` otherwise.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.round().max(0.0) as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub fn format_pace(seconds_per_km: f64) -> String {
    format!("{}/km", format_duration(seconds_per_km))
}

pub fn sum_csv(csv: &str) -> f64 {
    csv.split(',').filter_map(parse_finite).sum()
}

/// Total repetitions for an entry. A positive `total_reps` wins; otherwise a
/// CSV `reps_list` is summed, or a single rep count is multiplied by `sets`.
pub fn derive_total_reps(metrics: &Metrics) -> f64 {
    if let Some(total) = metrics.get(TOTAL_REPS).and_then(MetricValue::as_number) {
        if total > 0.0 {
            return total;
        }
    }

    let reps_raw = match metrics.get(REPS_LIST) {
        Some(MetricValue::Text(s)) => s.trim().to_string(),
        Some(MetricValue::Number(n)) => format_number(*n),
        _ => String::new(),
    };
    if reps_raw.is_empty() {
        return 0.0;
    }
    if reps_raw.contains(',') {
        return sum_csv(&reps_raw);
    }

    let Some(single) = parse_finite(&reps_raw) else {
        return 0.0;
    };
    let sets = metrics
        .get(SETS)
        .and_then(MetricValue::as_number)
        .filter(|s| *s > 0.0)
        .unwrap_or(1.0);
    single * sets
}

/// Seconds held in a duration metric, whether stored as seconds or as text.
pub fn duration_seconds(value: &MetricValue) -> Option<f64> {
    match value {
        MetricValue::Number(n) if n.is_finite() => Some(*n),
        MetricValue::Text(s) if !s.trim().is_empty() => parse_duration(s).ok().map(f64::from),
        _ => None,
    }
}
