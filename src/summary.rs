//! One-line human summaries of entries for list views, e.g.
//! `Full • 3×11 (33 reps)` or `5.0 km • 24:30 • (4:54/km)`.

use crate::calc::{self, DISTANCE_KM, DURATION, REPS_LIST, SETS, STYLE};
use crate::models::{format_number, Activity, Entry, FieldDef, MetricValue};

const SEPARATOR: &str = " • ";
const FALLBACK_FIELDS: usize = 3;

pub fn summarize(entry: &Entry, activity: Option<&Activity>) -> String {
    let metrics = &entry.metrics;
    let mut bits: Vec<String> = Vec::new();

    if let Some(MetricValue::Text(style)) = metrics.get(STYLE) {
        if !style.trim().is_empty() {
            bits.push(capitalize(style.trim()));
        }
    }

    let sets = metrics.get(SETS).and_then(MetricValue::as_number);
    let reps = match metrics.get(REPS_LIST) {
        Some(MetricValue::Text(csv)) => parse_csv_nums(csv),
        _ => Vec::new(),
    };
    match (reps.as_slice(), sets) {
        ([], None) => {}
        ([], Some(sets)) => bits.push(format!("{} sets", format_number(sets))),
        ([single], Some(sets)) if sets > 0.0 => bits.push(format!(
            "{}×{} ({} reps)",
            format_number(sets),
            format_number(*single),
            format_number(sets * single)
        )),
        ([single], _) => bits.push(format!("{} reps", format_number(*single))),
        (many, _) => {
            let sum: f64 = many.iter().sum();
            let joined = many.iter().map(|n| format_number(*n)).collect::<Vec<_>>().join("+");
            bits.push(format!("{joined} ({} reps)", format_number(sum)));
        }
    }

    let km = metrics
        .get(DISTANCE_KM)
        .and_then(MetricValue::as_number)
        .filter(|km| *km > 0.0);
    let secs = metrics
        .get(DURATION)
        .and_then(calc::duration_seconds)
        .filter(|secs| *secs > 0.0);
    match (km, secs) {
        (Some(km), Some(secs)) => {
            bits.push(format!("{km:.1} km"));
            bits.push(calc::format_duration(secs));
            bits.push(format!("({})", calc::format_pace(secs / km)));
        }
        (Some(km), None) => bits.push(format!("{km:.1} km")),
        (None, Some(secs)) => bits.push(calc::format_duration(secs)),
        (None, None) => {}
    }

    if bits.is_empty() {
        if let Some(activity) = activity {
            let extras: Vec<String> = activity
                .fields
                .iter()
                .filter_map(|field| metrics.get(&field.key).and_then(|v| describe(field, v)))
                .take(FALLBACK_FIELDS)
                .collect();
            if !extras.is_empty() {
                bits.push(extras.join(SEPARATOR));
            }
        }
    }

    bits.join(SEPARATOR)
}

fn describe(field: &FieldDef, value: &MetricValue) -> Option<String> {
    if value.is_blank() {
        return None;
    }
    let label = if field.label.trim().is_empty() {
        capitalize(&field.key)
    } else {
        field.label.clone()
    };
    match (field.key.as_str(), value) {
        (DISTANCE_KM, v) => v.as_number().map(|km| format!("{km:.1} km")),
        (DURATION, v) => calc::duration_seconds(v).map(calc::format_duration),
        (_, MetricValue::Bool(true)) => Some(label),
        (_, MetricValue::Bool(false)) => None,
        (_, v) => Some(format!("{label}: {v}")),
    }
}

fn parse_csv_nums(csv: &str) -> Vec<f64> {
    csv.split(',')
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .filter(|n| n.is_finite() && *n > 0.0)
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
