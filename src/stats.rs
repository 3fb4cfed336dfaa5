use crate::calc::{self, DISTANCE_KM, DURATION, REPS_LIST, TOTAL_REPS};
use crate::models::{Activity, ActivityKind, Entry, MetricValue};
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeekWindow {
    Four,
    #[default]
    Eight,
}

impl WeekWindow {
    pub fn weeks(self) -> usize {
        match self {
            WeekWindow::Four => 4,
            WeekWindow::Eight => 8,
        }
    }

    pub fn from_weeks(weeks: u32) -> Option<Self> {
        match weeks {
            4 => Some(WeekWindow::Four),
            8 => Some(WeekWindow::Eight),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySeries {
    pub activity_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySeries {
    pub labels: Vec<String>,
    pub week_starts: Vec<String>,
    pub series: Vec<ActivitySeries>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct PaceSeries {
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Per-activity weekly sums of each entry's primary value.
pub fn weekly_totals(
    activities: &[Activity],
    entries: &[Entry],
    today: NaiveDate,
    window: WeekWindow,
) -> WeeklySeries {
    weekly_series(activities, entries, today, window, primary_value)
}

/// Per-activity weekly entry counts.
pub fn weekly_counts(
    activities: &[Activity],
    entries: &[Entry],
    today: NaiveDate,
    window: WeekWindow,
) -> WeeklySeries {
    weekly_series(activities, entries, today, window, |_, _| 1.0)
}

fn weekly_series(
    activities: &[Activity],
    entries: &[Entry],
    today: NaiveDate,
    window: WeekWindow,
    value: impl Fn(&Activity, &Entry) -> f64,
) -> WeeklySeries {
    let week_count = window.weeks();
    let current_week_start = week_start(today);
    let starts: Vec<NaiveDate> = (0..week_count)
        .rev()
        .map(|offset| current_week_start - Duration::weeks(offset as i64))
        .collect();

    let positions: HashMap<&str, usize> = activities
        .iter()
        .enumerate()
        .map(|(idx, a)| (a.id.as_str(), idx))
        .collect();
    let mut sums: Vec<Option<Vec<f64>>> = vec![None; activities.len()];

    for entry in entries {
        let Some(&idx) = positions.get(entry.activity_id.as_str()) else {
            continue;
        };
        let Some(day) = entry.occurred_on() else {
            continue;
        };
        let Some(week) = starts.iter().position(|start| *start == week_start(day)) else {
            continue;
        };
        let row = sums[idx].get_or_insert_with(|| vec![0.0; week_count]);
        row[week] += value(&activities[idx], entry);
    }

    let series = activities
        .iter()
        .zip(sums)
        .filter_map(|(activity, row)| {
            row.map(|data| ActivitySeries {
                activity_id: activity.id.clone(),
                name: activity.name.clone(),
                color: activity.color.clone(),
                data,
            })
        })
        .collect();

    WeeklySeries {
        labels: starts.iter().map(|start| week_label(*start)).collect(),
        week_starts: starts.iter().map(|start| date_key(*start)).collect(),
        series,
    }
}

/// The number an entry contributes to its activity's weekly total.
pub fn primary_value(activity: &Activity, entry: &Entry) -> f64 {
    let metrics = &entry.metrics;
    match activity.kind() {
        ActivityKind::Run | ActivityKind::Walk => metrics
            .get(DISTANCE_KM)
            .and_then(MetricValue::as_number)
            .unwrap_or(0.0),
        ActivityKind::Hold => metrics
            .get(DURATION)
            .and_then(calc::duration_seconds)
            .map(|secs| secs / 60.0)
            .unwrap_or(0.0),
        ActivityKind::Reps => match (metrics.get(TOTAL_REPS), metrics.get(REPS_LIST)) {
            (Some(MetricValue::Number(total)), _) if total.is_finite() => *total,
            (_, Some(MetricValue::Text(csv))) => calc::sum_csv(csv),
            _ => 0.0,
        },
    }
}

/// Seconds per km for every entry of the first run activity with a positive
/// distance and duration, in entry order.
pub fn run_pace_series(activities: &[Activity], entries: &[Entry]) -> PaceSeries {
    let Some(run) = activities.iter().find(|a| a.kind() == ActivityKind::Run) else {
        return PaceSeries::default();
    };

    let mut series = PaceSeries::default();
    for entry in entries.iter().filter(|e| e.activity_id == run.id) {
        let km = entry
            .metrics
            .get(DISTANCE_KM)
            .and_then(MetricValue::as_number)
            .unwrap_or(0.0);
        let secs = entry
            .metrics
            .get(DURATION)
            .and_then(calc::duration_seconds)
            .unwrap_or(0.0);
        if km > 0.0 && secs > 0.0 {
            series.labels.push(entry.occurred_at.clone());
            series.data.push(secs / km);
        }
    }
    series
}

/// Consecutive days ending today that have at least one entry.
pub fn consecutive_active_days(entries: &[Entry], today: NaiveDate) -> u32 {
    let days: HashSet<&str> = entries.iter().map(|e| e.occurred_at.as_str()).collect();
    let mut streak = 0;
    let mut day = today;
    while days.contains(date_key(day).as_str()) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    streak
}

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDef, FieldType, Metrics};

    fn activity(id: &str, name: &str) -> Activity {
        Activity {
            id: id.to_string(),
            name: name.to_string(),
            icon: None,
            color: None,
            fields: vec![FieldDef::new("duration", "Time", FieldType::Duration)],
            archived: false,
            presets: vec![],
            kind: None,
        }
    }

    fn entry(
        id: &str,
        activity_id: &str,
        date: NaiveDate,
        metrics: &[(&str, MetricValue)],
    ) -> Entry {
        Entry {
            id: id.to_string(),
            activity_id: activity_id.to_string(),
            occurred_at: date_key(date),
            notes: None,
            metrics: metrics
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<Metrics>(),
        }
    }

    fn num(n: f64) -> MetricValue {
        MetricValue::Number(n)
    }

    // Monday
    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    #[test]
    fn weekly_window_always_has_every_label() {
        let stats = weekly_totals(&[], &[], today(), WeekWindow::Four);
        assert_eq!(stats.labels.len(), 4);
        assert_eq!(stats.labels.last().map(String::as_str), Some("2026-W02"));
        assert_eq!(stats.week_starts.first().map(String::as_str), Some("2025-12-15"));
        assert!(stats.series.is_empty());

        let stats = weekly_totals(&[], &[], today(), WeekWindow::Eight);
        assert_eq!(stats.labels.len(), 8);
    }

    #[test]
    fn weekly_totals_use_primary_values_and_skip_idle_activities() {
        let activities = vec![
            activity("run", "Run"),
            activity("plank", "Plank"),
            activity("push", "Push-ups"),
            activity("idle", "Squats"),
        ];
        let entries = vec![
            entry("1", "run", today(), &[("distance_km", num(5.0))]),
            entry("2", "run", today() - Duration::days(3), &[("distance_km", num(3.5))]),
            entry("3", "plank", today(), &[("duration", num(120.0))]),
            entry("4", "push", today(), &[("reps_list", MetricValue::Text("10,12".to_string()))]),
            entry("5", "push", today(), &[("total_reps", num(30.0))]),
            entry("6", "idle", today() - Duration::weeks(20), &[("total_reps", num(5.0))]),
        ];

        let stats = weekly_totals(&activities, &entries, today(), WeekWindow::Four);
        assert_eq!(stats.series.len(), 3);

        let run = &stats.series[0];
        assert_eq!(run.data, vec![0.0, 0.0, 3.5, 5.0]);
        assert_eq!(stats.series[1].data[3], 2.0);
        assert_eq!(stats.series[2].data[3], 52.0);
    }

    #[test]
    fn weekly_counts_count_entries() {
        let activities = vec![activity("run", "Run")];
        let entries = vec![
            entry("1", "run", today(), &[]),
            entry("2", "run", today(), &[]),
        ];
        let stats = weekly_counts(&activities, &entries, today(), WeekWindow::Four);
        assert_eq!(stats.series[0].data, vec![0.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn pace_series_only_uses_complete_runs() {
        let activities = vec![activity("walk", "Walk"), activity("run", "Run")];
        let entries = vec![
            entry("1", "run", today(), &[("distance_km", num(5.0)), ("duration", num(1500.0))]),
            entry("2", "run", today(), &[("distance_km", num(0.0)), ("duration", num(600.0))]),
            entry("3", "walk", today(), &[("distance_km", num(2.0)), ("duration", num(1200.0))]),
            entry(
                "4",
                "run",
                today(),
                &[("distance_km", num(2.0)), ("duration", MetricValue::Text("10:00".to_string()))],
            ),
        ];
        let series = run_pace_series(&activities, &entries);
        assert_eq!(series.data, vec![300.0, 300.0]);
        assert_eq!(series.labels, vec!["2026-01-05".to_string(), "2026-01-05".to_string()]);
    }

    #[test]
    fn explicit_kind_overrides_the_name() {
        let mut jog = activity("jog", "Jogging");
        jog.kind = Some(ActivityKind::Run);
        let metrics = [("distance_km", num(4.0)), ("duration", num(1200.0))];
        let entries = vec![entry("1", "jog", today(), &metrics)];
        assert_eq!(run_pace_series(&[jog], &entries).data, vec![300.0]);
    }

    #[test]
    fn streak_counts_back_from_today() {
        assert_eq!(consecutive_active_days(&[], today()), 0);

        let entries = vec![
            entry("1", "a", today(), &[]),
            entry("2", "a", today() - Duration::days(1), &[]),
            entry("3", "a", today() - Duration::days(3), &[]),
        ];
        assert_eq!(consecutive_active_days(&entries, today()), 2);
        assert_eq!(consecutive_active_days(&entries[1..], today()), 0);
    }
}
