//! Portable backup document: export of every table, and a best-effort import
//! that sanitizes whatever it is given and upserts it by id.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::db::{Database, Table};
use crate::errors::BackupError;
use crate::models::{
    Activity, ActivityKind, DateFormat, DistanceUnit, Entry, FieldDef, FieldType, MetricValue,
    Metrics, Preset, Settings, TimeFormat, SETTINGS_ID,
};

pub const APP_TAG: &str = "repbook";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMeta {
    pub app: String,
    pub version: String,
    pub exported_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupDocument {
    pub meta: BackupMeta,
    pub activities: Vec<Activity>,
    pub entries: Vec<Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub activities: usize,
    pub entries: usize,
    pub settings: bool,
    pub skipped: usize,
}

pub fn export(db: &Database, now: DateTime<Utc>) -> BackupDocument {
    let settings = match db.settings_table() {
        Ok(table) => table.get(SETTINGS_ID).cloned(),
        Err(err) => {
            warn!(error = %err, "exporting without settings");
            None
        }
    };

    BackupDocument {
        meta: BackupMeta {
            app: APP_TAG.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        },
        activities: db.activities.to_vec(),
        entries: db.entries.to_vec(),
        settings,
    }
}

pub fn backup_filename(date: NaiveDate) -> String {
    format!("{APP_TAG}-backup-{}.json", date.format("%Y-%m-%d"))
}

pub fn import_str(db: &mut Database, json: &str) -> Result<ImportSummary, BackupError> {
    let document: Value = serde_json::from_str(json)?;
    import(db, &document)
}

/// Upserts the document's records in one transaction. Records already in the
/// store are replaced wholesale by their sanitized import; nothing is deleted.
pub fn import(db: &mut Database, document: &Value) -> Result<ImportSummary, BackupError> {
    let activities_raw = document.get("activities").and_then(Value::as_array);
    let entries_raw = document.get("entries").and_then(Value::as_array);
    if activities_raw.is_none() && entries_raw.is_none() {
        return Err(BackupError::Invalid);
    }

    let mut summary = ImportSummary::default();
    let mut activities = Vec::new();
    for raw in activities_raw.into_iter().flatten() {
        match sanitize_activity(raw) {
            Some(activity) => activities.push(activity),
            None => summary.skipped += 1,
        }
    }
    let mut entries = Vec::new();
    for raw in entries_raw.into_iter().flatten() {
        match sanitize_entry(raw) {
            Some(entry) => entries.push(entry),
            None => summary.skipped += 1,
        }
    }
    let settings = document
        .get("settings")
        .and_then(Value::as_object)
        .map(sanitize_settings);

    summary.activities = activities.len();
    summary.entries = entries.len();
    summary.settings = settings.is_some();
    if summary.skipped > 0 {
        warn!(skipped = summary.skipped, "backup records without an id were skipped");
    }

    db.transaction(|tx| {
        tx.activities.bulk_put(activities);
        tx.entries.bulk_put(entries);
        if let Some(settings) = settings {
            tx.settings.get_or_insert_with(Table::default).put(settings);
        }
        Ok::<_, BackupError>(())
    })?;

    info!(
        activities = summary.activities,
        entries = summary.entries,
        settings = summary.settings,
        "backup imported"
    );
    Ok(summary)
}

fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        Some(Value::Null) | None => false,
    }
}

fn required_id(fields: &Map<String, Value>) -> Option<String> {
    scalar_string(fields.get("id")).filter(|id| !id.is_empty())
}

fn sanitize_activity(raw: &Value) -> Option<Activity> {
    let fields = raw.as_object()?;
    Some(Activity {
        id: required_id(fields)?,
        name: scalar_string(fields.get("name")).unwrap_or_else(|| "Untitled".to_string()),
        icon: scalar_string(fields.get("icon")).filter(|s| !s.is_empty()),
        color: scalar_string(fields.get("color")).filter(|s| !s.is_empty()),
        fields: fields
            .get("fields")
            .and_then(Value::as_array)
            .map(|defs| defs.iter().filter_map(sanitize_field).collect())
            .unwrap_or_default(),
        archived: truthy(fields.get("archived")),
        presets: fields
            .get("presets")
            .and_then(Value::as_array)
            .map(|presets| presets.iter().filter_map(sanitize_preset).collect())
            .unwrap_or_default(),
        kind: fields
            .get("kind")
            .and_then(|k| serde_json::from_value::<ActivityKind>(k.clone()).ok()),
    })
}

fn sanitize_field(raw: &Value) -> Option<FieldDef> {
    let fields = raw.as_object()?;
    let field_type = scalar_string(fields.get("type"))
        .and_then(|t| FieldType::parse(&t))
        .unwrap_or_default();
    let options = (field_type == FieldType::Enum).then(|| {
        fields
            .get("options")
            .and_then(Value::as_array)
            .map(|opts| opts.iter().filter_map(|o| scalar_string(Some(o))).collect())
            .unwrap_or_default()
    });
    let required = match fields.get("required") {
        None | Some(Value::Null) => None,
        flag => Some(truthy(flag)),
    };

    Some(FieldDef {
        key: scalar_string(fields.get("key")).unwrap_or_default(),
        label: scalar_string(fields.get("label")).unwrap_or_default(),
        field_type,
        options,
        required,
    })
}

fn sanitize_preset(raw: &Value) -> Option<Preset> {
    let fields = raw.as_object()?;
    Some(Preset {
        id: required_id(fields)?,
        name: scalar_string(fields.get("name")).unwrap_or_default(),
        metrics: sanitize_metrics(fields.get("metrics")),
    })
}

fn sanitize_metrics(raw: Option<&Value>) -> Metrics {
    let Some(Value::Object(values)) = raw else {
        return Metrics::new();
    };
    values
        .iter()
        .filter_map(|(key, value)| {
            let metric = match value {
                Value::Bool(b) => MetricValue::Bool(*b),
                Value::Number(n) => MetricValue::Number(n.as_f64()?),
                Value::String(s) => MetricValue::Text(s.clone()),
                _ => return None,
            };
            Some((key.clone(), metric))
        })
        .collect()
}

fn sanitize_entry(raw: &Value) -> Option<Entry> {
    let fields = raw.as_object()?;
    Some(Entry {
        id: required_id(fields)?,
        activity_id: scalar_string(fields.get("activityId")).unwrap_or_default(),
        occurred_at: scalar_string(fields.get("occurredAt")).unwrap_or_default(),
        notes: scalar_string(fields.get("notes")),
        metrics: sanitize_metrics(fields.get("metrics")),
    })
}

fn sanitize_settings(fields: &Map<String, Value>) -> Settings {
    let text = |key: &str| fields.get(key).and_then(Value::as_str).unwrap_or_default();
    Settings {
        id: SETTINGS_ID.to_string(),
        distance_unit: match text("distanceUnit") {
            "mi" => DistanceUnit::Mi,
            _ => DistanceUnit::Km,
        },
        date_format: match text("dateFormat") {
            "YYYY-MM-DD" => DateFormat::Iso,
            "MM/DD/YYYY" => DateFormat::MonthDayYear,
            _ => DateFormat::DayMonthYear,
        },
        time_format: match text("timeFormat") {
            "12h" => TimeFormat::H12,
            _ => TimeFormat::H24,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;
    use chrono::TimeZone;
    use serde_json::json;

    fn seeded() -> Database {
        let mut db = Database::default();
        seed::ensure_seed(&mut db).unwrap();
        let run = db
            .activities
            .values()
            .find(|a| a.name == "Run")
            .map(|a| a.id.clone())
            .unwrap();
        db.entries.put(Entry {
            id: "e1".to_string(),
            activity_id: run,
            occurred_at: "2026-01-05".to_string(),
            notes: None,
            metrics: sanitize_metrics(Some(&json!({ "distance_km": 5, "duration": 1500 }))),
        });
        db
    }

    #[test]
    fn export_then_import_keeps_counts() {
        let mut db = seeded();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap();
        let doc = export(&db, now);
        assert_eq!(doc.meta.app, APP_TAG);
        assert_eq!(doc.meta.exported_at, "2026-01-05T12:00:00.000Z");

        let (activities, entries) = (db.activities.count(), db.entries.count());
        let value = serde_json::to_value(&doc).unwrap();
        let summary = import(&mut db, &value).unwrap();

        assert_eq!(summary.activities, activities);
        assert_eq!(db.activities.count(), activities);
        assert_eq!(db.entries.count(), entries);
    }

    #[test]
    fn invalid_documents_write_nothing() {
        let mut db = Database::default();
        for doc in [json!({}), json!({ "activities": {}, "entries": "x" }), json!([1, 2])] {
            assert!(matches!(import(&mut db, &doc), Err(BackupError::Invalid)));
        }
        assert!(matches!(import_str(&mut db, "{oops"), Err(BackupError::Parse(_))));
        assert_eq!(db.activities.count(), 0);
        assert_eq!(db.entries.count(), 0);
    }

    #[test]
    fn import_sanitizes_loose_records() {
        let mut db = Database::default();
        let doc = json!({
            "activities": [
                { "id": 7, "fields": [
                    {
                        "key": "style", "label": "Style", "type": "enum",
                        "options": ["a", 2], "required": 1
                    },
                    { "key": "x", "type": "matrix" }
                ], "presets": "nope" },
                { "name": "no id" }
            ],
            "entries": [
                { "id": "e1", "activityId": 7, "occurredAt": "2026-01-05", "metrics": [1, 2] }
            ],
            "settings": {
                "distanceUnit": "furlong",
                "dateFormat": "MM/DD/YYYY",
                "timeFormat": "12h"
            }
        });

        let summary = import(&mut db, &doc).unwrap();
        assert_eq!(summary.skipped, 1);

        let activity = db.activities.get("7").unwrap();
        assert_eq!(activity.name, "Untitled");
        assert!(!activity.archived);
        assert!(activity.presets.is_empty());
        assert_eq!(activity.fields[0].options, Some(vec!["a".to_string(), "2".to_string()]));
        assert_eq!(activity.fields[0].required, Some(true));
        assert_eq!(activity.fields[1].field_type, FieldType::Text);

        let entry = db.entries.get("e1").unwrap();
        assert_eq!(entry.activity_id, "7");
        assert!(entry.metrics.is_empty());

        let settings = db.settings_table().unwrap().get("app").unwrap();
        assert_eq!(settings.distance_unit, DistanceUnit::Km);
        assert_eq!(settings.date_format, DateFormat::MonthDayYear);
        assert_eq!(settings.time_format, TimeFormat::H12);
    }

    #[test]
    fn matched_records_are_replaced_others_kept() {
        let mut db = seeded();
        let before = db.activities.count();
        let doc = json!({
            "entries": [
                { "id": "e1", "activityId": "x", "occurredAt": "2026-02-01" },
                { "id": "e2", "activityId": "x", "occurredAt": "2026-02-02", "notes": "new" }
            ]
        });
        import(&mut db, &doc).unwrap();

        assert_eq!(db.activities.count(), before);
        assert_eq!(db.entries.count(), 2);
        let replaced = db.entries.get("e1").unwrap();
        assert_eq!(replaced.occurred_at, "2026-02-01");
        assert!(replaced.metrics.is_empty());
    }

    #[test]
    fn filename_carries_the_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(backup_filename(date), "repbook-backup-2026-03-07.json");
    }
}
