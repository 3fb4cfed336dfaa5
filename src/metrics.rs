//! Schema-directed metric coercion.
//!
//! Form controls deliver loosely typed input; each activity field decides how
//! that input becomes a stored metric. [`FieldValue`] is the typed view of one
//! metric, [`MetricValue`] the shape it takes in the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::calc::{self, REPS_LIST, SETS, TOTAL_REPS};
use crate::errors::CoercionError;
use crate::models::{
    format_number, parse_finite, Activity, FieldDef, FieldType, MetricValue, Metrics,
};

/// Raw value of one form control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormInput {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl From<MetricValue> for FormInput {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Bool(b) => FormInput::Flag(b),
            MetricValue::Number(n) => FormInput::Number(n),
            MetricValue::Text(s) => FormInput::Text(s),
        }
    }
}

impl From<&str> for FormInput {
    fn from(value: &str) -> Self {
        FormInput::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Duration(u32),
    Enum(String),
    Date(String),
    Bool(bool),
}

impl FieldValue {
    pub fn into_metric(self) -> MetricValue {
        match self {
            FieldValue::Number(n) => MetricValue::Number(n),
            FieldValue::Duration(secs) => MetricValue::Number(f64::from(secs)),
            FieldValue::Text(s) | FieldValue::Enum(s) | FieldValue::Date(s) => MetricValue::Text(s),
            FieldValue::Bool(b) => MetricValue::Bool(b),
        }
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn input_text(input: &FormInput) -> Option<String> {
    match input {
        FormInput::Text(s) => non_blank(s),
        FormInput::Number(n) if n.is_finite() => Some(format_number(*n)),
        _ => None,
    }
}

/// Coerces one form input according to its field. `Ok(None)` means the key is
/// left out of the entry.
pub fn coerce(field: &FieldDef, input: &FormInput) -> Result<Option<FieldValue>, CoercionError> {
    let value = match field.field_type {
        FieldType::Number => match input {
            FormInput::Number(n) if n.is_finite() => Some(FieldValue::Number(*n)),
            FormInput::Text(s) => parse_finite(s).map(FieldValue::Number),
            _ => None,
        },
        FieldType::Duration => match input {
            FormInput::Number(n) if n.is_finite() && *n >= 0.0 => {
                Some(FieldValue::Duration(n.round() as u32))
            }
            FormInput::Text(s) if !s.trim().is_empty() => {
                Some(FieldValue::Duration(calc::parse_duration(s)?))
            }
            _ => None,
        },
        FieldType::Bool => {
            let checked = match input {
                FormInput::Flag(b) => *b,
                FormInput::Text(s) => matches!(s.trim(), "on" | "true" | "checked"),
                FormInput::Number(_) => false,
            };
            Some(FieldValue::Bool(checked))
        }
        FieldType::Enum => input_text(input).map(FieldValue::Enum),
        FieldType::Text => input_text(input).map(FieldValue::Text),
        FieldType::Date => input_text(input).map(FieldValue::Date),
    };
    Ok(value)
}

/// Coerces a whole draft against the activity's fields. Undeclared keys are
/// dropped and `total_reps` is recomputed whenever sets or reps are present.
pub fn coerce_metrics(
    activity: &Activity,
    inputs: &BTreeMap<String, FormInput>,
) -> Result<Metrics, CoercionError> {
    let mut metrics = Metrics::new();
    for field in &activity.fields {
        let Some(input) = inputs.get(&field.key) else {
            continue;
        };
        if let Some(value) = coerce(field, input)? {
            metrics.insert(field.key.clone(), value.into_metric());
        }
    }

    for key in inputs.keys() {
        if activity.field(key).is_none() && key != TOTAL_REPS {
            debug!(activity = %activity.id, key = %key, "dropping undeclared metric");
        }
    }

    refresh_total_reps(&mut metrics);
    Ok(metrics)
}

pub fn refresh_total_reps(metrics: &mut Metrics) {
    if !metrics.contains_key(SETS) && !metrics.contains_key(REPS_LIST) {
        return;
    }
    metrics.remove(TOTAL_REPS);
    let total = calc::derive_total_reps(metrics);
    if total > 0.0 {
        metrics.insert(TOTAL_REPS.to_string(), MetricValue::Number(total));
    }
}

/// Typed reading of stored metrics, keyed by the activity's declared fields.
/// Values that do not fit their field's type are skipped.
pub fn typed_view(fields: &[FieldDef], metrics: &Metrics) -> BTreeMap<String, FieldValue> {
    let mut view = BTreeMap::new();
    for field in fields {
        let Some(stored) = metrics.get(&field.key) else {
            continue;
        };
        let typed = match field.field_type {
            FieldType::Number => stored.as_number().map(FieldValue::Number),
            FieldType::Duration => calc::duration_seconds(stored)
                .filter(|s| *s >= 0.0)
                .map(|s| FieldValue::Duration(s.round() as u32)),
            FieldType::Bool => match stored {
                MetricValue::Bool(b) => Some(FieldValue::Bool(*b)),
                _ => None,
            },
            FieldType::Enum => stored.as_str().map(|s| FieldValue::Enum(s.to_string())),
            FieldType::Text => Some(FieldValue::Text(stored.to_string())),
            FieldType::Date => stored.as_str().map(|s| FieldValue::Date(s.to_string())),
        };
        if let Some(typed) = typed {
            view.insert(field.key.clone(), typed);
        }
    }
    view
}
