use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::errors::ValidationError;
use crate::models::{Activity, Metrics};

pub const RESERVED_KEY: &str = "occurredAt";

static FIELD_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("static pattern"));

pub fn is_valid_key(key: &str) -> bool {
    FIELD_KEY.is_match(key)
}

pub fn validate_activity(activity: &Activity) -> Result<(), ValidationError> {
    if activity.name.trim().is_empty() {
        return Err(ValidationError::NameRequired);
    }

    let mut seen = HashSet::new();
    for field in &activity.fields {
        if field.key == RESERVED_KEY {
            return Err(ValidationError::ReservedKey);
        }
        if !is_valid_key(&field.key) {
            let shown = if field.key.is_empty() { "(empty)" } else { &field.key };
            return Err(ValidationError::InvalidKey(shown.to_string()));
        }
        if !seen.insert(field.key.as_str()) {
            return Err(ValidationError::DuplicateKey(field.key.clone()));
        }
    }
    Ok(())
}

/// Every required field of the activity must carry a non-blank value.
pub fn check_required(activity: &Activity, metrics: &Metrics) -> Result<(), ValidationError> {
    for field in activity.fields.iter().filter(|f| f.is_required()) {
        match metrics.get(&field.key) {
            Some(value) if !value.is_blank() => {}
            _ => return Err(ValidationError::MissingRequired(field.label.clone())),
        }
    }
    Ok(())
}
