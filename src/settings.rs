use tracing::warn;

use crate::db::Database;
use crate::models::{Settings, SettingsPatch, SETTINGS_ID};

/// Current settings. Inserts the defaults when the row is absent; a store
/// without a settings table still gets the defaults.
pub fn get_settings(db: &mut Database) -> Settings {
    match db.settings_table_mut() {
        Ok(table) => match table.get(SETTINGS_ID) {
            Some(settings) => settings.clone(),
            None => {
                let defaults = Settings::default();
                table.put(defaults.clone());
                defaults
            }
        },
        Err(err) => {
            warn!(error = %err, "settings table missing or unreadable, using defaults");
            Settings::default()
        }
    }
}

/// Applies `patch` over the current settings. When the table is unavailable
/// the patched value is still returned for in-memory use.
pub fn save_settings(db: &mut Database, patch: &SettingsPatch) -> Settings {
    let mut next = get_settings(db);
    if let Some(unit) = patch.distance_unit {
        next.distance_unit = unit;
    }
    if let Some(format) = patch.date_format {
        next.date_format = format;
    }
    if let Some(format) = patch.time_format {
        next.time_format = format;
    }
    next.id = SETTINGS_ID.to_string();

    match db.settings_table_mut() {
        Ok(table) => {
            table.put(next.clone());
        }
        Err(err) => warn!(
            error = %err,
            "failed to persist settings, continuing with in-memory values"
        ),
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateFormat, DistanceUnit, TimeFormat};

    #[test]
    fn defaults_are_created_on_first_read() {
        let mut db = Database::default();
        let settings = get_settings(&mut db);
        assert_eq!(settings, Settings::default());
        assert!(db.settings_table().unwrap().get(SETTINGS_ID).is_some());
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut db = Database::default();
        let patch = SettingsPatch {
            distance_unit: Some(DistanceUnit::Mi),
            ..SettingsPatch::default()
        };
        let saved = save_settings(&mut db, &patch);
        assert_eq!(saved.distance_unit, DistanceUnit::Mi);
        assert_eq!(saved.date_format, DateFormat::DayMonthYear);
        assert_eq!(get_settings(&mut db).distance_unit, DistanceUnit::Mi);
    }

    #[test]
    fn missing_table_falls_back_to_defaults() {
        let mut db = Database {
            settings: None,
            ..Database::default()
        };
        assert_eq!(get_settings(&mut db), Settings::default());

        let patch = SettingsPatch {
            time_format: Some(TimeFormat::H12),
            ..SettingsPatch::default()
        };
        assert_eq!(save_settings(&mut db, &patch).time_format, TimeFormat::H12);
        assert!(db.settings.is_none());
    }
}
