//! Versioned upgrades of the stored document.
//!
//! Each step declares the tables that exist from its version on and may carry
//! an upgrade that rewrites records in place. Steps only ever add, and running
//! a step against already-upgraded data changes nothing.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::models::{Settings, SETTINGS_ID};

pub const CURRENT_VERSION: u32 = 5;

pub struct TableLayout {
    pub name: &'static str,
    pub indexes: &'static str,
}

type Upgrade = fn(&mut Map<String, Value>) -> Result<(), StoreError>;

pub struct Migration {
    pub version: u32,
    pub stores: &'static [TableLayout],
    pub upgrade: Option<Upgrade>,
}

const ACTIVITIES: TableLayout = TableLayout {
    name: "activities",
    indexes: "id,name,archived",
};
const ENTRIES: TableLayout = TableLayout {
    name: "entries",
    indexes: "id,activityId,occurredAt",
};
const SETTINGS: TableLayout = TableLayout {
    name: "settings",
    indexes: "id",
};

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        stores: &[ACTIVITIES, ENTRIES],
        upgrade: None,
    },
    Migration {
        version: 2,
        stores: &[ACTIVITIES, ENTRIES],
        upgrade: Some(backfill_archived),
    },
    Migration {
        version: 3,
        stores: &[ACTIVITIES, ENTRIES],
        upgrade: Some(backfill_presets),
    },
    Migration {
        version: 4,
        stores: &[ACTIVITIES, ENTRIES, SETTINGS],
        upgrade: None,
    },
    Migration {
        version: 5,
        stores: &[ACTIVITIES, ENTRIES, SETTINGS],
        upgrade: Some(seed_default_settings),
    },
];

/// Brings `doc` up to [`CURRENT_VERSION`], returning the versions applied.
pub fn migrate(doc: &mut Value) -> Result<Vec<u32>, StoreError> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| StoreError::Malformed("document is not an object".to_string()))?;

    let found = root
        .get("version")
        .and_then(Value::as_u64)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(0);
    if found > CURRENT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found,
            supported: CURRENT_VERSION,
        });
    }

    let mut applied = Vec::new();
    for migration in MIGRATIONS.iter().filter(|m| m.version > found) {
        for layout in migration.stores {
            if !root.contains_key(layout.name) {
                debug!(table = layout.name, indexes = layout.indexes, "creating table");
                root.insert(layout.name.to_string(), Value::Object(Map::new()));
            }
        }
        if let Some(upgrade) = migration.upgrade {
            upgrade(root)?;
        }
        root.insert("version".to_string(), Value::from(migration.version));
        info!(version = migration.version, "store upgraded");
        applied.push(migration.version);
    }
    Ok(applied)
}

fn table_rows<'a>(
    root: &'a mut Map<String, Value>,
    table: &'static str,
) -> Result<&'a mut Map<String, Value>, StoreError> {
    root.get_mut(table)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| StoreError::Malformed(format!("table {table} is not an object")))
}

fn backfill_archived(root: &mut Map<String, Value>) -> Result<(), StoreError> {
    for activity in table_rows(root, ACTIVITIES.name)?.values_mut() {
        if let Some(fields) = activity.as_object_mut() {
            if !fields.get("archived").is_some_and(Value::is_boolean) {
                fields.insert("archived".to_string(), Value::Bool(false));
            }
        }
    }
    Ok(())
}

fn backfill_presets(root: &mut Map<String, Value>) -> Result<(), StoreError> {
    for activity in table_rows(root, ACTIVITIES.name)?.values_mut() {
        if let Some(fields) = activity.as_object_mut() {
            if !fields.get("presets").is_some_and(Value::is_array) {
                fields.insert("presets".to_string(), Value::Array(Vec::new()));
            }
        }
    }
    Ok(())
}

/// A failure here is logged and swallowed; settings reads fall back to
/// defaults on their own.
fn seed_default_settings(root: &mut Map<String, Value>) -> Result<(), StoreError> {
    let seeded = (|| -> Result<(), StoreError> {
        let rows = table_rows(root, SETTINGS.name)?;
        if !rows.contains_key(SETTINGS_ID) {
            rows.insert(
                SETTINGS_ID.to_string(),
                serde_json::to_value(Settings::default())?,
            );
        }
        Ok(())
    })();
    if let Err(err) = seeded {
        warn!(error = %err, "could not seed default settings");
    }
    Ok(())
}
