use crate::db::{Database, Table};
use crate::errors::StoreError;
use crate::migrations::migrate;
use crate::models::{Settings, SETTINGS_ID};
use serde_json::Value;
use std::{env, path::Path, path::PathBuf};
use tokio::fs;
use tracing::{error, info, warn};

pub const DEFAULT_DATA_PATH: &str = "data/repbook.json";

pub fn resolve_data_path() -> PathBuf {
    if let Ok(path) = env::var("APP_DATA_PATH") {
        return PathBuf::from(path);
    }

    PathBuf::from(DEFAULT_DATA_PATH)
}

/// Reads and migrates the stored document. A missing file starts an empty
/// store; an unparsable one is moved aside and replaced by an empty store.
pub async fn load_database(path: &Path) -> Result<Database, StoreError> {
    let mut doc = match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(doc) => doc,
            Err(err) => {
                error!("failed to parse data file: {err}");
                set_aside(path).await;
                Value::Object(Default::default())
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
        Err(err) => {
            error!("failed to read data file: {err}");
            return Err(err.into());
        }
    };

    let applied = migrate(&mut doc)?;
    if !applied.is_empty() {
        info!(path = %path.display(), ?applied, "migrated data file");
    }

    let settings = doc.as_object_mut().and_then(|root| root.remove("settings"));
    let mut db: Database = serde_json::from_value(doc)?;
    db.settings = settings.and_then(read_settings);
    Ok(db)
}

/// Settings never block a load. A table that is not a map is treated as
/// missing; unreadable rows are dropped and the `app` row falls back to defaults.
fn read_settings(raw: Value) -> Option<Table<Settings>> {
    let Value::Object(rows) = raw else {
        warn!("settings table is not a map, ignoring it");
        return None;
    };

    let mut table = Table::default();
    for (id, row) in rows {
        match serde_json::from_value::<Settings>(row) {
            Ok(settings) => {
                table.put(settings);
            }
            Err(err) => warn!(id = %id, error = %err, "unreadable settings row, using defaults"),
        }
    }
    if !table.contains(SETTINGS_ID) {
        table.put(Settings::default());
    }
    Some(table)
}

async fn set_aside(path: &Path) {
    let mut aside = path.as_os_str().to_owned();
    aside.push(".unreadable");
    match fs::rename(path, &aside).await {
        Ok(()) => warn!(to = ?aside, "kept unreadable data file"),
        Err(err) => warn!("could not move unreadable data file: {err}"),
    }
}

pub async fn persist_database(path: &Path, db: &Database) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(db)?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    fs::write(&staging, payload).await?;
    fs::rename(&staging, path).await?;
    Ok(())
}

/// Applies `change` to a copy of `db`, writes the copy, and only then swaps it
/// in. A failed change or a failed write leaves `db` as it was.
pub async fn commit<T, E, F>(path: &Path, db: &mut Database, change: F) -> Result<T, E>
where
    F: FnOnce(&mut Database) -> Result<T, E>,
    E: From<StoreError>,
{
    let mut next = db.clone();
    let out = change(&mut next)?;
    persist_database(path, &next).await?;
    *db = next;
    Ok(out)
}
