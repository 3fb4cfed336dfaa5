//! In-memory keyed tables persisted as a single JSON document.
//!
//! Each table is a map from record id to record, iterated in id order. The
//! [`Database`] groups the tables and offers an all-or-nothing
//! [`Database::transaction`] across them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::StoreError;
use crate::migrations::CURRENT_VERSION;
use crate::models::{Activity, Entry, Settings};

pub trait Record: Clone + Serialize + DeserializeOwned {
    const TABLE: &'static str;

    fn id(&self) -> &str;
}

impl Record for Activity {
    const TABLE: &'static str = "activities";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Entry {
    const TABLE: &'static str = "entries";

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Settings {
    const TABLE: &'static str = "settings";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Table<T> {
    rows: BTreeMap<String, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.rows.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.contains_key(id)
    }

    /// Inserts or replaces, returning the replaced record.
    pub fn put(&mut self, record: T) -> Option<T> {
        self.rows.insert(record.id().to_string(), record)
    }

    /// Inserts a record whose id must not exist yet.
    pub fn add(&mut self, record: T) -> Result<(), StoreError> {
        if self.rows.contains_key(record.id()) {
            return Err(StoreError::AlreadyExists {
                table: T::TABLE,
                id: record.id().to_string(),
            });
        }
        self.put(record);
        Ok(())
    }

    /// Applies a partial patch of top-level JSON fields to an existing record.
    /// The id cannot be changed through a patch.
    pub fn update(&mut self, id: &str, patch: &Map<String, Value>) -> Result<T, StoreError> {
        let current = self.rows.get(id).ok_or_else(|| StoreError::NotFound {
            table: T::TABLE,
            id: id.to_string(),
        })?;

        let mut value = serde_json::to_value(current)?;
        if let Value::Object(fields) = &mut value {
            for (key, patched) in patch {
                if key != "id" {
                    fields.insert(key.clone(), patched.clone());
                }
            }
        }
        let updated: T = serde_json::from_value(value)?;
        self.rows.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    pub fn delete(&mut self, id: &str) -> Option<T> {
        self.rows.remove(id)
    }

    /// Inserts every record or none of them.
    pub fn bulk_add(&mut self, records: Vec<T>) -> Result<(), StoreError> {
        let mut incoming = BTreeMap::new();
        for record in records {
            let id = record.id().to_string();
            if self.rows.contains_key(&id) || incoming.contains_key(&id) {
                return Err(StoreError::AlreadyExists { table: T::TABLE, id });
            }
            incoming.insert(id, record);
        }
        self.rows.extend(incoming);
        Ok(())
    }

    pub fn bulk_put(&mut self, records: Vec<T>) {
        for record in records {
            self.put(record);
        }
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Records matching `predicate`, in id order.
    pub fn filter<'a, P>(&'a self, predicate: P) -> impl Iterator<Item = &'a T> + 'a
    where
        P: Fn(&T) -> bool + 'a,
    {
        self.rows.values().filter(move |record| predicate(record))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub version: u32,
    #[serde(default)]
    pub activities: Table<Activity>,
    #[serde(default)]
    pub entries: Table<Entry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Table<Settings>>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            activities: Table::default(),
            entries: Table::default(),
            settings: Some(Table::default()),
        }
    }
}

impl Database {
    pub fn settings_table(&self) -> Result<&Table<Settings>, StoreError> {
        self.settings
            .as_ref()
            .ok_or(StoreError::MissingTable(Settings::TABLE))
    }

    pub fn settings_table_mut(&mut self) -> Result<&mut Table<Settings>, StoreError> {
        self.settings
            .as_mut()
            .ok_or(StoreError::MissingTable(Settings::TABLE))
    }

    pub fn entries_for<'a>(&'a self, activity_id: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.filter(move |e| e.activity_id == activity_id)
    }

    /// Runs `f` against a copy of every table; the copy replaces the live
    /// tables only when `f` succeeds.
    pub fn transaction<T, E>(
        &mut self,
        f: impl FnOnce(&mut Database) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut tx = self.clone();
        let out = f(&mut tx)?;
        *self = tx;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metrics;
    use serde_json::json;

    fn entry(id: &str, activity_id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            activity_id: activity_id.to_string(),
            occurred_at: "2026-01-05".to_string(),
            notes: None,
            metrics: Metrics::new(),
        }
    }

    #[test]
    fn add_refuses_existing_ids_but_put_replaces() {
        let mut table = Table::default();
        table.add(entry("e1", "a")).unwrap();
        assert!(matches!(
            table.add(entry("e1", "b")),
            Err(StoreError::AlreadyExists { table: "entries", .. })
        ));
        let previous = table.put(entry("e1", "b"));
        assert_eq!(previous.map(|e| e.activity_id), Some("a".to_string()));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn update_patches_fields_but_not_the_id() {
        let mut table = Table::default();
        table.add(entry("e1", "a")).unwrap();
        let patch = json!({ "id": "other", "notes": "felt good" });
        let updated = table.update("e1", patch.as_object().unwrap()).unwrap();
        assert_eq!(updated.id, "e1");
        assert_eq!(updated.notes.as_deref(), Some("felt good"));
        assert!(matches!(
            table.update("missing", &Map::new()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn bulk_add_is_all_or_nothing() {
        let mut table = Table::default();
        table.add(entry("e2", "a")).unwrap();
        let result = table.bulk_add(vec![entry("e1", "a"), entry("e2", "a")]);
        assert!(result.is_err());
        assert_eq!(table.count(), 1);
        assert!(!table.contains("e1"));
    }

    #[test]
    fn failed_transaction_leaves_tables_untouched() {
        let mut db = Database::default();
        let result: Result<(), StoreError> = db.transaction(|tx| {
            tx.entries.put(entry("e1", "a"));
            tx.entries.add(entry("e1", "a"))
        });
        assert!(result.is_err());
        assert_eq!(db.entries.count(), 0);

        db.transaction(|tx| {
            tx.entries.put(entry("e1", "a"));
            Ok::<_, StoreError>(())
        })
        .unwrap();
        assert_eq!(db.entries.count(), 1);
    }

    #[test]
    fn missing_settings_table_is_reported() {
        let db = Database {
            settings: None,
            ..Database::default()
        };
        assert!(matches!(db.settings_table(), Err(StoreError::MissingTable("settings"))));
    }

    #[test]
    fn entries_for_filters_by_activity() {
        let mut db = Database::default();
        db.entries.put(entry("e1", "a"));
        db.entries.put(entry("e2", "b"));
        db.entries.put(entry("e3", "a"));
        assert_eq!(db.entries_for("a").count(), 2);
    }
}
