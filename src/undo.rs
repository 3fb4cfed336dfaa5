//! Short-lived undo for destructive and just-saved changes.
//!
//! A change is applied immediately; the inverse action is kept under a token
//! until its window lapses. Expired actions are dropped lazily.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::db::{Database, Record};
use crate::errors::StoreError;
use crate::models::{Activity, Entry};
use crate::seed::new_id;

const UNDO_TABLE: &str = "undo";

#[derive(Debug, Clone, PartialEq)]
pub enum UndoAction {
    /// Reinserts a deleted activity under its original id.
    RestoreActivity(Activity),
    /// Reinserts a deleted entry under its original id.
    RestoreEntry(Entry),
    /// Removes an entry that was just created.
    RemoveEntry(String),
}

impl UndoAction {
    pub fn apply(self, db: &mut Database) -> Result<(), StoreError> {
        match self {
            UndoAction::RestoreActivity(activity) => db.activities.add(activity),
            UndoAction::RestoreEntry(entry) => db.entries.add(entry),
            UndoAction::RemoveEntry(id) => db
                .entries
                .delete(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound { table: Entry::TABLE, id }),
        }
    }
}

#[derive(Debug)]
struct Pending {
    action: UndoAction,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct UndoBuffer {
    window: Duration,
    pending: HashMap<String, Pending>,
}

impl UndoBuffer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn register(&mut self, action: UndoAction, now: Instant) -> String {
        self.purge(now);
        let token = new_id();
        self.pending.insert(
            token.clone(),
            Pending {
                action,
                expires_at: now + self.window,
            },
        );
        token
    }

    /// Claims the action behind `token` if its window is still open.
    pub fn take(&mut self, token: &str, now: Instant) -> Option<UndoAction> {
        self.purge(now);
        self.pending.remove(token).map(|p| p.action)
    }

    /// Applies the action behind `token` without claiming it, so a write
    /// that fails afterwards can be retried. Unknown or lapsed tokens are
    /// `NotFound`.
    pub fn restore(&self, token: &str, db: &mut Database, now: Instant) -> Result<(), StoreError> {
        let action = self
            .pending
            .get(token)
            .filter(|p| now < p.expires_at)
            .map(|p| p.action.clone())
            .ok_or_else(|| StoreError::NotFound {
                table: UNDO_TABLE,
                id: token.to_string(),
            })?;
        action.apply(db)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn purge(&mut self, now: Instant) {
        self.pending.retain(|_, p| now < p.expires_at);
    }
}
