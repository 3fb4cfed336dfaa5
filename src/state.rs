use crate::db::Database;
use crate::timer::Timers;
use crate::undo::UndoBuffer;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub data_path: PathBuf,
    pub db: Arc<Mutex<Database>>,
    pub undo: Arc<Mutex<UndoBuffer>>,
    pub timers: Arc<Mutex<Timers>>,
}

impl AppState {
    pub fn new(data_path: PathBuf, db: Database, undo_window: Duration) -> Self {
        Self {
            data_path,
            db: Arc::new(Mutex::new(db)),
            undo: Arc::new(Mutex::new(UndoBuffer::new(undo_window))),
            timers: Arc::new(Mutex::new(Timers::default())),
        }
    }
}
