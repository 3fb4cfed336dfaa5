pub mod app;
pub mod backup;
pub mod calc;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod migrations;
pub mod models;
pub mod route;
pub mod schema;
pub mod seed;
pub mod settings;
pub mod state;
pub mod stats;
pub mod storage;
pub mod summary;
pub mod timer;
pub mod ui;
pub mod undo;

pub use app::router;
pub use config::Config;
pub use db::Database;
pub use state::AppState;
pub use storage::{load_database, persist_database, resolve_data_path};
