use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/today", get(handlers::get_today))
        .route("/api/history", get(handlers::get_history))
        .route("/api/stats/weekly", get(handlers::get_weekly_stats))
        .route("/api/stats/pace", get(handlers::get_pace_stats))
        .route("/api/stats/streak", get(handlers::get_streak))
        .route(
            "/api/activities",
            get(handlers::list_activities).post(handlers::create_activity),
        )
        .route(
            "/api/activities/:id",
            get(handlers::get_activity)
                .put(handlers::update_activity)
                .delete(handlers::delete_activity),
        )
        .route("/api/activities/:id/archive", post(handlers::archive_activity))
        .route("/api/activities/:id/unarchive", post(handlers::unarchive_activity))
        .route("/api/entries", post(handlers::create_entry))
        .route(
            "/api/entries/:id",
            get(handlers::get_entry)
                .put(handlers::update_entry)
                .delete(handlers::delete_entry),
        )
        .route("/api/undo/:token", post(handlers::undo))
        .route("/api/meditation", post(handlers::log_meditation))
        .route(
            "/api/meditation/timer",
            get(handlers::get_meditation_timer)
                .post(handlers::start_meditation_timer)
                .delete(handlers::dismiss_meditation_timer),
        )
        .route(
            "/api/meditation/timer/complete",
            post(handlers::complete_meditation_timer),
        )
        .route(
            "/api/rest",
            get(handlers::get_rest_timer)
                .post(handlers::start_rest_timer)
                .delete(handlers::reset_rest_timer),
        )
        .route(
            "/api/settings",
            get(handlers::read_settings).put(handlers::write_settings),
        )
        .route(
            "/api/backup",
            get(handlers::export_backup).post(handlers::import_backup),
        )
        .with_state(state)
}
