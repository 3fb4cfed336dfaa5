use crate::backup::{backup_filename, export, import_str, BackupDocument, ImportSummary};
use crate::db::Database;
use crate::errors::{AppError, ValidationError};
use crate::metrics::coerce_metrics;
use crate::models::{
    Activity, ActivityDraft, CreatedEntryResponse, DeletedResponse, Entry, EntryDraft, EntryView,
    HistoryResponse, MeditationRequest, Settings, SettingsPatch, StreakResponse, TodayResponse,
};
use crate::schema::{check_required, validate_activity};
use crate::seed::new_id;
use crate::settings::{get_settings, save_settings};
use crate::state::AppState;
use crate::stats::{self, date_key, PaceSeries, WeekWindow, WeeklySeries};
use crate::storage::commit;
use crate::summary::summarize;
use crate::timer::{
    meditation_entry, MeditationSession, MeditationState, RestState, MAX_MEDITATION_MINUTES,
    REST_PRESETS,
};
use crate::ui::render_index;
use crate::undo::UndoAction;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

const RECENT_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    pub weeks: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RestRequest {
    pub seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct ActivityListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let today = stats::today();
    let mut db = state.db.lock().await;
    let settings = get_settings(&mut db);
    let entries = db.entries.to_vec();
    let views = day_views(&db, &settings, today);
    let streak = stats::consecutive_active_days(&entries, today);
    Html(render_index(&settings.format_date(today), streak, &views))
}

pub async fn get_today(State(state): State<AppState>) -> Result<Json<TodayResponse>, AppError> {
    let today = stats::today();
    let mut db = state.db.lock().await;
    let settings = get_settings(&mut db);
    let entries = db.entries.to_vec();

    Ok(Json(TodayResponse {
        date: date_key(today),
        streak: stats::consecutive_active_days(&entries, today),
        entries: day_views(&db, &settings, today),
    }))
}

pub async fn get_history(State(state): State<AppState>) -> Result<Json<HistoryResponse>, AppError> {
    let today = stats::today();
    let mut db = state.db.lock().await;
    let settings = get_settings(&mut db);

    let mut entries = db.entries.to_vec();
    sort_recent_first(&mut entries);
    let activities = db.activities.to_vec();
    let weekly_counts = stats::weekly_counts(&activities, &entries, today, WeekWindow::Four);
    let recent = entries
        .iter()
        .take(RECENT_LIMIT)
        .map(|entry| entry_view(&db, &settings, entry))
        .collect();

    Ok(Json(HistoryResponse {
        recent,
        weekly_counts,
    }))
}

pub async fn get_weekly_stats(
    State(state): State<AppState>,
    Query(query): Query<WeeklyQuery>,
) -> Result<Json<WeeklySeries>, AppError> {
    let window = match query.weeks {
        None => WeekWindow::default(),
        Some(weeks) => WeekWindow::from_weeks(weeks)
            .ok_or_else(|| AppError::bad_request("weeks must be 4 or 8"))?,
    };
    let db = state.db.lock().await;
    let activities = db.activities.to_vec();
    let entries = db.entries.to_vec();
    Ok(Json(stats::weekly_totals(
        &activities,
        &entries,
        stats::today(),
        window,
    )))
}

pub async fn get_pace_stats(State(state): State<AppState>) -> Result<Json<PaceSeries>, AppError> {
    let db = state.db.lock().await;
    let activities = db.activities.to_vec();
    let entries = db.entries.to_vec();
    Ok(Json(stats::run_pace_series(&activities, &entries)))
}

pub async fn get_streak(State(state): State<AppState>) -> Result<Json<StreakResponse>, AppError> {
    let today = stats::today();
    let db = state.db.lock().await;
    let entries = db.entries.to_vec();
    Ok(Json(StreakResponse {
        date: date_key(today),
        days: stats::consecutive_active_days(&entries, today),
    }))
}

pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivityListQuery>,
) -> Result<Json<Vec<Activity>>, AppError> {
    let db = state.db.lock().await;
    let mut activities: Vec<Activity> = db
        .activities
        .values()
        .filter(|a| query.include_archived || !a.archived)
        .cloned()
        .collect();
    activities.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Ok(Json(activities))
}

pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Activity>, AppError> {
    let db = state.db.lock().await;
    let activity = db
        .activities
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("activity not found: {id}")))?;
    Ok(Json(activity))
}

pub async fn create_activity(
    State(state): State<AppState>,
    Json(draft): Json<ActivityDraft>,
) -> Result<(StatusCode, Json<Activity>), AppError> {
    let activity = activity_from_draft(new_id(), draft);
    validate_activity(&activity)?;

    let mut db = state.db.lock().await;
    commit(&state.data_path, &mut db, |next| next.activities.add(activity.clone())).await?;

    info!(id = %activity.id, name = %activity.name, "created activity");
    Ok((StatusCode::CREATED, Json(activity)))
}

pub async fn update_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<ActivityDraft>,
) -> Result<Json<Activity>, AppError> {
    let activity = activity_from_draft(id.clone(), draft);
    validate_activity(&activity)?;

    let mut db = state.db.lock().await;
    if !db.activities.contains(&id) {
        return Err(AppError::not_found(format!("activity not found: {id}")));
    }
    commit(&state.data_path, &mut db, |next| {
        next.activities.put(activity.clone());
        Ok::<_, AppError>(())
    })
    .await?;
    Ok(Json(activity))
}

pub async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse<Activity>>, AppError> {
    let mut db = state.db.lock().await;
    let referenced = db.entries_for(&id).count();
    if referenced > 0 {
        return Err(AppError::conflict(format!(
            "activity has {referenced} entries; archive it instead"
        )));
    }
    let deleted = commit(&state.data_path, &mut db, |next| {
        next.activities
            .delete(&id)
            .ok_or_else(|| AppError::not_found(format!("activity not found: {id}")))
    })
    .await?;

    let mut undo = state.undo.lock().await;
    let undo_token = undo.register(UndoAction::RestoreActivity(deleted.clone()), Instant::now());
    info!(id = %id, "deleted activity");
    Ok(Json(DeletedResponse {
        deleted,
        undo_token,
        undo_window_secs: undo.window().as_secs(),
    }))
}

pub async fn archive_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Activity>, AppError> {
    set_archived(&state, &id, true).await.map(Json)
}

pub async fn unarchive_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Activity>, AppError> {
    set_archived(&state, &id, false).await.map(Json)
}

async fn set_archived(state: &AppState, id: &str, archived: bool) -> Result<Activity, AppError> {
    let mut patch = Map::new();
    patch.insert("archived".to_string(), json!(archived));

    let mut db = state.db.lock().await;
    commit(&state.data_path, &mut db, |next| next.activities.update(id, &patch))
        .await
        .map_err(AppError::from)
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntryView>, AppError> {
    let mut db = state.db.lock().await;
    let settings = get_settings(&mut db);
    let entry = db
        .entries
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::not_found(format!("entry not found: {id}")))?;
    Ok(Json(entry_view(&db, &settings, &entry)))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Json(draft): Json<EntryDraft>,
) -> Result<(StatusCode, Json<CreatedEntryResponse>), AppError> {
    let mut db = state.db.lock().await;
    let entry = entry_from_draft(&db, new_id(), draft)?;
    commit(&state.data_path, &mut db, |next| next.entries.add(entry.clone())).await?;

    let mut undo = state.undo.lock().await;
    let undo_token = undo.register(UndoAction::RemoveEntry(entry.id.clone()), Instant::now());
    info!(id = %entry.id, activity = %entry.activity_id, "saved entry");
    Ok((
        StatusCode::CREATED,
        Json(CreatedEntryResponse {
            entry,
            undo_token,
            undo_window_secs: undo.window().as_secs(),
        }),
    ))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<EntryDraft>,
) -> Result<Json<Entry>, AppError> {
    let mut db = state.db.lock().await;
    if !db.entries.contains(&id) {
        return Err(AppError::not_found(format!("entry not found: {id}")));
    }
    let entry = entry_from_draft(&db, id, draft)?;
    commit(&state.data_path, &mut db, |next| {
        next.entries.put(entry.clone());
        Ok::<_, AppError>(())
    })
    .await?;
    Ok(Json(entry))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse<Entry>>, AppError> {
    let mut db = state.db.lock().await;
    let deleted = commit(&state.data_path, &mut db, |next| {
        next.entries
            .delete(&id)
            .ok_or_else(|| AppError::not_found(format!("entry not found: {id}")))
    })
    .await?;

    let mut undo = state.undo.lock().await;
    let undo_token = undo.register(UndoAction::RestoreEntry(deleted.clone()), Instant::now());
    info!(id = %id, "deleted entry");
    Ok(Json(DeletedResponse {
        deleted,
        undo_token,
        undo_window_secs: undo.window().as_secs(),
    }))
}

pub async fn undo(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, AppError> {
    let mut db = state.db.lock().await;
    let mut undo = state.undo.lock().await;
    let now = Instant::now();
    commit(&state.data_path, &mut db, |next| undo.restore(&token, next, now)).await?;
    undo.take(&token, now);
    info!(token = %token, "undone");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn log_meditation(
    State(state): State<AppState>,
    Json(request): Json<MeditationRequest>,
) -> Result<(StatusCode, Json<Entry>), AppError> {
    if request.minutes == 0 || request.minutes > MAX_MEDITATION_MINUTES {
        return Err(AppError::bad_request(format!(
            "minutes must be between 1 and {MAX_MEDITATION_MINUTES}"
        )));
    }

    let mut db = state.db.lock().await;
    let session = MeditationSession::from_minutes(request.minutes);
    let entry = meditation_entry(&db, session, stats::today())?;
    commit(&state.data_path, &mut db, |next| next.entries.add(entry.clone())).await?;

    info!(minutes = request.minutes, "logged meditation");
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_rest_timer(State(state): State<AppState>) -> Json<RestState> {
    let mut timers = state.timers.lock().await;
    Json(timers.rest.tick(Instant::now()))
}

pub async fn start_rest_timer(
    State(state): State<AppState>,
    Json(request): Json<RestRequest>,
) -> Result<Json<RestState>, AppError> {
    if !REST_PRESETS.contains(&request.seconds) {
        return Err(AppError::bad_request(format!(
            "rest must be one of {REST_PRESETS:?} seconds"
        )));
    }
    let now = Instant::now();
    let mut timers = state.timers.lock().await;
    timers.rest.start(request.seconds, now);
    Ok(Json(timers.rest.state(now)))
}

pub async fn reset_rest_timer(State(state): State<AppState>) -> Json<RestState> {
    let mut timers = state.timers.lock().await;
    timers.rest.reset();
    Json(timers.rest.state(Instant::now()))
}

pub async fn get_meditation_timer(State(state): State<AppState>) -> Json<MeditationState> {
    let timers = state.timers.lock().await;
    Json(timers.meditation.state(Instant::now()))
}

pub async fn start_meditation_timer(
    State(state): State<AppState>,
    Json(request): Json<MeditationRequest>,
) -> Result<Json<MeditationState>, AppError> {
    if request.minutes == 0 || request.minutes > MAX_MEDITATION_MINUTES {
        return Err(AppError::bad_request(format!(
            "minutes must be between 1 and {MAX_MEDITATION_MINUTES}"
        )));
    }
    let now = Instant::now();
    let mut timers = state.timers.lock().await;
    if !timers.meditation.start(request.minutes, now) {
        return Err(AppError::conflict("a meditation session is already running"));
    }
    Ok(Json(timers.meditation.state(now)))
}

/// Logs the running session once its time is up.
pub async fn complete_meditation_timer(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Entry>), AppError> {
    let mut db = state.db.lock().await;
    let mut timers = state.timers.lock().await;
    let mut timer = timers.meditation.clone();
    let session = timer
        .tick(Instant::now())
        .ok_or_else(|| AppError::conflict("no finished meditation session"))?;

    let entry = meditation_entry(&db, session, stats::today())?;
    commit(&state.data_path, &mut db, |next| next.entries.add(entry.clone())).await?;
    timers.meditation = timer;

    info!(minutes = session.minutes(), "logged meditation session");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Cancels a running session or leaves the completion screen.
pub async fn dismiss_meditation_timer(State(state): State<AppState>) -> Json<MeditationState> {
    let mut timers = state.timers.lock().await;
    timers.meditation.cancel();
    timers.meditation.done();
    Json(timers.meditation.state(Instant::now()))
}

pub async fn read_settings(State(state): State<AppState>) -> Result<Json<Settings>, AppError> {
    let mut db = state.db.lock().await;
    Ok(Json(get_settings(&mut db)))
}

pub async fn write_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<Settings>, AppError> {
    let mut db = state.db.lock().await;
    let saved = commit(&state.data_path, &mut db, |next| {
        Ok::<_, AppError>(save_settings(next, &patch))
    })
    .await?;
    Ok(Json(saved))
}

pub async fn export_backup(State(state): State<AppState>) -> impl IntoResponse {
    let db = state.db.lock().await;
    let document: BackupDocument = export(&db, Utc::now());
    let disposition = format!(
        "attachment; filename=\"{}\"",
        backup_filename(stats::today())
    );
    ([(header::CONTENT_DISPOSITION, disposition)], Json(document))
}

pub async fn import_backup(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportSummary>, AppError> {
    let mut db = state.db.lock().await;
    let summary = commit(&state.data_path, &mut db, |next| import_str(next, &body)).await?;
    Ok(Json(summary))
}

fn activity_from_draft(id: String, draft: ActivityDraft) -> Activity {
    Activity {
        id,
        name: draft.name.trim().to_string(),
        icon: draft.icon.filter(|icon| !icon.trim().is_empty()),
        color: draft.color.filter(|color| !color.trim().is_empty()),
        fields: draft.fields,
        archived: draft.archived,
        presets: draft.presets,
        kind: draft.kind,
    }
}

/// Builds a stored entry: preset values first, explicit draft values on top,
/// then coercion against the activity's fields and the required check.
fn entry_from_draft(db: &Database, id: String, draft: EntryDraft) -> Result<Entry, AppError> {
    let activity = db
        .activities
        .get(&draft.activity_id)
        .ok_or_else(|| ValidationError::UnknownActivity(draft.activity_id.clone()))?;

    let mut inputs = BTreeMap::new();
    if let Some(preset_id) = draft.preset_id.as_deref() {
        let preset = activity
            .preset(preset_id)
            .ok_or_else(|| AppError::bad_request(format!("unknown preset: {preset_id}")))?;
        preset.apply(&mut inputs);
    }
    inputs.extend(draft.metrics);

    let metrics = coerce_metrics(activity, &inputs)?;
    check_required(activity, &metrics)?;

    let occurred_at = match draft.occurred_at {
        Some(raw) => {
            let day = raw.trim();
            NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|_| AppError::bad_request("occurredAt must be a YYYY-MM-DD date"))?;
            day.to_string()
        }
        None => date_key(stats::today()),
    };

    Ok(Entry {
        id,
        activity_id: activity.id.clone(),
        occurred_at,
        notes: draft
            .notes
            .map(|notes| notes.trim().to_string())
            .filter(|notes| !notes.is_empty()),
        metrics,
    })
}

fn entry_view(db: &Database, settings: &Settings, entry: &Entry) -> EntryView {
    let activity = db.activities.get(&entry.activity_id);
    EntryView {
        title: activity
            .map(Activity::title)
            .unwrap_or_else(|| "Unknown activity".to_string()),
        summary: summarize(entry, activity),
        display_date: entry
            .occurred_on()
            .map(|day| settings.format_date(day))
            .unwrap_or_else(|| entry.occurred_at.clone()),
        entry: entry.clone(),
    }
}

fn day_views(db: &Database, settings: &Settings, day: NaiveDate) -> Vec<EntryView> {
    db.entries
        .values()
        .filter(|entry| entry.occurred_on() == Some(day))
        .map(|entry| entry_view(db, settings, entry))
        .collect()
}

fn sort_recent_first(entries: &mut [Entry]) {
    entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then_with(|| a.id.cmp(&b.id)));
}
