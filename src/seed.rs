use tracing::info;
use uuid::Uuid;

use crate::db::Database;
use crate::errors::StoreError;
use crate::models::{Activity, ActivityKind, FieldDef, FieldType};

pub const MEDITATION: &str = "Meditation";

pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn activity(
    name: &str,
    icon: &str,
    color: &str,
    kind: ActivityKind,
    fields: Vec<FieldDef>,
) -> Activity {
    Activity {
        id: new_id(),
        name: name.to_string(),
        icon: Some(icon.to_string()),
        color: Some(color.to_string()),
        fields,
        archived: false,
        presets: Vec::new(),
        kind: Some(kind),
    }
}

fn sets_and_reps(style_options: Option<&[&str]>) -> Vec<FieldDef> {
    let mut fields = Vec::new();
    if let Some(options) = style_options {
        fields.push(
            FieldDef::new("style", "Style", FieldType::Enum)
                .with_options(options)
                .required(),
        );
    }
    fields.push(FieldDef::new("sets", "Sets", FieldType::Number).required());
    fields.push(FieldDef::new("reps_list", "Reps per set", FieldType::Text).required());
    fields
}

fn distance_and_time() -> Vec<FieldDef> {
    vec![
        FieldDef::new("distance_km", "Distance (km)", FieldType::Number).required(),
        FieldDef::new("duration", "Time", FieldType::Duration).required(),
    ]
}

fn meditation() -> Activity {
    activity(
        MEDITATION,
        "🪷",
        "#B57EDC",
        ActivityKind::Reps,
        vec![FieldDef::new("duration_min", "Duration (min)", FieldType::Number).required()],
    )
}

pub fn default_activities() -> Vec<Activity> {
    vec![
        activity(
            "Push-ups",
            "💪",
            "#D45113",
            ActivityKind::Reps,
            sets_and_reps(Some(&["inclined", "knee", "full"])),
        ),
        activity(
            "Squats",
            "🦵",
            "#D45113",
            ActivityKind::Reps,
            sets_and_reps(Some(&["assisted", "half", "full"])),
        ),
        activity("Run", "🏃", "#F9A03F", ActivityKind::Run, distance_and_time()),
        activity(
            "Plank",
            "🧘",
            "#F8DDA4",
            ActivityKind::Hold,
            vec![FieldDef::new("duration", "Time", FieldType::Duration).required()],
        ),
        activity("Walk", "🚶", "#E3FACC", ActivityKind::Walk, distance_and_time()),
        activity("Sit-ups", "🌀", "#D45113", ActivityKind::Reps, sets_and_reps(None)),
        meditation(),
    ]
}

/// Fills an empty store with the default activities; otherwise only makes
/// sure the meditation activity exists.
pub fn ensure_seed(db: &mut Database) -> Result<(), StoreError> {
    if db.activities.count() == 0 {
        let defaults = default_activities();
        info!(count = defaults.len(), "seeding default activities");
        return db.activities.bulk_add(defaults);
    }

    if !db.activities.values().any(|a| a.name == MEDITATION) {
        info!("adding missing meditation activity");
        db.activities.add(meditation())?;
    }
    Ok(())
}
