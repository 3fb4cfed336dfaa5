//! Rest and meditation timers as plain state machines. Callers own the timer
//! and feed it the current instant; nothing here sleeps or spawns.

use chrono::NaiveDate;
use serde::Serialize;
use std::time::{Duration, Instant};

use crate::db::Database;
use crate::errors::ValidationError;
use crate::models::{Entry, MetricValue, Metrics};
use crate::seed::{new_id, MEDITATION};
use crate::stats::date_key;

pub const REST_PRESETS: [u64; 3] = [30, 60, 90];
pub const MEDITATION_PRESETS: [u32; 6] = [1, 5, 10, 15, 20, 30];
pub const MAX_MEDITATION_MINUTES: u32 = 180;
const FINISHED_HOLD: Duration = Duration::from_secs(3);

fn remaining_secs(until: Instant, now: Instant) -> u64 {
    let left = until.saturating_duration_since(now);
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RestState {
    Idle,
    Counting { remaining: u64 },
    Finished,
}

#[derive(Debug, Clone, Copy)]
enum RestPhase {
    Idle,
    Counting { until: Instant },
    Finished { at: Instant },
}

#[derive(Debug, Clone)]
pub struct RestTimer {
    phase: RestPhase,
}

impl Default for RestTimer {
    fn default() -> Self {
        Self {
            phase: RestPhase::Idle,
        }
    }
}

impl RestTimer {
    /// Starts (or restarts) a countdown.
    pub fn start(&mut self, seconds: u64, now: Instant) {
        self.phase = RestPhase::Counting {
            until: now + Duration::from_secs(seconds),
        };
    }

    /// Cancels a countdown or dismisses the finished banner.
    pub fn reset(&mut self) {
        self.phase = RestPhase::Idle;
    }

    pub fn tick(&mut self, now: Instant) -> RestState {
        match self.phase {
            RestPhase::Counting { until } if now >= until => {
                self.phase = RestPhase::Finished { at: until };
            }
            RestPhase::Finished { at } if now >= at + FINISHED_HOLD => {
                self.phase = RestPhase::Idle;
            }
            _ => {}
        }
        self.state(now)
    }

    pub fn state(&self, now: Instant) -> RestState {
        match self.phase {
            RestPhase::Idle => RestState::Idle,
            RestPhase::Counting { until } => RestState::Counting {
                remaining: remaining_secs(until, now),
            },
            RestPhase::Finished { .. } => RestState::Finished,
        }
    }
}

/// A completed meditation, ready to be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeditationSession {
    pub total_secs: u64,
}

impl MeditationSession {
    pub fn from_minutes(minutes: u32) -> Self {
        Self {
            total_secs: u64::from(minutes) * 60,
        }
    }

    pub fn minutes(&self) -> u64 {
        (self.total_secs + 30) / 60
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum MeditationState {
    Setup,
    Running { remaining: u64 },
    Complete { minutes: u64 },
}

#[derive(Debug, Clone, Copy)]
enum MeditationPhase {
    Setup,
    Running { total_secs: u64, until: Instant },
    Complete { total_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct MeditationTimer {
    phase: MeditationPhase,
}

impl Default for MeditationTimer {
    fn default() -> Self {
        Self {
            phase: MeditationPhase::Setup,
        }
    }
}

impl MeditationTimer {
    /// Returns false when a session is already running or `minutes` is out of range.
    pub fn start(&mut self, minutes: u32, now: Instant) -> bool {
        if matches!(self.phase, MeditationPhase::Running { .. })
            || minutes == 0
            || minutes > MAX_MEDITATION_MINUTES
        {
            return false;
        }
        let total_secs = u64::from(minutes) * 60;
        self.phase = MeditationPhase::Running {
            total_secs,
            until: now + Duration::from_secs(total_secs),
        };
        true
    }

    pub fn cancel(&mut self) {
        if matches!(self.phase, MeditationPhase::Running { .. }) {
            self.phase = MeditationPhase::Setup;
        }
    }

    /// Yields the session exactly once, on the tick that completes it.
    pub fn tick(&mut self, now: Instant) -> Option<MeditationSession> {
        match self.phase {
            MeditationPhase::Running { total_secs, until } if now >= until => {
                self.phase = MeditationPhase::Complete { total_secs };
                Some(MeditationSession { total_secs })
            }
            _ => None,
        }
    }

    /// Leaves the completion screen.
    pub fn done(&mut self) {
        if matches!(self.phase, MeditationPhase::Complete { .. }) {
            self.phase = MeditationPhase::Setup;
        }
    }

    pub fn state(&self, now: Instant) -> MeditationState {
        match self.phase {
            MeditationPhase::Setup => MeditationState::Setup,
            MeditationPhase::Running { until, .. } => MeditationState::Running {
                remaining: remaining_secs(until, now),
            },
            MeditationPhase::Complete { total_secs } => MeditationState::Complete {
                minutes: MeditationSession { total_secs }.minutes(),
            },
        }
    }
}

/// The timers one local user drives from the shell.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    pub rest: RestTimer,
    pub meditation: MeditationTimer,
}

/// Entry for a finished session, logged against the meditation activity.
pub fn meditation_entry(
    db: &Database,
    session: MeditationSession,
    today: NaiveDate,
) -> Result<Entry, ValidationError> {
    let activity = db
        .activities
        .values()
        .find(|a| a.name == MEDITATION)
        .ok_or_else(|| ValidationError::UnknownActivity(MEDITATION.to_string()))?;

    let mut metrics = Metrics::new();
    metrics.insert(
        "duration_min".to_string(),
        MetricValue::Number(session.minutes() as f64),
    );
    Ok(Entry {
        id: new_id(),
        activity_id: activity.id.clone(),
        occurred_at: date_key(today),
        notes: None,
        metrics,
    })
}
