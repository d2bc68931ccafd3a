//! Background tasks stored in the `tasks` table.
//!
//! Each task has a unique key, so scheduling the same task again moves the
//! pending row instead of adding a second one.

use chrono::{DateTime, Utc};
use reel_core::{Query, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work done outside a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Task {
    /// Bring the billing add-on quantity in line with the team size.
    SyncTeamMembersWithRecurly { user_id: Uuid },
    /// Nudge a registered user who never finished subscribing.
    UnfinishedSubscriptionReminder { user_id: Uuid },
    /// Reload static data once an episode goes public.
    ReleaseEpisode { number: i32 },
}

impl Task {
    /// The unique key of the pending row.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::SyncTeamMembersWithRecurly { user_id } => format!("sync-team-members-{user_id}"),
            Self::UnfinishedSubscriptionReminder { user_id } => {
                format!("unfinished-subscription-reminder-{user_id}")
            },
            Self::ReleaseEpisode { number } => format!("release-episode-{number}"),
        }
    }

    fn payload(&self) -> Value {
        match serde_json::to_string(self) {
            Ok(json) => Value::Json(json),
            Err(error) => {
                tracing::error!(%error, task = ?self, "Task payload failed to serialize");
                Value::Null
            },
        }
    }
}

/// A due row. `task` is `None` when the payload no longer parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTask {
    pub key: String,
    pub date: DateTime<Utc>,
    pub task: Option<Task>,
}

/// Schedule `task` at `date`, replacing a pending row with the same key.
#[must_use]
pub fn schedule(task: &Task, date: DateTime<Utc>) -> Query<u64> {
    Query::command(
        "INSERT INTO tasks (key, date, json) VALUES ($1, $2, $3) \
         ON CONFLICT (key) DO UPDATE SET date = EXCLUDED.date, json = EXCLUDED.json",
        vec![Value::from(task.key()), Value::from(date), task.payload()],
    )
}

/// Drop a pending task by key.
#[must_use]
pub fn unschedule(key: &str) -> Query<u64> {
    Query::command("DELETE FROM tasks WHERE key = $1", vec![Value::from(key)])
}

/// Tasks due at `now`, earliest first.
#[must_use]
pub fn due(now: DateTime<Utc>) -> Query<Vec<StoredTask>> {
    Query::rows(
        "SELECT key, date, json FROM tasks WHERE date <= $1 ORDER BY date",
        vec![Value::from(now)],
        |row| {
            let json: String = row.get("json")?;
            Ok(StoredTask {
                key: row.get("key")?,
                date: row.get("date")?,
                task: parse(&json),
            })
        },
    )
}

/// Remove a finished task. The date guards against deleting a row that was
/// rescheduled while the task ran.
#[must_use]
pub fn complete(stored: &StoredTask) -> Query<u64> {
    Query::command(
        "DELETE FROM tasks WHERE key = $1 AND date = $2",
        vec![Value::from(stored.key.as_str()), Value::from(stored.date)],
    )
}

fn parse(json: &str) -> Option<Task> {
    serde_json::from_str(json)
        .map_err(|error| tracing::warn!(%error, json, "Unreadable task payload"))
        .ok()
}
