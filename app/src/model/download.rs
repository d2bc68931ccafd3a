//! Episode downloads and download credits.
//!
//! Subscribers earn one credit per started month of subscription, adjusted
//! by a manual per-user offset. A first download of an episode spends a
//! credit; downloading it again is free. Admins never run out.

use super::session::Session;
use chrono::{DateTime, Datelike, Utc};
use reel_core::{Query, Value};
use uuid::Uuid;

/// What a download request is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// No premium access.
    NotSubscribed,
    /// Already downloaded; costs nothing.
    ReDownload,
    /// A first download; `credits_left` is the balance before spending one.
    CanDownload { credits_left: u32 },
    /// A first download with no credit to spend.
    NoCredits,
}

/// Credits earned since `subscribed_at`: one per started month.
#[must_use]
pub fn credit_grant(subscribed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(start) = subscribed_at else {
        return 0;
    };
    if start > now {
        return 0;
    }
    let months = (i64::from(now.year()) - i64::from(start.year())) * 12
        + i64::from(now.month())
        - i64::from(start.month());
    let started_months = if now.day() < start.day() { months } else { months + 1 };
    started_months.max(1)
}

/// Credits left: grant plus offset minus downloads, never below zero.
#[must_use]
pub fn credits_left(grant: i64, offset: i64, downloads: usize) -> u32 {
    let used = i64::try_from(downloads).unwrap_or(i64::MAX);
    u32::try_from((grant + offset).saturating_sub(used).max(0)).unwrap_or(u32::MAX)
}

/// Decide a download of `episode_number` given the episodes already
/// downloaded.
#[must_use]
pub fn status(
    session: &Session,
    episode_number: i32,
    downloaded: &[i32],
    now: DateTime<Utc>,
) -> DownloadStatus {
    let again = downloaded.contains(&episode_number);
    let credits = credits_left(
        credit_grant(session.user.subscribed_at, now),
        session.user.download_credit_offset,
        downloaded.len(),
    );

    if session.user.is_admin {
        return if again {
            DownloadStatus::ReDownload
        } else {
            DownloadStatus::CanDownload { credits_left: credits }
        };
    }
    if !session.premium_access {
        return DownloadStatus::NotSubscribed;
    }
    if again {
        DownloadStatus::ReDownload
    } else if credits > 0 {
        DownloadStatus::CanDownload { credits_left: credits }
    } else {
        DownloadStatus::NoCredits
    }
}

/// Episode numbers `user_id` has downloaded.
#[must_use]
pub fn downloaded(user_id: Uuid) -> Query<Vec<i32>> {
    Query::rows(
        "SELECT episode_number FROM downloads WHERE user_id = $1 ORDER BY episode_number",
        vec![Value::from(user_id)],
        |row| row.get("episode_number"),
    )
}

/// Record a first download.
#[must_use]
pub fn record(user_id: Uuid, episode_number: i32) -> Query<u64> {
    Query::command(
        "INSERT INTO downloads (user_id, episode_number) VALUES ($1, $2)",
        vec![Value::from(user_id), Value::from(episode_number)],
    )
}
