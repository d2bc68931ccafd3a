//! Users and their queries.

use chrono::{DateTime, Utc};
use reel_core::{CsrfToken, Query, QueryError, Row, Value};
use uuid::Uuid;

/// Columns selected whenever a full user is loaded.
pub const USER_COLUMNS: &str = "users.id, users.github_user_id, users.github_access_token, \
     users.name, users.email, users.is_admin, users.collaborator, users.subscriber, \
     users.canceled, users.csrf_token, users.confirmed_name_and_email, \
     users.team_manager_id, users.subscribed_at, users.download_credit_offset";

/// A site user, created on first GitHub login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub github_user_id: i64,
    pub github_access_token: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    /// Collaborators see unreleased episodes.
    pub collaborator: bool,
    pub subscriber: bool,
    pub canceled: bool,
    pub csrf_token: CsrfToken,
    pub confirmed_name_and_email: bool,
    /// Set when the user belongs to someone else's team.
    pub team_manager_id: Option<Uuid>,
    pub subscribed_at: Option<DateTime<Utc>>,
    /// Manual adjustment to the download credit grant.
    pub download_credit_offset: i64,
}

impl User {
    /// Decode a row selected with [`USER_COLUMNS`].
    ///
    /// # Errors
    ///
    /// A [`QueryError`] for missing or mistyped columns.
    pub fn from_row(row: &Row) -> Result<Self, QueryError> {
        Ok(Self {
            id: row.get("id")?,
            github_user_id: row.get("github_user_id")?,
            github_access_token: row.get("github_access_token")?,
            name: row.get("name")?,
            email: row.get("email")?,
            is_admin: row.get("is_admin")?,
            collaborator: row.get("collaborator")?,
            subscriber: row.get("subscriber")?,
            canceled: row.get("canceled")?,
            csrf_token: CsrfToken::new(row.get::<String>("csrf_token")?),
            confirmed_name_and_email: row.get("confirmed_name_and_email")?,
            team_manager_id: row.get("team_manager_id")?,
            subscribed_at: row.get("subscribed_at")?,
            download_credit_offset: row.get("download_credit_offset")?,
        })
    }

    /// The billing provider's account code for this user.
    #[must_use]
    pub fn account_code(&self) -> String {
        self.id.to_string()
    }

    /// Admins and collaborators see everything, including unreleased episodes.
    #[must_use]
    pub const fn is_insider(&self) -> bool {
        self.is_admin || self.collaborator
    }
}

/// The user with `id`.
#[must_use]
pub fn find(id: Uuid) -> Query<Option<User>> {
    Query::optional(
        format!("SELECT {USER_COLUMNS} FROM users WHERE users.id = $1"),
        vec![Value::from(id)],
        User::from_row,
    )
}

/// Create the user for a GitHub profile, or refresh their access token.
///
/// The CSRF token is generated by the database on insert and kept on
/// conflict.
#[must_use]
pub fn upsert_from_github(
    github_user_id: i64,
    access_token: &str,
    name: &str,
    email: &str,
) -> Query<User> {
    Query::one(
        format!(
            "INSERT INTO users (github_user_id, github_access_token, name, email, csrf_token) \
             VALUES ($1, $2, $3, $4, replace(gen_random_uuid()::text, '-', '')) \
             ON CONFLICT (github_user_id) DO UPDATE \
             SET github_access_token = EXCLUDED.github_access_token \
             RETURNING {USER_COLUMNS}"
        ),
        vec![
            Value::from(github_user_id),
            Value::from(access_token),
            Value::from(name),
            Value::from(email),
        ],
        User::from_row,
    )
}

/// Store a confirmed name and email.
#[must_use]
pub fn update_registration(id: Uuid, name: &str, email: &str) -> Query<u64> {
    Query::command(
        "UPDATE users SET name = $2, email = $3, confirmed_name_and_email = true WHERE id = $1",
        vec![Value::from(id), Value::from(name), Value::from(email)],
    )
}

/// Mark a new subscription. The first subscription date is kept.
#[must_use]
pub fn mark_subscribed(id: Uuid, now: DateTime<Utc>) -> Query<u64> {
    Query::command(
        "UPDATE users SET subscriber = true, canceled = false, \
         subscribed_at = COALESCE(subscribed_at, $2) WHERE id = $1",
        vec![Value::from(id), Value::from(now)],
    )
}

/// Store the billing provider's view of a subscription.
#[must_use]
pub fn update_subscription_state(id: Uuid, subscriber: bool, canceled: bool) -> Query<u64> {
    Query::command(
        "UPDATE users SET subscriber = $2, canceled = $3 WHERE id = $1",
        vec![Value::from(id), Value::from(subscriber), Value::from(canceled)],
    )
}
