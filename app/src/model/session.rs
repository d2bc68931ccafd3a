//! The signed-in user and what they may access.
//!
//! A session is derived from the `sessionid` cookie with one query joining
//! sessions and users, plus up to two dependent queries: the team manager for
//! team members, and the received gift for users without premium access of
//! their own.

use super::gift::{self, Gift};
use super::user::{self, USER_COLUMNS, User};
use chrono::{DateTime, Utc};
use reel_core::{CsrfSession, CsrfToken, ProvidesDatabase, Query, QueryError, Value};
use uuid::Uuid;

/// A signed-in user, immutable for the duration of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub user: User,
    pub team_manager: Option<User>,
    pub gift: Option<Gift>,
    /// Subscriber, member of a subscribed team, or holder of an active gift.
    pub premium_access: bool,
    pub active_subscription: bool,
}

impl Session {
    /// Derive access from the user and their team or gift.
    #[must_use]
    pub fn new(
        id: Uuid,
        user: User,
        team_manager: Option<User>,
        gift: Option<Gift>,
        now: DateTime<Utc>,
    ) -> Self {
        let premium_access = user.subscriber
            || team_manager.as_ref().is_some_and(|manager| manager.subscriber)
            || gift.as_ref().is_some_and(|gift| gift.is_active(now));
        let active_subscription = user.subscriber;
        Self {
            id,
            user,
            team_manager,
            gift,
            premium_access,
            active_subscription,
        }
    }

    /// Whether this user manages a team: they pay for their own subscription
    /// and are not someone else's member.
    #[must_use]
    pub const fn is_team_manager(&self) -> bool {
        self.user.subscriber && self.user.team_manager_id.is_none()
    }
}

impl CsrfSession for Session {
    fn csrf_token(&self) -> &CsrfToken {
        &self.user.csrf_token
    }
}

/// The session row with its user.
#[must_use]
pub fn find(id: Uuid) -> Query<Option<(Uuid, User)>> {
    Query::optional(
        format!(
            "SELECT sessions.id AS session_id, {USER_COLUMNS} FROM sessions \
             JOIN users ON users.id = sessions.user_id WHERE sessions.id = $1"
        ),
        vec![Value::from(id)],
        |row| Ok((row.get("session_id")?, User::from_row(row)?)),
    )
}

/// Start a session for `user_id`, returning its id.
#[must_use]
pub fn create(user_id: Uuid) -> Query<Uuid> {
    Query::one(
        "INSERT INTO sessions (user_id) VALUES ($1) RETURNING id",
        vec![Value::from(user_id)],
        |row| row.get("id"),
    )
}

#[must_use]
pub fn delete(id: Uuid) -> Query<u64> {
    Query::command("DELETE FROM sessions WHERE id = $1", vec![Value::from(id)])
}

/// Load the session for a cookie value.
///
/// Malformed ids and unknown sessions are `None`. Query failures are logged
/// and also treated as signed out.
pub async fn load<D: ProvidesDatabase>(
    database: &D,
    session_id: &str,
    now: DateTime<Utc>,
) -> Option<Session> {
    let id = Uuid::parse_str(session_id).ok()?;
    let (id, user) = logged(database.execute(find(id)).await)??;

    let team_manager = match user.team_manager_id {
        Some(manager_id) => logged(database.execute(user::find(manager_id)).await).flatten(),
        None => None,
    };
    let needs_gift = !user.subscriber && !team_manager.as_ref().is_some_and(|m| m.subscriber);
    let gift = if needs_gift {
        logged(database.execute(gift::received_by(user.id)).await).flatten()
    } else {
        None
    };

    Some(Session::new(id, user, team_manager, gift, now))
}

fn logged<A>(result: Result<A, QueryError>) -> Option<A> {
    result
        .map_err(|error| tracing::warn!(%error, "Session lookup failed"))
        .ok()
}
