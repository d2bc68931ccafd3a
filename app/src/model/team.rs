//! Team members added by a subscriber.

use reel_core::{Query, Value};
use uuid::Uuid;

/// A seat on a manager's team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub id: Uuid,
    pub github_username: String,
    /// Set once the member has signed in.
    pub user_id: Option<Uuid>,
}

/// Members of `manager_id`'s team, oldest first.
#[must_use]
pub fn members(manager_id: Uuid) -> Query<Vec<TeamMember>> {
    Query::rows(
        "SELECT id, github_username, user_id FROM team_members \
         WHERE manager_id = $1 ORDER BY created_at",
        vec![Value::from(manager_id)],
        |row| {
            Ok(TeamMember {
                id: row.get("id")?,
                github_username: row.get("github_username")?,
                user_id: row.get("user_id")?,
            })
        },
    )
}

/// Number of members, used for the billing add-on quantity.
#[must_use]
pub fn count(manager_id: Uuid) -> Query<i64> {
    Query::one(
        "SELECT count(*) AS members FROM team_members WHERE manager_id = $1",
        vec![Value::from(manager_id)],
        |row| row.get("members"),
    )
}

/// Add a member by GitHub username. Adding someone twice is a no-op.
#[must_use]
pub fn add(manager_id: Uuid, github_username: &str) -> Query<u64> {
    Query::command(
        "INSERT INTO team_members (manager_id, github_username) VALUES ($1, $2) \
         ON CONFLICT (manager_id, github_username) DO NOTHING",
        vec![Value::from(manager_id), Value::from(github_username)],
    )
}

/// Remove a member. Only rows owned by `manager_id` match. A member who
/// had signed in loses the manager link along with the seat.
#[must_use]
pub fn remove(member_id: Uuid, manager_id: Uuid) -> Query<i64> {
    Query::one(
        "WITH removed AS ( \
           DELETE FROM team_members WHERE id = $1 AND manager_id = $2 RETURNING user_id \
         ), unlinked AS ( \
           UPDATE users SET team_manager_id = NULL FROM removed \
           WHERE users.id = removed.user_id AND users.team_manager_id = $2 \
           RETURNING users.id \
         ) \
         SELECT count(*) AS removed FROM removed",
        vec![Value::from(member_id), Value::from(manager_id)],
        |row| row.get("removed"),
    )
}

/// Claim the oldest unclaimed seat added under `github_username` for
/// `user_id` and point the user at that seat's manager. Returns the
/// manager, or `None` when no seat is waiting.
#[must_use]
pub fn link_member(github_username: &str, user_id: Uuid) -> Query<Option<Uuid>> {
    Query::optional(
        "WITH claimed AS ( \
           UPDATE team_members SET user_id = $2 \
           WHERE id = ( \
             SELECT id FROM team_members \
             WHERE lower(github_username) = lower($1) AND user_id IS NULL \
               AND manager_id <> $2 \
             ORDER BY created_at LIMIT 1 \
           ) \
           RETURNING manager_id \
         ) \
         UPDATE users SET team_manager_id = claimed.manager_id FROM claimed \
         WHERE users.id = $2 \
         RETURNING users.team_manager_id",
        vec![Value::from(github_username), Value::from(user_id)],
        |row| row.get("team_manager_id"),
    )
}

/// Whether `name` looks like a GitHub username.
#[must_use]
pub fn valid_username(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 39
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
