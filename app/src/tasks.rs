//! Background work stored in the `tasks` table.
//!
//! The runner is the [`TaskQueue`] the poller drives: each poll loads due
//! rows, runs them in date order and deletes a row only when its task
//! succeeded. Every task opens its own scoped connection.

use crate::context::Context;
use crate::model::task::{self, StoredTask, Task};
use crate::model::{Episode, team, user};
use crate::services::{Billing, Email, TEAM_MEMBER_ADD_ON};
use chrono::{DateTime, Utc};
use reel_core::{Connector, QueryError};
use reel_runtime::{LazyConnection, TaskQueue, scoped};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Why a task did not finish. The row stays and is retried next poll.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Database error: {0}")]
    Query(#[from] QueryError),

    /// A collaborator call came back empty. It has already been logged.
    #[error("Remote call failed: {0}")]
    Remote(&'static str),

    #[error("Unreadable task payload")]
    Unreadable,
}

type TaskResult = Result<(), TaskError>;

/// Runs stored tasks against the database and the collaborators.
#[derive(Debug)]
pub struct TaskRunner<K: Connector> {
    connector: K,
    context: Arc<Context>,
}

impl<K: Connector> TaskRunner<K> {
    #[must_use]
    pub const fn new(connector: K, context: Arc<Context>) -> Self {
        Self { connector, context }
    }

    async fn sync_team_members(&self, user_id: Uuid) -> TaskResult {
        let billing = Arc::clone(&self.context.billing);
        scoped(self.connector.clone(), |connection| {
            sync_team_members(connection, billing, user_id)
        })
        .await
    }

    async fn remind(&self, user_id: Uuid) -> TaskResult {
        let context = Arc::clone(&self.context);
        scoped(self.connector.clone(), |connection| remind(connection, context, user_id)).await
    }

    /// Store a `ReleaseEpisode` task at the publish date of every episode
    /// not yet out. A pending task for the same episode is replaced.
    ///
    /// # Errors
    ///
    /// The first failing schedule query.
    pub async fn schedule_releases(&self, episodes: &[Episode]) -> Result<usize, TaskError> {
        let now = self.context.now();
        let releases: Vec<(i32, DateTime<Utc>)> = episodes
            .iter()
            .filter(|episode| episode.publish_at > now)
            .map(|episode| (episode.number, episode.publish_at))
            .collect();
        if releases.is_empty() {
            return Ok(0);
        }
        scoped(self.connector.clone(), |connection| schedule_releases(connection, releases)).await
    }

    async fn release_episode(&self, number: i32) -> TaskResult {
        tracing::info!(number, "Releasing episode");
        let refreshed = self
            .context
            .catalog
            .refresh(&self.context.config.static_data_path, self.context.billing.as_ref())
            .await;
        self.schedule_releases(&self.context.catalog.content().episodes).await?;
        if refreshed { Ok(()) } else { Err(TaskError::Remote("static data refresh")) }
    }

    async fn run(&self, stored: &StoredTask) -> TaskResult {
        match &stored.task {
            Some(Task::SyncTeamMembersWithRecurly { user_id }) => {
                self.sync_team_members(*user_id).await
            },
            Some(Task::UnfinishedSubscriptionReminder { user_id }) => self.remind(*user_id).await,
            Some(Task::ReleaseEpisode { number }) => self.release_episode(*number).await,
            None => Err(TaskError::Unreadable),
        }
    }
}

/// Set the team-member add-on to the current team size.
async fn sync_team_members<K: Connector>(
    connection: LazyConnection<K>,
    billing: Arc<dyn Billing>,
    user_id: Uuid,
) -> TaskResult {
    let Some(manager) = connection.run(&user::find(user_id)).await? else {
        tracing::info!(%user_id, "Team manager no longer exists");
        return Ok(());
    };
    if !manager.subscriber {
        tracing::debug!(%user_id, "Manager is not subscribed, nothing to sync");
        return Ok(());
    }
    let subscription = billing
        .subscription(&manager.account_code())
        .await
        .ok_or(TaskError::Remote("subscription lookup"))?;
    let price = billing
        .add_on_price(&subscription.plan_code, TEAM_MEMBER_ADD_ON)
        .await
        .ok_or(TaskError::Remote("team member price"))?;
    let members = connection.run(&team::count(user_id)).await?;
    let quantity = u32::try_from(members).unwrap_or(0);
    tracing::info!(
        %user_id,
        quantity,
        total_cents = price * i64::from(quantity),
        "Syncing team members"
    );
    billing
        .set_add_on_quantity(&subscription.id, TEAM_MEMBER_ADD_ON, quantity)
        .await
        .ok_or(TaskError::Remote("add-on quantity update"))
}

async fn schedule_releases<K: Connector>(
    connection: LazyConnection<K>,
    releases: Vec<(i32, DateTime<Utc>)>,
) -> Result<usize, TaskError> {
    for &(number, publish_at) in &releases {
        tracing::debug!(number, %publish_at, "Scheduling episode release");
        connection
            .run(&task::schedule(&Task::ReleaseEpisode { number }, publish_at))
            .await?;
    }
    Ok(releases.len())
}

/// Email users who registered but never subscribed.
async fn remind<K: Connector>(
    connection: LazyConnection<K>,
    context: Arc<Context>,
    user_id: Uuid,
) -> TaskResult {
    let Some(user) = connection.run(&user::find(user_id)).await? else {
        return Ok(());
    };
    if user.subscriber || user.email.is_empty() {
        return Ok(());
    }
    let email = Email {
        to: user.email.clone(),
        subject: "Finish subscribing to Reel".to_owned(),
        text: format!(
            "Hi {},\n\nYou are one step away from every episode. Pick a plan at {}\n",
            user.name,
            context.url("/subscription/new")
        ),
    };
    context
        .mailer
        .send(email)
        .await
        .ok_or(TaskError::Remote("reminder email"))
}

impl<K: Connector> TaskQueue for TaskRunner<K> {
    type Task = StoredTask;
    type Error = QueryError;

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<StoredTask>, QueryError> {
        scoped(self.connector.clone(), |connection| async move {
            connection.run(&task::due(now)).await
        })
        .await
    }

    async fn process(&self, stored: &StoredTask) -> bool {
        match self.run(stored).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(key = %stored.key, %error, "Task failed, keeping it for the next poll");
                false
            },
        }
    }

    async fn remove(&self, stored: &StoredTask) -> Result<(), QueryError> {
        let query = task::complete(stored);
        scoped(self.connector.clone(), |connection| async move {
            connection.run(&query).await.map(|_| ())
        })
        .await
    }
}
