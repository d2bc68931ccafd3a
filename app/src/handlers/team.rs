//! Team seats for subscribers who pay for other people.

use super::{Handler, Posting, require_team_manager, schedule, see_other, with_now};
use crate::context::Context;
use crate::model::task::Task;
use crate::model::{Session, TeamMember, team};
use crate::services::{Subscription, TEAM_MEMBER_ADD_ON};
use crate::views;
use chrono::Duration;
use reel_core::{FieldError, FormData, FormDefinition};
use std::sync::Arc;
use uuid::Uuid;

/// Team changes are batched before the add-on quantity is synced.
const SYNC_DELAY_MINUTES: i64 = 5;

fn dollars(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

fn parse(data: &FormData) -> Option<String> {
    data.get("github_username").map(|name| name.trim().to_owned())
}

fn validate(username: &str) -> Result<String, Vec<FieldError>> {
    if team::valid_username(username) {
        Ok(username.to_owned())
    } else {
        Err(vec![FieldError::new("github_username", "Please enter a GitHub username.")])
    }
}

fn definition(
    context: Arc<Context>,
    session: Session,
    members: Vec<TeamMember>,
    price: String,
) -> FormDefinition<String> {
    FormDefinition::new(parse, move |username: &String, errors: &[FieldError]| {
        views::account::team_members(&context.assets, &session, &members, &price, username, errors)
    })
}

/// List the team and add members. The page needs the per-seat price from
/// the billing provider.
pub fn team_members<I: Posting>() -> I {
    require_team_manager(|session: Session| {
        I::with_context(move |context| {
            let lookup = context.billing.subscription(&session.user.account_code());
            I::on_success(lookup, "team manager subscription", move |subscription: Subscription| {
                let price = context.billing.add_on_price(&subscription.plan_code, TEAM_MEMBER_ADD_ON);
                I::on_success(price, "team member price", move |cents: i64| {
                    I::query(team::members(session.user.id), move |members| {
                        I::form(
                            definition(context, session.clone(), members, dollars(cents)),
                            String::new(),
                            |username: &String| validate(username),
                            move |username| add_member(session, username),
                        )
                    })
                })
            })
        })
    })
}

fn add_member<A: Handler>(session: Session, username: String) -> A {
    let manager_id = session.user.id;
    A::query(team::add(manager_id, &username), move |added| {
        tracing::info!(%manager_id, %username, added, "Team member added");
        sync_later(manager_id)
    })
}

pub fn remove<I: Posting>(member_id: Uuid) -> I {
    I::verified_post(
        move |_| remove_member(member_id),
        || see_other("/account/team-members"),
    )
}

fn remove_member<A: Handler>(member_id: Uuid) -> A {
    require_team_manager(move |session: Session| {
        let manager_id = session.user.id;
        A::query(team::remove(member_id, manager_id), move |removed| {
            tracing::info!(%manager_id, %member_id, removed, "Team member removed");
            sync_later(manager_id)
        })
    })
}

fn sync_later<A: Handler>(user_id: Uuid) -> A {
    with_now(move |_, now| {
        schedule(
            &Task::SyncTeamMembersWithRecurly { user_id },
            now + Duration::minutes(SYNC_DELAY_MINUTES),
            || see_other("/account/team-members"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollars() {
        assert_eq!(dollars(900), "$9.00");
        assert_eq!(dollars(1250), "$12.50");
    }

    #[test]
    fn test_username_validation() {
        assert_eq!(validate("blob"), Ok("blob".to_owned()));
        assert!(validate("not a name").is_err());
    }
}
