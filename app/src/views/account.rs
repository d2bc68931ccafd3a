use super::{button, form, form_errors, page, text_field};
use crate::context::AssetMap;
use crate::model::{Session, TeamMember};
use crate::services::Subscription;
use reel_core::{CsrfSession, FieldError};
use reel_core::html::escape;

#[must_use]
pub fn register(
    assets: &AssetMap,
    session: &Session,
    name: &str,
    email: &str,
    errors: &[FieldError],
) -> String {
    let fields = format!(
        "{}{}{}",
        form_errors(errors, &["name", "email"]),
        text_field("name", "Name", name, errors),
        text_field("email", "Email", email, errors),
    );
    page(
        assets,
        "Your account",
        Some(session),
        &format!(
            "<h1>Confirm your name and email</h1>{}",
            form("/account/register", session.csrf_token(), &fields, "Continue")
        ),
    )
}

#[must_use]
pub fn billing(assets: &AssetMap, session: &Session, subscription: Option<&Subscription>) -> String {
    let token = session.csrf_token();
    let status = match subscription {
        Some(subscription) if subscription.is_canceled() => format!(
            "<p>Your {} subscription is canceled and runs until {}.</p>{}",
            escape(&subscription.plan_code),
            subscription
                .current_period_ends_at
                .map_or_else(String::new, |date| date.format("%B %-d, %Y").to_string()),
            button("/account/reactivate", token, "Reactivate")
        ),
        Some(subscription) => format!(
            "<p>You are subscribed to {} ({}).</p>{}",
            escape(&subscription.plan_code),
            escape(&subscription.state),
            button("/account/cancel", token, "Cancel subscription")
        ),
        None if session.premium_access => {
            "<p>Your access comes from a team or a gift.</p>".to_owned()
        },
        None => "<p>You have no subscription.</p><a href=\"/subscription/new\">Subscribe</a>".to_owned(),
    };
    let team = if session.is_team_manager() {
        "<a href=\"/account/team-members\">Team members</a>"
    } else {
        ""
    };
    page(
        assets,
        "Billing",
        Some(session),
        &format!("<h1>Billing</h1>{status}{team}"),
    )
}

#[must_use]
pub fn team_members(
    assets: &AssetMap,
    session: &Session,
    members: &[TeamMember],
    price_per_member: &str,
    username: &str,
    errors: &[FieldError],
) -> String {
    let token = session.csrf_token();
    let list: String = members
        .iter()
        .map(|member| {
            format!(
                "<li>{}{}</li>",
                escape(&member.github_username),
                button(
                    &format!("/account/team-members/{}/delete", member.id),
                    token,
                    "Remove"
                )
            )
        })
        .collect();
    let fields = format!(
        "{}{}",
        form_errors(errors, &["github_username"]),
        text_field("github_username", "GitHub username", username, errors)
    );
    page(
        assets,
        "Team members",
        Some(session),
        &format!(
            "<h1>Team members</h1><p>Each member costs {} per billing period.</p>\
             <ul>{list}</ul>{}",
            escape(price_per_member),
            form("/account/team-members", token, &fields, "Add member")
        ),
    )
}
