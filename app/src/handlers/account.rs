//! Registration, billing overview, cancel and reactivate.

use super::{Handler, Posting, schedule, see_other, with_now};
use crate::context::Context;
use crate::model::task::Task;
use crate::model::user;
use crate::model::Session;
use crate::services::Subscription;
use crate::views;
use chrono::Duration;
use http::StatusCode;
use reel_core::{FieldError, FormData, FormDefinition};
use std::sync::Arc;

/// Submitted registration fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
}

/// A plausible email address: one `@`, something before it, a dot after it.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() > 1
                && domain.split('.').all(|part| !part.is_empty())
                && !email.contains(char::is_whitespace)
        },
        None => false,
    }
}

fn parse_registration(data: &FormData) -> Option<Registration> {
    Some(Registration {
        name: data.get("name")?.trim().to_owned(),
        email: data.get("email")?.trim().to_owned(),
    })
}

fn validate_registration(registration: &Registration) -> Result<Registration, Vec<FieldError>> {
    let mut errors = Vec::new();
    if registration.name.is_empty() {
        errors.push(FieldError::new("name", "Please enter your name."));
    }
    if !valid_email(&registration.email) {
        errors.push(FieldError::new("email", "Please enter a valid email address."));
    }
    if errors.is_empty() { Ok(registration.clone()) } else { Err(errors) }
}

fn registration_form(context: Arc<Context>, session: Session) -> FormDefinition<Registration> {
    FormDefinition::new(parse_registration, move |registration, errors| {
        views::account::register(
            &context.assets,
            &session,
            &registration.name,
            &registration.email,
            errors,
        )
    })
}

/// Confirm name and email. Users without premium access are sent on
/// to the subscription form and reminded later if they stop there.
pub fn register<I: Posting>() -> I {
    I::require_session(|session| {
        I::with_context(move |context| {
            let initial = Registration {
                name: session.user.name.clone(),
                email: session.user.email.clone(),
            };
            I::form(
                registration_form(context, session.clone()),
                initial,
                validate_registration,
                move |registration| save_registration(session, registration),
            )
        })
    })
}

fn save_registration<A: Handler>(session: Session, registration: Registration) -> A {
    let user_id = session.user.id;
    A::query(
        user::update_registration(user_id, &registration.name, &registration.email),
        move |_| {
            if session.premium_access {
                return see_other("/account/billing");
            }
            with_now(move |_, now| {
                schedule(
                    &Task::UnfinishedSubscriptionReminder { user_id },
                    now + Duration::days(1),
                    || see_other("/subscription/new"),
                )
            })
        },
    )
}

pub fn billing<I: Handler>() -> I {
    I::require_session(|session| {
        I::with_context(move |context| {
            let has_account = session.user.subscriber || session.user.canceled;
            let lookup = has_account.then(|| context.billing.subscription(&session.user.account_code()));
            let render = move |subscription: Option<Subscription>| {
                I::write_html(
                    views::account::billing(&context.assets, &session, subscription.as_ref()),
                    StatusCode::OK,
                )
            };
            match lookup {
                Some(lookup) => I::on_complete(lookup, render),
                None => render(None),
            }
        })
    })
}

pub fn cancel<I: Posting>() -> I {
    I::verified_post(|_| change_subscription(false), || see_other("/account/billing"))
}

pub fn reactivate<I: Posting>() -> I {
    I::verified_post(|_| change_subscription(true), || see_other("/account/billing"))
}

fn change_subscription<A: Handler>(reactivate: bool) -> A {
    A::require_session(move |session| {
        A::with_context(move |context| {
            let lookup = context.billing.subscription(&session.user.account_code());
            A::on_success(lookup, "subscription lookup", move |subscription: Subscription| {
                let change = if reactivate {
                    context.billing.reactivate(&subscription.id)
                } else {
                    context.billing.cancel(&subscription.id)
                };
                let description = if reactivate { "reactivate" } else { "cancel" };
                A::on_success(change, description, move |updated: Subscription| {
                    tracing::info!(
                        user_id = %session.user.id,
                        state = %updated.state,
                        "Subscription changed"
                    );
                    A::query(
                        user::update_subscription_state(
                            session.user.id,
                            updated.is_live(),
                            updated.is_canceled(),
                        ),
                        |_| see_other("/account/billing"),
                    )
                })
            })
        })
    })
}
