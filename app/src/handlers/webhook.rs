//! Subscription notifications from the billing provider.

use super::gift::redeem_path;
use super::{Handler, Posting};
use crate::context::Context;
use crate::model::catalog::is_gift_plan;
use crate::model::{Gift, gift, user};
use crate::services::{Email, Subscription};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use reel_core::HandlerError;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// The parts of a notification the site acts on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Notification {
    pub subscription: SubscriptionChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionChange {
    pub state: String,
    pub plan_code: String,
    pub account_code: String,
}

/// Parse a notification body.
///
/// # Errors
///
/// The JSON error for malformed bodies.
pub fn parse(body: &[u8]) -> Result<Notification, serde_json::Error> {
    serde_json::from_slice(body)
}

fn acknowledge<A: Handler>() -> A {
    A::write(Bytes::from_static(b"ok"), StatusCode::OK, HeaderMap::new())
}

pub fn recurly<I: Posting>() -> I {
    I::read_body(|body| match parse(&body) {
        Ok(Notification { subscription }) => {
            tracing::info!(
                account = %subscription.account_code,
                plan = %subscription.plan_code,
                state = %subscription.state,
                "Subscription notification"
            );
            match gift::parse_account_code(&subscription.account_code) {
                Some(gift_id) if is_gift_plan(&subscription.plan_code) => {
                    gift_changed(gift_id, &subscription.state)
                },
                _ => account_changed(&subscription.account_code),
            }
        },
        Err(error) => malformed(&error),
    })
}

fn malformed<A: Handler>(error: &serde_json::Error) -> A {
    A::write_error(HandlerError::bad_request(
        "Malformed notification.",
        format!("webhook body: {error}"),
    ))
}

/// Activate a gift the first time its subscription goes live. Replays of
/// the same notification find it already activated and do nothing.
fn gift_changed<A: Handler>(gift_id: Uuid, state: &str) -> A {
    if state != "active" {
        return acknowledge();
    }
    A::query(gift::find(gift_id), move |found| match found {
        Some(gift) if !gift.activated => A::with_context(move |context: Arc<Context>| {
            A::on_success(
                context.mailer.send(gift_email(&gift, &context.url(&redeem_path(gift_id)))),
                format!("gift email for {gift_id}"),
                move |()| {
                    A::query(gift::activate(gift_id), move |_| {
                        tracing::info!(%gift_id, "Gift activated");
                        acknowledge()
                    })
                },
            )
        }),
        Some(_) => {
            tracing::debug!(%gift_id, "Gift already activated");
            acknowledge()
        },
        None => A::write_error(HandlerError::not_found(format!("no gift {gift_id}"))),
    })
}

/// The email telling the recipient about their gift. `redeem_url` is where
/// they claim it.
#[must_use]
pub fn gift_email(gift: &Gift, redeem_url: &str) -> Email {
    let mut text = format!(
        "Hi {},\n\n{} gave you {} months of Reel. Sign in with GitHub to start watching:\n\n{}\n",
        gift.giftee_name, gift.gifter_name, gift.months, redeem_url
    );
    if !gift.message.is_empty() {
        text.push_str(&format!("\n{}\n", gift.message));
    }
    Email {
        to: gift.giftee_email.clone(),
        subject: format!("{} sent you a gift", gift.gifter_name),
        text,
    }
}

/// Store the billing provider's current view of a user's subscription.
fn account_changed<A: Handler>(account_code: &str) -> A {
    let Ok(user_id) = Uuid::parse_str(account_code) else {
        return A::write_error(HandlerError::bad_request(
            "Unknown account.",
            format!("webhook account code {account_code:?}"),
        ));
    };
    A::query(user::find(user_id), move |found| {
        let Some(user) = found else {
            return A::write_error(HandlerError::not_found(format!("no user {user_id}")));
        };
        A::with_context(move |context: Arc<Context>| {
            A::on_success(
                context.billing.subscription(&user.account_code()),
                format!("subscription for user {user_id}"),
                move |subscription: Subscription| {
                    A::query(
                        user::update_subscription_state(
                            user_id,
                            subscription.is_live(),
                            subscription.is_canceled(),
                        ),
                        |_| acknowledge(),
                    )
                },
            )
        })
    })
}
