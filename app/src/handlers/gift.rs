//! Buying a subscription for someone else.

use super::account::valid_email;
use super::{Handler, Posting, see_other, with_now};
use crate::context::Context;
use crate::model::{NewGift, Plan, Session, gift};
use crate::services::NewSubscription;
use crate::views;
use crate::views::subscription::GiftFields;
use chrono::{DateTime, NaiveDate, Utc};
use http::StatusCode;
use reel_core::{FieldError, FormData, FormDefinition, HandlerError};
use std::sync::Arc;
use uuid::Uuid;

/// The submitted gift form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GiftForm {
    pub gifter_name: String,
    pub gifter_email: String,
    pub giftee_name: String,
    pub giftee_email: String,
    pub message: String,
    pub deliver_on: String,
    pub billing_token: String,
}

/// A validated gift order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftOrder {
    pub gift: NewGift,
    pub billing_token: String,
}

pub fn gifts<I: Handler>() -> I {
    I::with_session(|session| {
        I::with_context(move |context| {
            I::write_html(
                views::subscription::gifts(
                    &context.assets,
                    session.as_ref(),
                    &context.catalog.gift_plans(),
                ),
                StatusCode::OK,
            )
        })
    })
}

fn field(data: &FormData, name: &str) -> Option<String> {
    data.get(name).map(|value| value.trim().to_owned())
}

fn parse(data: &FormData) -> Option<GiftForm> {
    Some(GiftForm {
        gifter_name: field(data, "gifter_name")?,
        gifter_email: field(data, "gifter_email")?,
        giftee_name: field(data, "giftee_name")?,
        giftee_email: field(data, "giftee_email")?,
        message: field(data, "message").unwrap_or_default(),
        deliver_on: field(data, "deliver_on")?,
        billing_token: field(data, "billing_token")?,
    })
}

/// Gifts are delivered at midnight UTC on the chosen day.
fn delivery_date(deliver_on: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(deliver_on, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

fn validate(plan: &Plan, today: NaiveDate, form: &GiftForm) -> Result<GiftOrder, Vec<FieldError>> {
    let mut errors = Vec::new();
    for (name, value) in [("gifter_name", &form.gifter_name), ("giftee_name", &form.giftee_name)] {
        if value.is_empty() {
            errors.push(FieldError::new(name, "Please enter a name."));
        }
    }
    for (name, value) in [("gifter_email", &form.gifter_email), ("giftee_email", &form.giftee_email)]
    {
        if !valid_email(value) {
            errors.push(FieldError::new(name, "Please enter a valid email address."));
        }
    }
    let deliver_at = delivery_date(&form.deliver_on);
    match deliver_at {
        Some(date) if date.date_naive() < today => {
            errors.push(FieldError::new("deliver_on", "The delivery date is in the past."));
        },
        Some(_) => {},
        None => errors.push(FieldError::new("deliver_on", "Please enter a date like 2026-12-24.")),
    }
    if form.billing_token.is_empty() {
        errors.push(FieldError::new("billing_token", "Please enter your card details."));
    }
    match deliver_at {
        Some(deliver_at) if errors.is_empty() => Ok(GiftOrder {
            gift: NewGift {
                gifter_name: form.gifter_name.clone(),
                gifter_email: form.gifter_email.clone(),
                giftee_name: form.giftee_name.clone(),
                giftee_email: form.giftee_email.clone(),
                message: form.message.clone(),
                plan_code: plan.code.clone(),
                months: plan.interval_months,
                deliver_at,
            },
            billing_token: form.billing_token.clone(),
        }),
        _ => Err(errors),
    }
}

fn definition(context: Arc<Context>, session: Session, plan: Plan) -> FormDefinition<GiftForm> {
    FormDefinition::new(parse, move |form: &GiftForm, errors: &[FieldError]| {
        views::subscription::new_gift(
            &context.assets,
            &session,
            &plan,
            &GiftFields {
                gifter_name: &form.gifter_name,
                gifter_email: &form.gifter_email,
                giftee_name: &form.giftee_name,
                giftee_email: &form.giftee_email,
                message: &form.message,
                deliver_on: &form.deliver_on,
                billing_token: &form.billing_token,
            },
            errors,
        )
    })
}

pub fn new_gift<I: Posting>(plan_code: String) -> I {
    I::require_session(move |session| {
        with_now(move |context, now| {
            let Some(plan) = context.catalog.plan(&plan_code).filter(Plan::is_gift) else {
                return I::write_error(HandlerError::not_found(format!("no gift plan {plan_code}")));
            };
            let today = now.date_naive();
            let initial = GiftForm {
                gifter_name: session.user.name.clone(),
                gifter_email: session.user.email.clone(),
                deliver_on: today.format("%Y-%m-%d").to_string(),
                ..GiftForm::default()
            };
            let for_validation = plan.clone();
            I::form(
                definition(context, session, plan),
                initial,
                move |form| validate(&for_validation, today, form),
                purchase::<I::AfterBody>,
            )
        })
    })
}

/// Store the gift, then start its subscription on the delivery date.
fn purchase<A: Handler>(order: GiftOrder) -> A {
    A::query(gift::insert(&order.gift), move |id: Uuid| {
        tracing::info!(gift_id = %id, plan = %order.gift.plan_code, "Gift stored");
        A::with_context(move |context| {
            let subscription = NewSubscription {
                account_code: gift::account_code(id),
                email: order.gift.gifter_email,
                plan_code: order.gift.plan_code,
                billing_token: order.billing_token,
                coupon_code: None,
                starts_at: Some(order.gift.deliver_at),
            };
            A::on_success(
                context.billing.create_subscription(subscription),
                format!("create gift subscription {id}"),
                move |_| see_other(&format!("/gift/{id}/thank-you")),
            )
        })
    })
}

pub fn thank_you<I: Handler>(id: Uuid) -> I {
    I::with_session(move |session| {
        I::query(gift::find(id), move |found| match found {
            Some(gift) => I::with_context(move |context: Arc<Context>| {
                I::write_html(
                    views::subscription::gift_thank_you(&context.assets, session.as_ref(), &gift),
                    StatusCode::OK,
                )
            }),
            None => I::write_error(HandlerError::not_found(format!("no gift {id}"))),
        })
    })
}

/// Where the gift email sends the recipient.
#[must_use]
pub fn redeem_path(id: Uuid) -> String {
    format!("/gift/{id}/redeem")
}

/// Claim a delivered gift for the signed-in user. Visitors sign in first and
/// come back to the same page.
pub fn redeem<I: Posting>(id: Uuid) -> I {
    I::verified_post(move |_| claim(id), move || redeem_page(id))
}

fn redeem_page<A: Handler>(id: Uuid) -> A {
    A::with_session(move |session| {
        let Some(session) = session else {
            let login = format!("/login?continue={}", urlencoding::encode(&redeem_path(id)));
            return see_other(&login);
        };
        A::query(gift::find(id), move |found| match found {
            Some(gift) if gift.activated => A::with_context(move |context: Arc<Context>| {
                A::write_html(
                    views::subscription::redeem_gift(&context.assets, &session, &gift),
                    StatusCode::OK,
                )
            }),
            _ => A::write_error(HandlerError::not_found(format!("no activated gift {id}"))),
        })
    })
}

fn claim<A: Handler>(id: Uuid) -> A {
    A::require_session(move |session| {
        let user_id = session.user.id;
        A::query(gift::redeem(id, user_id), move |claimed| {
            if claimed == 0 {
                return A::write_error(HandlerError::domain(
                    "This gift cannot be redeemed.",
                    format!("gift {id} not redeemable by {user_id}"),
                ));
            }
            tracing::info!(gift_id = %id, %user_id, "Gift redeemed");
            see_other("/episodes")
        })
    })
}
