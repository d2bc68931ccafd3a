//! The subscribe page and the new-subscription form.

use super::{Handler, Posting, schedule, see_other, with_now};
use crate::context::Context;
use crate::model::task::{self, Task};
use crate::model::{Plan, Session, user};
use crate::services::{NewSubscription, Subscription};
use crate::views;
use crate::views::subscription::SubscriptionFields;
use http::StatusCode;
use reel_core::{FieldError, FormData, FormDefinition, HandlerError};
use std::sync::Arc;

/// The submitted subscription form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionForm {
    pub plan_code: String,
    pub billing_token: String,
    pub coupon_code: String,
}

/// A validated order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub plan_code: String,
    pub billing_token: String,
    pub coupon_code: Option<String>,
}

pub fn subscribe<I: Handler>() -> I {
    I::with_session(|session| {
        I::with_context(move |context| {
            I::write_html(
                views::subscription::subscribe(
                    &context.assets,
                    session.as_ref(),
                    &context.catalog.regular_plans(),
                ),
                StatusCode::OK,
            )
        })
    })
}

fn parse(data: &FormData) -> Option<SubscriptionForm> {
    Some(SubscriptionForm {
        plan_code: data.get("plan_code").cloned().unwrap_or_default(),
        billing_token: data.get("billing_token")?.trim().to_owned(),
        coupon_code: data.get("coupon_code").map(|code| code.trim().to_owned()).unwrap_or_default(),
    })
}

fn validate(plans: &[Plan], form: &SubscriptionForm) -> Result<Order, Vec<FieldError>> {
    let mut errors = Vec::new();
    if !plans.iter().any(|plan| plan.code == form.plan_code) {
        errors.push(FieldError::new("plan_code", "Please choose a plan."));
    }
    if form.billing_token.is_empty() {
        errors.push(FieldError::new("billing_token", "Please enter your card details."));
    }
    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(Order {
        plan_code: form.plan_code.clone(),
        billing_token: form.billing_token.clone(),
        coupon_code: (!form.coupon_code.is_empty()).then(|| form.coupon_code.clone()),
    })
}

fn definition(
    context: Arc<Context>,
    session: Session,
    plans: Vec<Plan>,
) -> FormDefinition<SubscriptionForm> {
    FormDefinition::new(parse, move |form: &SubscriptionForm, errors: &[FieldError]| {
        views::subscription::new_subscription(
            &context.assets,
            &session,
            &plans,
            &SubscriptionFields {
                plan_code: &form.plan_code,
                billing_token: &form.billing_token,
                coupon_code: &form.coupon_code,
            },
            errors,
        )
    })
}

/// Users confirm their name and email before paying.
pub fn new_subscription<I: Posting>() -> I {
    I::require_session(|session| {
        if session.active_subscription {
            return see_other("/account/billing");
        }
        if !session.user.confirmed_name_and_email {
            return see_other("/account/register");
        }
        I::with_context(move |context| {
            let plans = context.catalog.regular_plans();
            let initial = SubscriptionForm {
                plan_code: plans.first().map(|plan| plan.code.clone()).unwrap_or_default(),
                ..SubscriptionForm::default()
            };
            let for_validation = plans.clone();
            I::form(
                definition(context, session.clone(), plans),
                initial,
                move |form| validate(&for_validation, form),
                move |order| place_order(session, order),
            )
        })
    })
}

fn place_order<A: Handler>(session: Session, order: Order) -> A {
    with_now(move |context, now| match order.coupon_code.clone() {
        Some(code) => A::on_complete(context.billing.coupon(&code), move |coupon| match coupon {
            Some(coupon) => create(&context, session, order, Some(coupon.code), now),
            None => A::write_error(HandlerError::domain(
                "No such coupon.",
                format!("coupon {code:?} not found"),
            )),
        }),
        None => create(&context, session, order, None, now),
    })
}

fn create<A: Handler>(
    context: &Context,
    session: Session,
    order: Order,
    coupon_code: Option<String>,
    now: chrono::DateTime<chrono::Utc>,
) -> A {
    let user_id = session.user.id;
    let subscription = NewSubscription {
        account_code: session.user.account_code(),
        email: session.user.email.clone(),
        plan_code: order.plan_code,
        billing_token: order.billing_token,
        coupon_code,
        starts_at: None,
    };
    A::on_success(
        context.billing.create_subscription(subscription),
        format!("create subscription for user {user_id}"),
        move |created: Subscription| {
            tracing::info!(%user_id, plan = %created.plan_code, "Subscription created");
            A::query(user::mark_subscribed(user_id, now), move |_| {
                let reminder = Task::UnfinishedSubscriptionReminder { user_id };
                A::query(task::unschedule(&reminder.key()), move |_| {
                    schedule(
                        &Task::SyncTeamMembersWithRecurly { user_id },
                        now,
                        || see_other("/account/billing"),
                    )
                })
            })
        },
    )
}
