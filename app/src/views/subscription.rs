use super::{button, form, form_errors, page, text_field};
use crate::context::AssetMap;
use crate::model::{Gift, Plan, Session};
use reel_core::html::escape;
use reel_core::{CsrfSession, FieldError};
use std::fmt::Write;

fn plan_list(plans: &[Plan]) -> String {
    plans
        .iter()
        .map(|plan| {
            format!(
                "<li>{} {} every {} months</li>",
                escape(&plan.name),
                plan.price(),
                plan.interval_months
            )
        })
        .collect()
}

/// The pitch page. Anonymous visitors are sent through login first.
#[must_use]
pub fn subscribe(assets: &AssetMap, session: Option<&Session>, plans: &[Plan]) -> String {
    let call_to_action = match session {
        Some(session) if session.active_subscription => {
            "<p>You are already subscribed.</p><a href=\"/account/billing\">Billing</a>".to_owned()
        },
        Some(_) => "<a href=\"/subscription/new\">Subscribe now</a>".to_owned(),
        None => "<a href=\"/login?continue=%2Fsubscription%2Fnew\">Log in to subscribe</a>".to_owned(),
    };
    page(
        assets,
        "Subscribe",
        session,
        &format!(
            "<h1>Subscribe</h1><ul>{}</ul>{call_to_action}<p><a href=\"/gift\">Give a gift</a></p>",
            plan_list(plans)
        ),
    )
}

/// Values shown in the new-subscription form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFields<'a> {
    pub plan_code: &'a str,
    pub billing_token: &'a str,
    pub coupon_code: &'a str,
}

#[must_use]
pub fn new_subscription(
    assets: &AssetMap,
    session: &Session,
    plans: &[Plan],
    values: &SubscriptionFields<'_>,
    errors: &[FieldError],
) -> String {
    let mut options = String::new();
    for plan in plans {
        let checked = if plan.code == values.plan_code { " checked" } else { "" };
        let _ = write!(
            options,
            "<label><input type=\"radio\" name=\"plan_code\" value=\"{}\"{checked}>{} {}</label>",
            escape(&plan.code),
            escape(&plan.name),
            plan.price()
        );
    }
    let fields = format!(
        "{}{options}{}{}",
        form_errors(errors, &["billing_token", "coupon_code"]),
        text_field("billing_token", "Card token", values.billing_token, errors),
        text_field("coupon_code", "Coupon", values.coupon_code, errors),
    );
    page(
        assets,
        "New subscription",
        Some(session),
        &format!(
            "<h1>Choose a plan</h1>{}",
            form("/subscription/new", session.csrf_token(), &fields, "Subscribe")
        ),
    )
}

#[must_use]
pub fn gifts(assets: &AssetMap, session: Option<&Session>, plans: &[Plan]) -> String {
    let items: String = plans
        .iter()
        .map(|plan| {
            format!(
                "<li><a href=\"/gift/new/{}\">{}</a> {}</li>",
                escape(&plan.code),
                escape(&plan.name),
                plan.price()
            )
        })
        .collect();
    page(assets, "Gifts", session, &format!("<h1>Give a subscription</h1><ul>{items}</ul>"))
}

/// Values shown in the gift form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GiftFields<'a> {
    pub gifter_name: &'a str,
    pub gifter_email: &'a str,
    pub giftee_name: &'a str,
    pub giftee_email: &'a str,
    pub message: &'a str,
    pub deliver_on: &'a str,
    pub billing_token: &'a str,
}

#[must_use]
pub fn new_gift(
    assets: &AssetMap,
    session: &Session,
    plan: &Plan,
    values: &GiftFields<'_>,
    errors: &[FieldError],
) -> String {
    let names = [
        "gifter_name",
        "gifter_email",
        "giftee_name",
        "giftee_email",
        "message",
        "deliver_on",
        "billing_token",
    ];
    let fields = format!(
        "{}{}{}{}{}{}{}{}",
        form_errors(errors, &names),
        text_field("gifter_name", "Your name", values.gifter_name, errors),
        text_field("gifter_email", "Your email", values.gifter_email, errors),
        text_field("giftee_name", "Their name", values.giftee_name, errors),
        text_field("giftee_email", "Their email", values.giftee_email, errors),
        text_field("message", "Message", values.message, errors),
        text_field("deliver_on", "Deliver on (YYYY-MM-DD)", values.deliver_on, errors),
        text_field("billing_token", "Card token", values.billing_token, errors),
    );
    page(
        assets,
        "Give a gift",
        Some(session),
        &format!(
            "<h1>Give {} ({})</h1>{}",
            escape(&plan.name),
            plan.price(),
            form(
                &format!("/gift/new/{}", plan.code),
                session.csrf_token(),
                &fields,
                "Buy gift"
            )
        ),
    )
}

#[must_use]
pub fn gift_thank_you(assets: &AssetMap, session: Option<&Session>, gift: &Gift) -> String {
    page(
        assets,
        "Thank you",
        session,
        &format!(
            "<h1>Thank you, {}!</h1><p>We will email {} on {}.</p>",
            escape(&gift.gifter_name),
            escape(&gift.giftee_name),
            gift.deliver_at.format("%B %-d, %Y")
        ),
    )
}

/// The landing page from the gift email.
#[must_use]
pub fn redeem_gift(assets: &AssetMap, session: &Session, gift: &Gift) -> String {
    page(
        assets,
        "Your gift",
        Some(session),
        &format!(
            "<h1>{} gave you {} months of Reel</h1>{}",
            escape(&gift.gifter_name),
            gift.months,
            button(&format!("/gift/{}/redeem", gift.id), session.csrf_token(), "Start watching")
        ),
    )
}
