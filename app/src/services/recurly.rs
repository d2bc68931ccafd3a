//! Recurly billing over its v3 JSON API.

use super::http::RemoteEndpoint;
use super::{Billing, Coupon, NewSubscription, Subscription};
use crate::config::RecurlyConfig;
use crate::model::Plan;
use chrono::{DateTime, Utc};
use reel_core::Promise;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};

const API_ROOT: &str = "https://v3.recurly.com";
const ACCEPT: &str = "application/vnd.recurly.v2021-02-25+json";

/// Live billing client.
#[derive(Debug, Clone)]
pub struct RecurlyBilling {
    endpoint: RemoteEndpoint,
    base_url: String,
    api_key: String,
}

impl RecurlyBilling {
    #[must_use]
    pub fn new(endpoint: RemoteEndpoint, config: &RecurlyConfig) -> Self {
        Self {
            endpoint,
            base_url: format!("{API_ROOT}/sites/subdomain-{}", config.subdomain),
            api_key: config.api_key.clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.endpoint
            .request(method, &format!("{}{path}", self.base_url))
            .basic_auth(&self.api_key, Some(""))
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    fn subscription_call(&self, description: String, request: RequestBuilder) -> Promise<Option<Subscription>> {
        self.endpoint
            .load::<WireSubscription>(description, request)
            .map(|wire| wire.map(Subscription::from))
    }
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PlanRef {
    code: String,
}

#[derive(Debug, Deserialize)]
struct WireSubscription {
    id: String,
    plan: PlanRef,
    state: String,
    current_period_ends_at: Option<DateTime<Utc>>,
}

impl From<WireSubscription> for Subscription {
    fn from(wire: WireSubscription) -> Self {
        Self {
            id: wire.id,
            plan_code: wire.plan.code,
            state: wire.state,
            current_period_ends_at: wire.current_period_ends_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Price {
    currency: String,
    unit_amount: f64,
}

#[derive(Debug, Deserialize)]
struct WirePlan {
    code: String,
    name: String,
    interval_length: u32,
    interval_unit: String,
    currencies: Vec<Price>,
}

#[derive(Debug, Deserialize)]
struct WireAddOn {
    currencies: Vec<Price>,
}

fn usd_cents(prices: &[Price]) -> Option<i64> {
    prices
        .iter()
        .find(|price| price.currency == "USD")
        .map(|price| {
            #[allow(clippy::cast_possible_truncation)]
            let cents = (price.unit_amount * 100.0).round() as i64;
            cents
        })
}

impl WirePlan {
    fn into_plan(self) -> Option<Plan> {
        let interval_months = match self.interval_unit.as_str() {
            "months" => self.interval_length,
            "years" => self.interval_length * 12,
            _ => return None,
        };
        Some(Plan {
            price_cents: usd_cents(&self.currencies)?,
            code: self.code,
            name: self.name,
            interval_months,
        })
    }
}

#[derive(Debug, Serialize)]
struct CreateRequest<'a> {
    plan_code: &'a str,
    currency: &'static str,
    account: AccountRequest<'a>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    coupon_codes: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct AccountRequest<'a> {
    code: &'a str,
    email: &'a str,
    billing_info: BillingInfo<'a>,
}

#[derive(Debug, Serialize)]
struct BillingInfo<'a> {
    token_id: &'a str,
}

#[derive(Debug, Serialize)]
struct AddOnChange<'a> {
    timeframe: &'static str,
    add_ons: [AddOnQuantity<'a>; 1],
}

#[derive(Debug, Serialize)]
struct AddOnQuantity<'a> {
    code: &'a str,
    quantity: u32,
}

impl Billing for RecurlyBilling {
    fn subscription(&self, account_code: &str) -> Promise<Option<Subscription>> {
        let request = self
            .request(
                Method::GET,
                &format!("/accounts/code-{}/subscriptions", urlencoding::encode(account_code)),
            )
            .query(&[("state", "live"), ("limit", "1")]);
        self.endpoint
            .load::<List<WireSubscription>>(format!("subscription for account {account_code}"), request)
            .map(|list| {
                list.and_then(|list| list.data.into_iter().next())
                    .map(Subscription::from)
            })
    }

    fn create_subscription(&self, subscription: NewSubscription) -> Promise<Option<Subscription>> {
        let body = CreateRequest {
            plan_code: &subscription.plan_code,
            currency: "USD",
            account: AccountRequest {
                code: &subscription.account_code,
                email: &subscription.email,
                billing_info: BillingInfo {
                    token_id: &subscription.billing_token,
                },
            },
            coupon_codes: subscription.coupon_code.as_deref().into_iter().collect(),
            starts_at: subscription.starts_at,
        };
        let request = self.request(Method::POST, "/subscriptions").json(&body);
        self.subscription_call(
            format!(
                "create {} subscription for account {}",
                subscription.plan_code, subscription.account_code
            ),
            request,
        )
    }

    fn cancel(&self, subscription_id: &str) -> Promise<Option<Subscription>> {
        let request = self.request(Method::PUT, &format!("/subscriptions/{subscription_id}/cancel"));
        self.subscription_call(format!("cancel subscription {subscription_id}"), request)
    }

    fn reactivate(&self, subscription_id: &str) -> Promise<Option<Subscription>> {
        let request = self.request(
            Method::PUT,
            &format!("/subscriptions/{subscription_id}/reactivate"),
        );
        self.subscription_call(format!("reactivate subscription {subscription_id}"), request)
    }

    fn coupon(&self, code: &str) -> Promise<Option<Coupon>> {
        let request = self.request(
            Method::GET,
            &format!("/coupons/code-{}", urlencoding::encode(code)),
        );
        self.endpoint.load(format!("coupon {code}"), request)
    }

    fn plans(&self) -> Promise<Option<Vec<Plan>>> {
        let request = self
            .request(Method::GET, "/plans")
            .query(&[("state", "active"), ("limit", "200")]);
        self.endpoint
            .load::<List<WirePlan>>("list plans", request)
            .map(|list| {
                list.map(|list| list.data.into_iter().filter_map(WirePlan::into_plan).collect())
            })
    }

    fn add_on_price(&self, plan_code: &str, add_on_code: &str) -> Promise<Option<i64>> {
        let request = self.request(
            Method::GET,
            &format!(
                "/plans/code-{}/add_ons/code-{}",
                urlencoding::encode(plan_code),
                urlencoding::encode(add_on_code)
            ),
        );
        self.endpoint
            .load::<WireAddOn>(format!("{add_on_code} price for plan {plan_code}"), request)
            .map(|add_on| add_on.and_then(|add_on| usd_cents(&add_on.currencies)))
    }

    fn set_add_on_quantity(
        &self,
        subscription_id: &str,
        add_on_code: &str,
        quantity: u32,
    ) -> Promise<Option<()>> {
        let body = AddOnChange {
            timeframe: "now",
            add_ons: [AddOnQuantity {
                code: add_on_code,
                quantity,
            }],
        };
        let request = self
            .request(Method::POST, &format!("/subscriptions/{subscription_id}/change"))
            .json(&body);
        self.endpoint.send(
            format!("set {add_on_code} quantity to {quantity} on subscription {subscription_id}"),
            request,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_conversion() {
        let wire: WirePlan = serde_json::from_str(
            r#"{"code": "yearly", "name": "Yearly", "interval_length": 1, "interval_unit": "years",
                "currencies": [{"currency": "USD", "unit_amount": 168.0}]}"#,
        )
        .unwrap();

        let plan = wire.into_plan().unwrap();

        assert_eq!(plan.interval_months, 12);
        assert_eq!(plan.price_cents, 16_800);
    }

    #[test]
    fn test_plan_without_usd_is_skipped() {
        let wire: WirePlan = serde_json::from_str(
            r#"{"code": "monthly", "name": "Monthly", "interval_length": 1, "interval_unit": "months",
                "currencies": [{"currency": "EUR", "unit_amount": 17.0}]}"#,
        )
        .unwrap();

        assert!(wire.into_plan().is_none());
    }

    #[test]
    fn test_create_request_omits_empty_fields() {
        let body = CreateRequest {
            plan_code: "monthly",
            currency: "USD",
            account: AccountRequest {
                code: "acct",
                email: "blob@example.com",
                billing_info: BillingInfo { token_id: "tok" },
            },
            coupon_codes: Vec::new(),
            starts_at: None,
        };

        let json = serde_json::to_value(&body).unwrap();

        assert!(json.get("coupon_codes").is_none());
        assert!(json.get("starts_at").is_none());
        assert_eq!(json["account"]["billing_info"]["token_id"], "tok");
    }

    #[test]
    fn test_subscription_conversion() {
        let wire: WireSubscription = serde_json::from_str(
            r#"{"id": "sub1", "plan": {"code": "monthly"}, "state": "canceled",
                "current_period_ends_at": null}"#,
        )
        .unwrap();

        let subscription = Subscription::from(wire);

        assert!(subscription.is_canceled());
        assert!(subscription.is_live());
    }
}
