//! Third-party collaborators.
//!
//! Each collaborator is a narrow trait whose calls return a
//! [`Promise`] of an optional value: `None` means the call failed and was
//! already logged with full context. Handlers treat it as "something went
//! wrong", never as a crash.
//!
//! Live implementations talk HTTP through [`http::RemoteEndpoint`]; tests
//! substitute fakes.

pub mod github;
pub mod http;
pub mod recurly;
pub mod sendgrid;
pub mod vimeo;

use crate::model::Plan;
use chrono::{DateTime, Utc};
use reel_core::Promise;
use serde::Deserialize;

/// Add-on billed per team member.
pub const TEAM_MEMBER_ADD_ON: &str = "team-member";

/// A subscription as the billing provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub plan_code: String,
    /// `active`, `canceled`, `expired`, `future`...
    pub state: String,
    pub current_period_ends_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Active or canceled-but-running subscriptions still grant access.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.state.as_str(), "active" | "canceled" | "future")
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.state == "canceled"
    }
}

/// A new subscription to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub account_code: String,
    pub email: String,
    pub plan_code: String,
    /// Token from the payment form's card fields.
    pub billing_token: String,
    pub coupon_code: Option<String>,
    /// Deferred start, used for gifts.
    pub starts_at: Option<DateTime<Utc>>,
}

/// A discount code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub name: String,
}

/// The billing provider.
pub trait Billing: Send + Sync {
    /// The account's live subscription.
    fn subscription(&self, account_code: &str) -> Promise<Option<Subscription>>;

    fn create_subscription(&self, subscription: NewSubscription) -> Promise<Option<Subscription>>;

    fn cancel(&self, subscription_id: &str) -> Promise<Option<Subscription>>;

    fn reactivate(&self, subscription_id: &str) -> Promise<Option<Subscription>>;

    fn coupon(&self, code: &str) -> Promise<Option<Coupon>>;

    fn plans(&self) -> Promise<Option<Vec<Plan>>>;

    /// Unit price of an add-on for a plan, in cents.
    fn add_on_price(&self, plan_code: &str, add_on_code: &str) -> Promise<Option<i64>>;

    fn set_add_on_quantity(
        &self,
        subscription_id: &str,
        add_on_code: &str,
        quantity: u32,
    ) -> Promise<Option<()>>;
}

/// An outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Sends email.
pub trait Mailer: Send + Sync {
    fn send(&self, email: Email) -> Promise<Option<()>>;
}

/// A GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitHubProfile {
    pub id: i64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// GitHub OAuth.
pub trait GitHub: Send + Sync {
    /// Where to send the browser to sign in; GitHub returns to `redirect_uri`.
    fn authorize_url(&self, redirect_uri: &str) -> String;

    /// Exchange an OAuth code for an access token.
    fn access_token(&self, code: &str) -> Promise<Option<String>>;

    fn profile(&self, access_token: &str) -> Promise<Option<GitHubProfile>>;
}

/// The video host.
pub trait VideoHost: Send + Sync {
    /// A time-limited download link for a video.
    fn download_url(&self, video_id: &str) -> Promise<Option<String>>;
}
