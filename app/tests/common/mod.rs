//! Shared fixtures for the app tests: fake collaborators, a test context and
//! a request helper that runs the real handlers on the test interpreter.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use chrono::{DateTime, Duration, Utc};
use http::Method;
use reel_app::handlers;
use reel_app::model::{CatalogFile, Episode, Plan, Session, User};
use reel_app::route::Route;
use reel_app::services::{
    Billing, Coupon, Email, GitHub, GitHubProfile, Mailer, NewSubscription, Subscription,
    VideoHost,
};
use reel_app::{AssetMap, Catalog, Config, Context};
use reel_core::{CsrfToken, Promise, Reader, Row, Value};
use reel_testing::{ExpectedCalls, TestEnvironment, TestInterpreter, test_clock};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

pub type Env = TestEnvironment<Session, Context>;
pub type Handler = Reader<Env, TestInterpreter>;

pub const CSRF: &str = "0123456789abcdef0123456789abcdef";

/// Billing calls, one expectation list per method.
#[derive(Debug, Clone)]
pub struct FakeBilling {
    pub subscriptions: ExpectedCalls<String, Option<Subscription>>,
    pub created: ExpectedCalls<NewSubscription, Option<Subscription>>,
    pub cancels: ExpectedCalls<String, Option<Subscription>>,
    pub reactivations: ExpectedCalls<String, Option<Subscription>>,
    pub coupons: ExpectedCalls<String, Option<Coupon>>,
    pub plans: ExpectedCalls<(), Option<Vec<Plan>>>,
    pub add_on_prices: ExpectedCalls<(String, String), Option<i64>>,
    pub quantities: ExpectedCalls<(String, String, u32), Option<()>>,
}

impl FakeBilling {
    fn new() -> Self {
        Self {
            subscriptions: ExpectedCalls::new("billing.subscription"),
            created: ExpectedCalls::new("billing.create_subscription"),
            cancels: ExpectedCalls::new("billing.cancel"),
            reactivations: ExpectedCalls::new("billing.reactivate"),
            coupons: ExpectedCalls::new("billing.coupon"),
            plans: ExpectedCalls::new("billing.plans"),
            add_on_prices: ExpectedCalls::new("billing.add_on_price"),
            quantities: ExpectedCalls::new("billing.set_add_on_quantity"),
        }
    }
}

impl Billing for FakeBilling {
    fn subscription(&self, account_code: &str) -> Promise<Option<Subscription>> {
        Promise::ready(self.subscriptions.call(account_code.to_owned()))
    }

    fn create_subscription(&self, subscription: NewSubscription) -> Promise<Option<Subscription>> {
        Promise::ready(self.created.call(subscription))
    }

    fn cancel(&self, subscription_id: &str) -> Promise<Option<Subscription>> {
        Promise::ready(self.cancels.call(subscription_id.to_owned()))
    }

    fn reactivate(&self, subscription_id: &str) -> Promise<Option<Subscription>> {
        Promise::ready(self.reactivations.call(subscription_id.to_owned()))
    }

    fn coupon(&self, code: &str) -> Promise<Option<Coupon>> {
        Promise::ready(self.coupons.call(code.to_owned()))
    }

    fn plans(&self) -> Promise<Option<Vec<Plan>>> {
        Promise::ready(self.plans.call(()))
    }

    fn add_on_price(&self, plan_code: &str, add_on_code: &str) -> Promise<Option<i64>> {
        Promise::ready(self.add_on_prices.call((plan_code.to_owned(), add_on_code.to_owned())))
    }

    fn set_add_on_quantity(
        &self,
        subscription_id: &str,
        add_on_code: &str,
        quantity: u32,
    ) -> Promise<Option<()>> {
        Promise::ready(self.quantities.call((
            subscription_id.to_owned(),
            add_on_code.to_owned(),
            quantity,
        )))
    }
}

#[derive(Debug, Clone)]
pub struct FakeMailer {
    pub sent: ExpectedCalls<Email, Option<()>>,
}

impl Mailer for FakeMailer {
    fn send(&self, email: Email) -> Promise<Option<()>> {
        Promise::ready(self.sent.call(email))
    }
}

#[derive(Debug, Clone)]
pub struct FakeGitHub {
    pub tokens: ExpectedCalls<String, Option<String>>,
    pub profiles: ExpectedCalls<String, Option<GitHubProfile>>,
}

impl GitHub for FakeGitHub {
    fn authorize_url(&self, redirect_uri: &str) -> String {
        format!(
            "https://github.test/login/oauth/authorize?redirect_uri={}",
            urlencoding::encode(redirect_uri)
        )
    }

    fn access_token(&self, code: &str) -> Promise<Option<String>> {
        Promise::ready(self.tokens.call(code.to_owned()))
    }

    fn profile(&self, access_token: &str) -> Promise<Option<GitHubProfile>> {
        Promise::ready(self.profiles.call(access_token.to_owned()))
    }
}

#[derive(Debug, Clone)]
pub struct FakeVideo {
    pub links: ExpectedCalls<String, Option<String>>,
}

impl VideoHost for FakeVideo {
    fn download_url(&self, video_id: &str) -> Promise<Option<String>> {
        Promise::ready(self.links.call(video_id.to_owned()))
    }
}

/// Every fake collaborator, shared with the context under test.
#[derive(Debug, Clone)]
pub struct Fakes {
    pub billing: FakeBilling,
    pub mailer: FakeMailer,
    pub github: FakeGitHub,
    pub video: FakeVideo,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            billing: FakeBilling::new(),
            mailer: FakeMailer {
                sent: ExpectedCalls::new("mailer.send"),
            },
            github: FakeGitHub {
                tokens: ExpectedCalls::new("github.access_token"),
                profiles: ExpectedCalls::new("github.profile"),
            },
            video: FakeVideo {
                links: ExpectedCalls::new("video.download_url"),
            },
        }
    }

    /// Panic if any collaborator still expects a call.
    pub fn assert_exhausted(&self) {
        self.billing.subscriptions.assert_exhausted();
        self.billing.created.assert_exhausted();
        self.billing.cancels.assert_exhausted();
        self.billing.reactivations.assert_exhausted();
        self.billing.coupons.assert_exhausted();
        self.billing.add_on_prices.assert_exhausted();
        self.billing.quantities.assert_exhausted();
        self.mailer.sent.assert_exhausted();
        self.github.tokens.assert_exhausted();
        self.github.profiles.assert_exhausted();
        self.video.links.assert_exhausted();
    }
}

pub fn now() -> DateTime<Utc> {
    use reel_core::Clock;
    test_clock().now()
}

pub fn config() -> Config {
    let vars: HashMap<String, String> = [
        ("BASE_URL", "https://reel.test"),
        ("RECURLY_SUBDOMAIN", "reel"),
        ("RECURLY_API_KEY", "recurly-key"),
        ("SENDGRID_API_KEY", "sendgrid-key"),
        ("GITHUB_CLIENT_ID", "client"),
        ("GITHUB_CLIENT_SECRET", "secret"),
        ("VIMEO_API_KEY", "vimeo-key"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value.to_owned()))
    .collect();
    Config::from_map(&vars).unwrap()
}

pub fn plans() -> Vec<Plan> {
    vec![
        Plan {
            code: "monthly".to_owned(),
            name: "Monthly".to_owned(),
            price_cents: 1800,
            interval_months: 1,
        },
        Plan {
            code: "gift-yearly".to_owned(),
            name: "A year of Reel".to_owned(),
            price_cents: 16800,
            interval_months: 12,
        },
    ]
}

pub fn episode(number: i32, subscriber_only: bool) -> Episode {
    Episode {
        number,
        slug: format!("episode-{number}"),
        title: format!("Episode {number}"),
        blurb: "Blurb".to_owned(),
        subscriber_only,
        publish_at: now() - Duration::days(30),
        video_id: format!("video-{number}"),
    }
}

pub fn context(fakes: &Fakes) -> Context {
    Context {
        config: config(),
        clock: Arc::new(test_clock()),
        billing: Arc::new(fakes.billing.clone()),
        mailer: Arc::new(fakes.mailer.clone()),
        github: Arc::new(fakes.github.clone()),
        video: Arc::new(fakes.video.clone()),
        catalog: Catalog::new(
            CatalogFile {
                episodes: vec![episode(1, false), episode(2, true)],
                collections: Vec::new(),
            },
            plans(),
        ),
        assets: AssetMap::default(),
    }
}

pub fn user() -> User {
    User {
        id: Uuid::from_u128(0x1),
        github_user_id: 1,
        github_access_token: "gh-token".to_owned(),
        name: "Blob".to_owned(),
        email: "blob@example.com".to_owned(),
        is_admin: false,
        collaborator: false,
        subscriber: false,
        canceled: false,
        csrf_token: CsrfToken::new(CSRF),
        confirmed_name_and_email: true,
        team_manager_id: None,
        subscribed_at: None,
        download_credit_offset: 0,
    }
}

pub fn subscriber() -> User {
    User {
        subscriber: true,
        subscribed_at: Some(now() - Duration::days(40)),
        ..user()
    }
}

pub fn session(user: User) -> Session {
    Session::new(Uuid::from_u128(0x5e55), user, None, None, now())
}

pub fn subscription(state: &str) -> Subscription {
    Subscription {
        id: "sub-1".to_owned(),
        plan_code: "monthly".to_owned(),
        state: state.to_owned(),
        current_period_ends_at: Some(now() + Duration::days(20)),
    }
}

/// A row as the database returns it for the user columns.
pub fn user_row(user: &User) -> Row {
    Row::from_pairs([
        ("id", Value::from(user.id)),
        ("github_user_id", Value::from(user.github_user_id)),
        ("github_access_token", Value::from(user.github_access_token.as_str())),
        ("name", Value::from(user.name.as_str())),
        ("email", Value::from(user.email.as_str())),
        ("is_admin", Value::from(user.is_admin)),
        ("collaborator", Value::from(user.collaborator)),
        ("subscriber", Value::from(user.subscriber)),
        ("canceled", Value::from(user.canceled)),
        ("csrf_token", Value::from(user.csrf_token.as_str())),
        ("confirmed_name_and_email", Value::from(user.confirmed_name_and_email)),
        ("team_manager_id", Value::from(user.team_manager_id)),
        ("subscribed_at", Value::from(user.subscribed_at)),
        ("download_credit_offset", Value::from(user.download_credit_offset)),
    ])
}

/// Route `uri` and build the handler against `env`.
pub fn request(env: &Env, method: &Method, uri: &str) -> TestInterpreter {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    };
    let handler: Handler = handlers::handle(Route::parse(method, path, query));
    handler.run(env.clone())
}

pub fn get(env: &Env, uri: &str) -> reel_testing::TestResponse {
    request(env, &Method::GET, uri).get()
}

pub fn post(env: &Env, uri: &str, fields: &[(&str, &str)]) -> reel_testing::TestResponse {
    request(env, &Method::POST, uri).post_form(fields.iter().copied())
}
