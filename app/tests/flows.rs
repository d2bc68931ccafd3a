//! End-to-end journeys through the real handlers on the test interpreter.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use chrono::Duration;
use common::{
    CSRF, Env, Fakes, context, get, now, post, request, session, subscriber, subscription, user,
};
use http::{Method, StatusCode};
use proptest::prelude::*;
use reel_app::handlers::webhook::gift_email;
use reel_app::model::task::{self, Task};
use reel_app::model::{Gift, Session, gift, session as sessions, team, user as users};
use reel_app::services::GitHubProfile;
use reel_core::csrf::CSRF_FIELD;
use reel_testing::{Flow, FlowRequest};
use uuid::Uuid;

fn signed_in(fakes: &Fakes, session: Session) -> Env {
    reel_testing::init_tracing();
    Env::new(context(fakes)).with_session(session)
}

fn pending_gift() -> Gift {
    Gift {
        id: Uuid::from_u128(0x61f7),
        gifter_name: "Blob".to_owned(),
        gifter_email: "blob@example.com".to_owned(),
        giftee_name: "Blob Jr".to_owned(),
        giftee_email: "blobjr@example.com".to_owned(),
        message: "Happy birthday!".to_owned(),
        plan_code: "gift-yearly".to_owned(),
        months: 12,
        deliver_at: now() - Duration::hours(1),
        activated: false,
        recipient_user_id: None,
    }
}

fn octo() -> users::User {
    users::User {
        id: Uuid::from_u128(0x0c70),
        github_user_id: 2,
        github_access_token: "octo-token".to_owned(),
        name: "Octo".to_owned(),
        email: "octo@example.com".to_owned(),
        ..user()
    }
}

#[test]
fn test_anonymous_visitor_logs_in_and_reaches_the_subscription_form() {
    reel_testing::init_tracing();
    let fakes = Fakes::new();
    let env = Env::new(context(&fakes));
    let after_login = session(user());

    fakes.github.tokens.expect("oauth-code".to_owned(), Some("gh-token".to_owned()));
    fakes.github.profiles.expect(
        "gh-token".to_owned(),
        Some(GitHubProfile {
            id: 1,
            login: "blob".to_owned(),
            name: Some("Blob".to_owned()),
            email: Some("blob@example.com".to_owned()),
        }),
    );
    env.expect_query(
        &users::upsert_from_github(1, "gh-token", "Blob", "blob@example.com"),
        user(),
    );
    env.expect_query(&team::link_member("blob", user().id), None);
    env.expect_query(&sessions::create(user().id), after_login.id);

    let mut current: Option<Session> = None;
    let flow = Flow::start(
        |step: FlowRequest| {
            let env = env.with_session_option(current.clone());
            let response = match step.body {
                Some(body) => request(&env, &Method::POST, &step.uri).post(body),
                None => request(&env, &Method::GET, &step.uri).get(),
            };
            if response.cookie().is_some_and(|cookie| !cookie.contains("Max-Age=0")) {
                current = Some(after_login.clone());
            }
            response
        },
        "/subscribe",
    );
    flow.current().assert_status(StatusCode::OK);

    let flow = flow.click("/login?continue=%2Fsubscription%2Fnew");
    assert_eq!(
        flow.current().location(),
        Some(format!(
            "https://github.test/login/oauth/authorize?redirect_uri={}",
            urlencoding::encode("https://reel.test/login/callback?origin=%2Fsubscription%2Fnew")
        ))
    );

    let flow = flow.visit("/login/callback?code=oauth-code&origin=%2Fsubscription%2Fnew");
    flow.current().assert_redirect("/subscription/new");
    assert_eq!(
        flow.current().cookie(),
        Some(format!("sessionid={}; HttpOnly; Path=/", after_login.id))
    );

    let flow = flow.follow_redirect();
    flow.current().assert_status(StatusCode::OK);
    flow.current().assert_html_contains("Choose a plan");
    assert_eq!(
        flow.visited(),
        [
            "/subscribe",
            "/login?continue=%2Fsubscription%2Fnew",
            "/login/callback?code=oauth-code&origin=%2Fsubscription%2Fnew",
            "/subscription/new",
        ]
    );
    env.assert_exhausted();
    fakes.assert_exhausted();
}

#[test]
fn test_registration_updates_the_user_and_continues_to_subscribe() {
    let fakes = Fakes::new();
    let unconfirmed = users::User {
        confirmed_name_and_email: false,
        ..user()
    };
    let user_id = unconfirmed.id;
    let env = signed_in(&fakes, session(unconfirmed));

    env.expect_query(
        &users::update_registration(user_id, "Blob Smith", "blob@smith.test"),
        1,
    );
    env.expect_query(
        &task::schedule(
            &Task::UnfinishedSubscriptionReminder { user_id },
            now() + Duration::days(1),
        ),
        1,
    );

    let response = post(
        &env,
        "/account/register",
        &[(CSRF_FIELD, CSRF), ("name", " Blob Smith "), ("email", "blob@smith.test")],
    );

    response.assert_redirect("/subscription/new");
    env.assert_exhausted();
}

#[test]
fn test_invalid_registration_is_rerendered_without_queries() {
    let fakes = Fakes::new();
    let env = signed_in(&fakes, session(user()));

    let response = post(
        &env,
        "/account/register",
        &[(CSRF_FIELD, CSRF), ("name", "Blob"), ("email", "not-an-email")],
    );

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    response.assert_html_contains("Please enter a valid email address.");
    assert_eq!(env.remaining(), 0);
}

#[test]
fn test_gift_webhook_activates_once_and_ignores_replays() {
    let fakes = Fakes::new();
    let env = Env::new(context(&fakes));
    let pending = pending_gift();
    let body = serde_json::json!({
        "subscription": {
            "state": "active",
            "plan_code": "gift-yearly",
            "account_code": gift::account_code(pending.id),
        }
    })
    .to_string();

    env.expect_query(&gift::find(pending.id), Some(pending.clone()));
    let redeem_url = format!("https://reel.test/gift/{}/redeem", pending.id);
    fakes.mailer.sent.expect(gift_email(&pending, &redeem_url), Some(()));
    env.expect_query(&gift::activate(pending.id), 1);

    let first = request(&env, &Method::POST, "/webhooks/recurly").post(body.clone());
    first.assert_status(StatusCode::OK);
    assert_eq!(first.body_text(), "ok");

    let activated = Gift {
        activated: true,
        ..pending.clone()
    };
    env.expect_query(&gift::find(pending.id), Some(activated));

    let replay = request(&env, &Method::POST, "/webhooks/recurly").post(body);
    replay.assert_status(StatusCode::OK);

    assert_eq!(fakes.mailer.sent.received().len(), 1);
    assert_eq!(fakes.mailer.sent.received()[0].to, "blobjr@example.com");
    assert!(fakes.mailer.sent.received()[0].text.contains(&redeem_url));
    env.assert_exhausted();
    fakes.assert_exhausted();
}

#[test]
fn test_malformed_webhook_is_a_bad_request() {
    let fakes = Fakes::new();
    let env = Env::new(context(&fakes));

    let response = request(&env, &Method::POST, "/webhooks/recurly").post("not json");

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[test]
fn test_removing_a_team_member_schedules_one_sync() {
    let fakes = Fakes::new();
    let manager = subscriber();
    let manager_id = manager.id;
    let member_id = Uuid::from_u128(0x7e4);
    let env = signed_in(&fakes, session(manager));
    let sync = Task::SyncTeamMembersWithRecurly { user_id: manager_id };

    env.expect_query(&team::remove(member_id, manager_id), 1);
    env.expect_query(&task::schedule(&sync, now() + Duration::minutes(5)), 1);

    let response = post(
        &env,
        &format!("/account/team-members/{member_id}/delete"),
        &[(CSRF_FIELD, CSRF)],
    );

    response.assert_redirect("/account/team-members");
    env.assert_exhausted();
    assert_eq!(sync.key(), format!("sync-team-members-{manager_id}"));
    assert!(
        task::schedule(&sync, now())
            .statement()
            .contains("ON CONFLICT (key) DO UPDATE")
    );
}

#[tokio::test]
async fn test_added_team_member_gets_access_on_first_login() {
    let fakes = Fakes::new();
    let manager = subscriber();
    let manager_id = manager.id;
    let manager_env = signed_in(&fakes, session(manager.clone()));

    fakes
        .billing
        .subscriptions
        .expect(manager_id.to_string(), Some(subscription("active")));
    fakes
        .billing
        .add_on_prices
        .expect(("monthly".to_owned(), "team-member".to_owned()), Some(900));
    manager_env.expect_query(&team::members(manager_id), vec![]);
    manager_env.expect_query(&team::add(manager_id, "octo"), 1);
    manager_env.expect_query(
        &task::schedule(
            &Task::SyncTeamMembersWithRecurly { user_id: manager_id },
            now() + Duration::minutes(5),
        ),
        1,
    );
    post(
        &manager_env,
        "/account/team-members",
        &[(CSRF_FIELD, CSRF), ("github_username", "octo")],
    )
    .assert_redirect("/account/team-members");
    manager_env.assert_exhausted();

    let env = Env::new(context(&fakes));
    let session_id = Uuid::from_u128(0x5e56);
    fakes.github.tokens.expect("octo-code".to_owned(), Some("octo-token".to_owned()));
    fakes.github.profiles.expect(
        "octo-token".to_owned(),
        Some(GitHubProfile {
            id: 2,
            login: "octo".to_owned(),
            name: Some("Octo".to_owned()),
            email: Some("octo@example.com".to_owned()),
        }),
    );
    env.expect_query(
        &users::upsert_from_github(2, "octo-token", "Octo", "octo@example.com"),
        octo(),
    );
    env.expect_query(&team::link_member("octo", octo().id), Some(manager_id));
    env.expect_query(&sessions::create(octo().id), session_id);

    get(&env, "/login/callback?code=octo-code&origin=%2Fepisodes").assert_redirect("/episodes");

    let linked = users::User {
        team_manager_id: Some(manager_id),
        ..octo()
    };
    env.expect_query(&sessions::find(session_id), Some((session_id, linked)));
    env.expect_query(&users::find(manager_id), Some(manager));

    let loaded = sessions::load(&env, &session_id.to_string(), now()).await.unwrap();

    assert!(loaded.premium_access);
    assert!(!loaded.active_subscription);
    assert!(!loaded.is_team_manager());
    env.assert_exhausted();
    fakes.assert_exhausted();
}

#[test]
fn test_returning_team_member_is_not_relinked() {
    let fakes = Fakes::new();
    let env = Env::new(context(&fakes));
    let member = users::User {
        team_manager_id: Some(subscriber().id),
        ..octo()
    };

    fakes.github.tokens.expect("octo-code".to_owned(), Some("octo-token".to_owned()));
    fakes.github.profiles.expect(
        "octo-token".to_owned(),
        Some(GitHubProfile {
            id: 2,
            login: "octo".to_owned(),
            name: None,
            email: Some("octo@example.com".to_owned()),
        }),
    );
    env.expect_query(
        &users::upsert_from_github(2, "octo-token", "octo", "octo@example.com"),
        member.clone(),
    );
    env.expect_query(&sessions::create(member.id), Uuid::from_u128(0x5e56));

    get(&env, "/login/callback?code=octo-code").assert_redirect("/");
    env.assert_exhausted();
}

#[test]
fn test_team_member_registration_skips_the_subscription_form() {
    let fakes = Fakes::new();
    let manager = subscriber();
    let member = users::User {
        confirmed_name_and_email: false,
        team_manager_id: Some(manager.id),
        ..octo()
    };
    let member_id = member.id;
    let current = Session::new(Uuid::from_u128(0x5e55), member, Some(manager), None, now());
    assert!(current.premium_access && !current.active_subscription);
    let env = signed_in(&fakes, current);

    env.expect_query(
        &users::update_registration(member_id, "Octo", "octo@example.com"),
        1,
    );

    let response = post(
        &env,
        "/account/register",
        &[(CSRF_FIELD, CSRF), ("name", "Octo"), ("email", "octo@example.com")],
    );

    response.assert_redirect("/account/billing");
    env.assert_exhausted();
}

#[tokio::test]
async fn test_gift_recipient_redeems_and_gets_access() {
    let fakes = Fakes::new();
    let gift = Gift {
        activated: true,
        ..pending_gift()
    };
    let redeem = format!("/gift/{}/redeem", gift.id);

    let anonymous = Env::new(context(&fakes));
    get(&anonymous, &redeem).assert_redirect(&format!(
        "/login?continue={}",
        urlencoding::encode(&redeem)
    ));

    let recipient = octo();
    let env = signed_in(&fakes, session(recipient.clone()));
    env.expect_query(&gift::find(gift.id), Some(gift.clone()));
    let page = get(&env, &redeem);
    page.assert_status(StatusCode::OK);
    page.assert_html_contains("Start watching");

    env.expect_query(&gift::redeem(gift.id, recipient.id), 1);
    post(&env, &redeem, &[(CSRF_FIELD, CSRF)]).assert_redirect("/episodes");

    let session_id = Uuid::from_u128(0x5e57);
    let redeemed = Gift {
        recipient_user_id: Some(recipient.id),
        ..gift
    };
    env.expect_query(&sessions::find(session_id), Some((session_id, recipient.clone())));
    env.expect_query(&gift::received_by(recipient.id), Some(redeemed));

    let loaded = sessions::load(&env, &session_id.to_string(), now()).await.unwrap();

    assert!(loaded.premium_access);
    assert!(loaded.gift.is_some());
    env.assert_exhausted();
}

#[test]
fn test_gift_held_by_someone_else_is_not_redeemed() {
    let fakes = Fakes::new();
    let gift_id = pending_gift().id;
    let env = signed_in(&fakes, session(octo()));

    env.expect_query(&gift::redeem(gift_id, octo().id), 0);

    let response = post(&env, &format!("/gift/{gift_id}/redeem"), &[(CSRF_FIELD, CSRF)]);

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_html_contains("This gift cannot be redeemed.");
    env.assert_exhausted();
}

#[test]
fn test_team_pages_are_for_managers_only() {
    let fakes = Fakes::new();
    let env = signed_in(&fakes, session(user()));

    get(&env, "/account/team-members").assert_status(StatusCode::FORBIDDEN);
}

#[test]
fn test_cancel_redirects_to_billing() {
    let fakes = Fakes::new();
    let member = subscriber();
    let user_id = member.id;
    let env = signed_in(&fakes, session(member));

    fakes
        .billing
        .subscriptions
        .expect(user_id.to_string(), Some(subscription("active")));
    fakes
        .billing
        .cancels
        .expect("sub-1".to_owned(), Some(subscription("canceled")));
    env.expect_query(&users::update_subscription_state(user_id, true, true), 1);

    let response = post(&env, "/account/cancel", &[(CSRF_FIELD, CSRF)]);

    response.assert_redirect("/account/billing");
    env.assert_exhausted();
    fakes.assert_exhausted();
}

#[test]
fn test_unknown_coupon_is_a_domain_error() {
    let fakes = Fakes::new();
    let env = signed_in(&fakes, session(user()));

    fakes.billing.coupons.expect("FREE".to_owned(), None);

    let response = post(
        &env,
        "/subscription/new",
        &[
            (CSRF_FIELD, CSRF),
            ("plan_code", "monthly"),
            ("billing_token", "card-token"),
            ("coupon_code", "FREE"),
        ],
    );

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_html_contains("No such coupon.");
    fakes.assert_exhausted();
}

#[test]
fn test_subscribing_marks_the_user_and_schedules_a_sync() {
    let fakes = Fakes::new();
    let member = user();
    let user_id = member.id;
    let env = signed_in(&fakes, session(member));

    fakes.billing.created.expect(
        reel_app::services::NewSubscription {
            account_code: user_id.to_string(),
            email: "blob@example.com".to_owned(),
            plan_code: "monthly".to_owned(),
            billing_token: "card-token".to_owned(),
            coupon_code: None,
            starts_at: None,
        },
        Some(subscription("active")),
    );
    env.expect_query(&users::mark_subscribed(user_id, now()), 1);
    env.expect_query(
        &task::unschedule(&Task::UnfinishedSubscriptionReminder { user_id }.key()),
        1,
    );
    env.expect_query(
        &task::schedule(&Task::SyncTeamMembersWithRecurly { user_id }, now()),
        1,
    );

    let response = post(
        &env,
        "/subscription/new",
        &[(CSRF_FIELD, CSRF), ("plan_code", "monthly"), ("billing_token", "card-token")],
    );

    response.assert_redirect("/account/billing");
    env.assert_exhausted();
    fakes.assert_exhausted();
}

#[test]
fn test_redownload_spends_no_credit() {
    let fakes = Fakes::new();
    let member = subscriber();
    let user_id = member.id;
    let env = signed_in(&fakes, session(member));

    env.expect_query(&reel_app::model::download::downloaded(user_id), vec![]);
    env.expect_query(&reel_app::model::download::record(user_id, 2), 1);
    fakes
        .video
        .links
        .expect("video-2".to_owned(), Some("https://video.test/2".to_owned()));
    get(&env, "/episodes/episode-2/download").assert_redirect("https://video.test/2");

    env.expect_query(&reel_app::model::download::downloaded(user_id), vec![2]);
    fakes
        .video
        .links
        .expect("video-2".to_owned(), Some("https://video.test/2".to_owned()));
    get(&env, "/episodes/episode-2/download").assert_redirect("https://video.test/2");

    env.assert_exhausted();
    fakes.assert_exhausted();
}

#[test]
fn test_downloads_need_premium_access() {
    let fakes = Fakes::new();
    let member = user();
    let user_id = member.id;
    let env = signed_in(&fakes, session(member));

    env.expect_query(&reel_app::model::download::downloaded(user_id), vec![]);

    get(&env, "/episodes/episode-2/download").assert_status(StatusCode::FORBIDDEN);
    assert!(fakes.video.links.received().is_empty());
}

#[test]
fn test_unreleased_and_unknown_episodes_are_not_found() {
    let fakes = Fakes::new();
    let env = Env::new(context(&fakes));

    get(&env, "/episodes/episode-1").assert_status(StatusCode::OK);
    get(&env, "/episodes/nope").assert_status(StatusCode::NOT_FOUND);
    get(&env, "/episodes/..%2Fsecret").assert_status(StatusCode::NOT_FOUND);
}

#[test]
fn test_logout_clears_the_cookie() {
    let fakes = Fakes::new();
    let current = session(user());
    let env = signed_in(&fakes, current.clone());

    env.expect_query(&sessions::delete(current.id), 1);

    let response = get(&env, "/logout");

    response.assert_redirect("/");
    assert!(response.cookie().is_some_and(|cookie| cookie.contains("Max-Age=0")));
    env.assert_exhausted();
}

#[test]
fn test_hashed_assets_are_cached_for_a_year() {
    let fakes = Fakes::new();
    let mut context = context(&fakes);
    context.assets = reel_app::AssetMap::from_files([("app.css".to_owned(), b"body{}".as_slice())]);
    let published = context.assets.url("app.css");
    let env = Env::new(context);

    match get(&env, &published) {
        reel_testing::TestResponse::WriteFile { path, max_age } => {
            assert_eq!(path, "assets/app.css");
            assert_eq!(max_age, Some(31_536_000));
        },
        other => panic!("expected a file, got {other:?}"),
    }
    match get(&env, "/assets/app.css") {
        reel_testing::TestResponse::WriteFile { max_age, .. } => assert_eq!(max_age, None),
        other => panic!("expected a file, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn prop_forged_tokens_never_reach_the_post_branch(token in "[a-z0-9]{0,40}") {
        prop_assume!(token != CSRF);
        let fakes = Fakes::new();
        let env = signed_in(&fakes, session(subscriber()));

        // No query is expected, so reaching on_post would fail the test.
        let register = post(
            &env,
            "/account/register",
            &[(CSRF_FIELD, token.as_str()), ("name", "Mallory"), ("email", "mallory@example.com")],
        );
        prop_assert_eq!(register.status(), StatusCode::OK);

        let remove = post(
            &env,
            &format!("/account/team-members/{}/delete", Uuid::from_u128(9)),
            &[(CSRF_FIELD, token.as_str())],
        );
        prop_assert_eq!(remove.location(), Some("/account/team-members".to_owned()));
        prop_assert_eq!(env.remaining(), 0);
    }
}
