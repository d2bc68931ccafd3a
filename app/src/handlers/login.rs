//! GitHub sign-in and sign-out.

use super::Handler;
use crate::context::Context;
use crate::model::{User, session, team, user};
use crate::route::sanitize_origin;
use crate::services::GitHubProfile;
use reel_core::HandlerError;
use reel_web::cookies;
use std::sync::Arc;
use uuid::Uuid;

/// Send the browser to GitHub. It comes back to the callback with the page
/// to continue to.
pub fn login<I: Handler>(continue_to: Option<String>) -> I {
    I::with_context(move |context| {
        let origin = sanitize_origin(continue_to.as_deref());
        let callback = context.url(&format!(
            "/login/callback?origin={}",
            urlencoding::encode(&origin)
        ));
        I::redirect(&context.github.authorize_url(&callback), http::HeaderMap::new())
    })
}

/// Exchange the OAuth code, store the user and start a session.
pub fn callback<I: Handler>(code: Option<String>, origin: Option<String>) -> I {
    let Some(code) = code.filter(|code| !code.is_empty()) else {
        return I::write_error(HandlerError::bad_request(
            "GitHub did not send a sign-in code.",
            "login callback without code",
        ));
    };
    let origin = sanitize_origin(origin.as_deref());
    I::with_context(move |context: Arc<Context>| {
        let exchange = context.github.access_token(&code);
        I::on_success(exchange, "GitHub access token", move |token: String| {
            I::on_success(context.github.profile(&token), "GitHub profile", move |profile| {
                sign_in(&profile, &token, origin)
            })
        })
    })
}

fn sign_in<I: Handler>(profile: &GitHubProfile, token: &str, origin: String) -> I {
    let name = profile
        .name
        .clone()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| profile.login.clone());
    let email = profile.email.clone().unwrap_or_default();
    let login = profile.login.clone();
    I::query(user::upsert_from_github(profile.id, token, &name, &email), move |user: User| {
        tracing::info!(user_id = %user.id, github_user_id = user.github_user_id, "Signed in");
        if user.team_manager_id.is_some() {
            return start_session(user.id, origin);
        }
        let user_id = user.id;
        I::query(team::link_member(&login, user_id), move |manager| {
            if let Some(manager_id) = manager {
                tracing::info!(%user_id, %manager_id, "Joined team");
            }
            start_session(user_id, origin)
        })
    })
}

fn start_session<I: Handler>(user_id: Uuid, origin: String) -> I {
    I::query(session::create(user_id), move |session_id| {
        I::redirect(&origin, cookies::set_session(&session_id.to_string()))
    })
}

/// End the session, if there is one, and clear the cookie either way.
pub fn logout<I: Handler>() -> I {
    I::with_session(|session| match session {
        Some(session) => I::query(session::delete(session.id), |_| {
            I::redirect("/", cookies::clear_session())
        }),
        None => I::redirect("/", cookies::clear_session()),
    })
}
