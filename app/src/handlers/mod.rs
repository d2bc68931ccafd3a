//! Route-family handlers.
//!
//! Every handler is generic over the interpreter. It states the capabilities
//! it needs as trait bounds and returns a description; nothing runs until the
//! server (or a test) supplies a request environment.
//!
//! ```text
//! Route ──► handle::<I>() ──► Reader<Env, Live>         (server)
//!                         └─► Reader<Env, TestInterpreter> (tests)
//! ```

pub mod account;
pub mod assets;
pub mod episodes;
pub mod gift;
pub mod login;
pub mod subscription;
pub mod team;
pub mod webhook;

use crate::context::Context;
use crate::model::task::{self, Task};
use crate::model::Session;
use crate::route::Route;
use chrono::{DateTime, Utc};
use reel_core::{Forms, HandlerError, HasContext, HasDatabase, HasSession, ReadBody, Respond};
use std::sync::Arc;

/// What most handlers need: the session, the database and the context.
pub trait Handler:
    HasSession<Session = Session> + HasDatabase + HasContext<Context = Context>
{
}

impl<I> Handler for I where
    I: HasSession<Session = Session> + HasDatabase + HasContext<Context = Context>
{
}

/// Handlers that may read a form body and keep every capability afterwards.
pub trait Posting: Handler + Forms + ReadBody<AfterBody: Handler> {}

impl<I> Posting for I
where
    I: Handler + Forms + ReadBody,
    I::AfterBody: Handler,
{
}

/// The description for `route`.
pub fn handle<I: Posting>(route: Route) -> I {
    match route {
        Route::Home => episodes::home(),
        Route::Episodes => episodes::index(),
        Route::Episode { slug } => episodes::show(slug),
        Route::Download { slug } => episodes::download(slug),
        Route::Subscribe => subscription::subscribe(),
        Route::NewSubscription => subscription::new_subscription(),
        Route::Register => account::register(),
        Route::Billing => account::billing(),
        Route::Cancel => account::cancel(),
        Route::Reactivate => account::reactivate(),
        Route::TeamMembers => team::team_members(),
        Route::RemoveTeamMember { id } => team::remove(id),
        Route::Gifts => gift::gifts(),
        Route::NewGift { plan } => gift::new_gift(plan),
        Route::GiftThankYou { id } => gift::thank_you(id),
        Route::RedeemGift { id } => gift::redeem(id),
        Route::Login { continue_to } => login::login(continue_to),
        Route::LoginCallback { code, origin } => login::callback(code, origin),
        Route::Logout => login::logout(),
        Route::RecurlyWebhook => webhook::recurly(),
        Route::Asset { name } => assets::asset(name),
        Route::Static { path } => assets::file(path),
        Route::NotFound => I::write_error(HandlerError::not_found("no route")),
    }
}

/// Continue with the context and the current time.
fn with_now<I, F>(then: F) -> I
where
    I: HasContext<Context = Context>,
    F: FnOnce(Arc<Context>, DateTime<Utc>) -> I + Send + 'static,
{
    I::with_context(move |context| {
        let now = context.now();
        then(context, now)
    })
}

/// Store `task` to run at `date`, then continue.
fn schedule<I, F>(task: &Task, date: DateTime<Utc>, then: F) -> I
where
    I: HasDatabase,
    F: FnOnce() -> I + Send + 'static,
{
    tracing::debug!(key = %task.key(), %date, "Scheduling task");
    I::query(task::schedule(task, date), move |_| then())
}

/// Continue only for signed-in team managers.
fn require_team_manager<I, F>(then: F) -> I
where
    I: HasSession<Session = Session>,
    F: FnOnce(Session) -> I + Send + 'static,
{
    I::require_session(move |session| {
        if session.is_team_manager() {
            then(session)
        } else {
            I::write_error(HandlerError::forbidden(format!(
                "user {} is not a team manager",
                session.user.id
            )))
        }
    })
}

/// Redirect after a successful state change.
fn see_other<I: Respond>(path: &str) -> I {
    I::redirect(path, http::HeaderMap::new())
}
