//! Episode pages and downloads.

use super::{Handler, with_now};
use crate::context::Context;
use crate::model::catalog::{find_episode, visible_episodes};
use crate::model::download::{self, DownloadStatus};
use crate::model::{Episode, Session};
use crate::views;
use http::StatusCode;
use reel_core::HandlerError;

const LATEST: usize = 6;

fn insider(session: Option<&Session>) -> bool {
    session.is_some_and(|session| session.user.is_insider())
}

pub fn home<I: Handler>() -> I {
    I::with_session(|session| {
        with_now(move |context, now| {
            let content = context.catalog.content();
            let mut latest = visible_episodes(&content.episodes, insider(session.as_ref()), now);
            latest.truncate(LATEST);
            I::write_html(
                views::episodes::home(
                    &context.assets,
                    session.as_ref(),
                    &latest,
                    &content.collections,
                ),
                StatusCode::OK,
            )
        })
    })
}

pub fn index<I: Handler>() -> I {
    I::with_session(|session| {
        with_now(move |context, now| {
            let content = context.catalog.content();
            let episodes = visible_episodes(&content.episodes, insider(session.as_ref()), now);
            I::write_html(
                views::episodes::index(&context.assets, session.as_ref(), &episodes),
                StatusCode::OK,
            )
        })
    })
}

pub fn show<I: Handler>(slug: String) -> I {
    I::with_session(move |session| {
        with_now(move |context, now| {
            let insider = insider(session.as_ref());
            let content = context.catalog.content();
            let Some(episode) = find_episode(&content.episodes, &slug, insider, now) else {
                return I::write_error(HandlerError::not_found(format!("no episode {slug}")));
            };
            let can_watch = !episode.subscriber_only
                || insider
                || session.as_ref().is_some_and(|session| session.premium_access);
            I::write_html(
                views::episodes::show(&context.assets, session.as_ref(), &episode, can_watch),
                StatusCode::OK,
            )
        })
    })
}

/// Spend a credit (unless this is a re-download) and redirect to the video
/// host's link.
pub fn download<I: Handler>(slug: String) -> I {
    I::require_session(move |session| {
        with_now(move |context, now| {
            let content = context.catalog.content();
            let Some(episode) =
                find_episode(&content.episodes, &slug, session.user.is_insider(), now)
            else {
                return I::write_error(HandlerError::not_found(format!("no episode {slug}")));
            };
            let user_id = session.user.id;
            I::query(download::downloaded(user_id), move |downloaded| {
                let status = download::status(&session, episode.number, &downloaded, now);
                tracing::debug!(episode = episode.number, ?status, "Download requested");
                match status {
                    DownloadStatus::NotSubscribed => I::write_error(HandlerError::forbidden(
                        format!("user {user_id} has no premium access"),
                    )),
                    DownloadStatus::NoCredits => I::write_error(HandlerError::new(
                        StatusCode::FORBIDDEN,
                        "You have no download credits left.",
                        format!("user {user_id} is out of credits"),
                    )),
                    DownloadStatus::ReDownload => send_to_video::<I>(&context, &episode),
                    DownloadStatus::CanDownload { .. } => {
                        I::query(download::record(user_id, episode.number), move |_| {
                            send_to_video::<I>(&context, &episode)
                        })
                    },
                }
            })
        })
    })
}

fn send_to_video<I: Handler>(context: &Context, episode: &Episode) -> I {
    I::on_success(
        context.video.download_url(&episode.video_id),
        format!("download link for episode {}", episode.number),
        |url: String| I::redirect(&url, http::HeaderMap::new()),
    )
}
