use super::page;
use crate::context::AssetMap;
use crate::model::{Collection, Episode, Session};
use reel_core::html::escape;

fn episode_item(episode: &Episode) -> String {
    let badge = if episode.subscriber_only { " <span class=\"badge\">Subscribers</span>" } else { "" };
    format!(
        "<li><a href=\"/episodes/{slug}\">#{number} {title}</a>{badge}<p>{blurb}</p></li>",
        slug = escape(&episode.slug),
        number = episode.number,
        title = escape(&episode.title),
        blurb = escape(&episode.blurb),
    )
}

#[must_use]
pub fn home(
    assets: &AssetMap,
    session: Option<&Session>,
    latest: &[Episode],
    collections: &[Collection],
) -> String {
    let episodes: String = latest.iter().map(episode_item).collect();
    let collections: String = collections
        .iter()
        .map(|collection| {
            format!(
                "<li>{} ({} episodes)</li>",
                escape(&collection.title),
                collection.episode_numbers.len()
            )
        })
        .collect();
    page(
        assets,
        "Home",
        session,
        &format!(
            "<h1>Latest episodes</h1><ul>{episodes}</ul>\
             <h2>Collections</h2><ul>{collections}</ul>"
        ),
    )
}

#[must_use]
pub fn index(assets: &AssetMap, session: Option<&Session>, episodes: &[Episode]) -> String {
    let items: String = episodes.iter().map(episode_item).collect();
    page(assets, "Episodes", session, &format!("<h1>All episodes</h1><ul>{items}</ul>"))
}

/// An episode page. Locked episodes link to subscribing instead of the
/// download.
#[must_use]
pub fn show(
    assets: &AssetMap,
    session: Option<&Session>,
    episode: &Episode,
    can_watch: bool,
) -> String {
    let action = if can_watch {
        format!(
            "<div class=\"player\" data-video=\"{video}\"></div>\
             <a href=\"/episodes/{slug}/download\">Download</a>",
            video = escape(&episode.video_id),
            slug = escape(&episode.slug),
        )
    } else {
        "<p>This episode is for subscribers.</p><a href=\"/subscribe\">Subscribe</a>".to_owned()
    };
    page(
        assets,
        &episode.title,
        session,
        &format!(
            "<h1>#{number} {title}</h1><p>{blurb}</p>{action}",
            number = episode.number,
            title = escape(&episode.title),
            blurb = escape(&episode.blurb),
        ),
    )
}
