//! Episodes, collections and plans: the slowly changing static data.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One episode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Episode {
    pub number: i32,
    pub slug: String,
    pub title: String,
    pub blurb: String,
    /// Only viewers with premium access may watch or download.
    pub subscriber_only: bool,
    pub publish_at: DateTime<Utc>,
    /// Video host id for streaming and downloads.
    pub video_id: String,
}

impl Episode {
    /// Released episodes are public; insiders also see unreleased ones.
    #[must_use]
    pub fn visible(&self, insider: bool, now: DateTime<Utc>) -> bool {
        insider || self.publish_at <= now
    }
}

/// A named group of episodes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Collection {
    pub slug: String,
    pub title: String,
    pub episode_numbers: Vec<i32>,
}

/// The static data file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(default)]
    pub collections: Vec<Collection>,
}

/// A billing plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub code: String,
    pub name: String,
    pub price_cents: i64,
    pub interval_months: u32,
}

/// Plans with this code prefix are bought as gifts.
pub const GIFT_PLAN_PREFIX: &str = "gift-";

impl Plan {
    #[must_use]
    pub fn is_gift(&self) -> bool {
        is_gift_plan(&self.code)
    }

    /// Price formatted in dollars.
    #[must_use]
    pub fn price(&self) -> String {
        format!("${}.{:02}", self.price_cents / 100, self.price_cents % 100)
    }
}

#[must_use]
pub fn is_gift_plan(code: &str) -> bool {
    code.starts_with(GIFT_PLAN_PREFIX)
}

/// Episodes visible to the viewer, newest first.
#[must_use]
pub fn visible_episodes(episodes: &[Episode], insider: bool, now: DateTime<Utc>) -> Vec<Episode> {
    let mut visible: Vec<Episode> = episodes
        .iter()
        .filter(|episode| episode.visible(insider, now))
        .cloned()
        .collect();
    visible.sort_by(|a, b| b.number.cmp(&a.number));
    visible
}

/// The episode with `slug`, if the viewer may see it.
#[must_use]
pub fn find_episode(
    episodes: &[Episode],
    slug: &str,
    insider: bool,
    now: DateTime<Utc>,
) -> Option<Episode> {
    episodes
        .iter()
        .find(|episode| episode.slug == slug && episode.visible(insider, now))
        .cloned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn episode(number: i32, publish_at: DateTime<Utc>) -> Episode {
        Episode {
            number,
            slug: format!("ep{number}"),
            title: format!("Episode {number}"),
            blurb: String::new(),
            subscriber_only: false,
            publish_at,
            video_id: format!("v{number}"),
        }
    }

    #[test]
    fn test_unreleased_only_for_insiders() {
        let now = Utc::now();
        let episodes = vec![episode(1, now - Duration::days(7)), episode(2, now + Duration::days(7))];

        let public: Vec<i32> = visible_episodes(&episodes, false, now).iter().map(|e| e.number).collect();
        let insider: Vec<i32> = visible_episodes(&episodes, true, now).iter().map(|e| e.number).collect();

        assert_eq!(public, vec![1]);
        assert_eq!(insider, vec![2, 1]);
        assert!(find_episode(&episodes, "ep2", false, now).is_none());
        assert!(find_episode(&episodes, "ep2", true, now).is_some());
    }

    #[test]
    fn test_catalog_file_parses() {
        let file: CatalogFile = serde_json::from_str(
            r#"{"episodes": [{"number": 1, "slug": "intro", "title": "Intro", "blurb": "Hi",
                "subscriber_only": false, "publish_at": "2025-01-01T00:00:00Z", "video_id": "123"}]}"#,
        )
        .unwrap();

        assert_eq!(file.episodes[0].slug, "intro");
        assert!(file.collections.is_empty());
    }

    #[test]
    fn test_plan_price_and_gift() {
        let plan = Plan {
            code: "gift-3-months".to_owned(),
            name: "3 months".to_owned(),
            price_cents: 5400,
            interval_months: 3,
        };
        assert!(plan.is_gift());
        assert_eq!(plan.price(), "$54.00");
    }
}
