//! Request paths as typed routes.

use http::Method;
use std::collections::HashMap;
use uuid::Uuid;

/// Every page and endpoint of the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Episodes,
    Episode { slug: String },
    Download { slug: String },
    Subscribe,
    NewSubscription,
    Register,
    Billing,
    TeamMembers,
    RemoveTeamMember { id: Uuid },
    Cancel,
    Reactivate,
    Gifts,
    NewGift { plan: String },
    GiftThankYou { id: Uuid },
    RedeemGift { id: Uuid },
    Login { continue_to: Option<String> },
    LoginCallback { code: Option<String>, origin: Option<String> },
    Logout,
    RecurlyWebhook,
    /// `/assets/<name>`, possibly a content-hashed name.
    Asset { name: String },
    /// Any other file below the resource root.
    Static { path: String },
    NotFound,
}

impl Route {
    /// Match a request line.
    #[must_use]
    pub fn parse(method: &Method, path: &str, query: Option<&str>) -> Self {
        let Some(segments) = segments(path) else {
            return Self::NotFound;
        };
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let post = *method == Method::POST;
        let get = *method == Method::GET || *method == Method::HEAD;

        match (segments.as_slice(), get, post) {
            ([], true, _) => Self::Home,
            (["episodes"], true, _) => Self::Episodes,
            (["episodes", slug], true, _) => Self::Episode {
                slug: (*slug).to_owned(),
            },
            (["episodes", slug, "download"], true, _) => Self::Download {
                slug: (*slug).to_owned(),
            },
            (["subscribe"], true, _) => Self::Subscribe,
            (["subscription", "new"], _, _) if get || post => Self::NewSubscription,
            (["account", "register"], _, _) if get || post => Self::Register,
            (["account", "billing"], true, _) => Self::Billing,
            (["account", "team-members"], _, _) if get || post => Self::TeamMembers,
            (["account", "team-members", id, "delete"], _, true) => {
                Uuid::parse_str(id).map_or(Self::NotFound, |id| Self::RemoveTeamMember { id })
            },
            (["account", "cancel"], _, true) => Self::Cancel,
            (["account", "reactivate"], _, true) => Self::Reactivate,
            (["gift"], true, _) => Self::Gifts,
            (["gift", "new", plan], _, _) if get || post => Self::NewGift {
                plan: (*plan).to_owned(),
            },
            (["gift", id, "thank-you"], true, _) => {
                Uuid::parse_str(id).map_or(Self::NotFound, |id| Self::GiftThankYou { id })
            },
            (["gift", id, "redeem"], _, _) if get || post => {
                Uuid::parse_str(id).map_or(Self::NotFound, |id| Self::RedeemGift { id })
            },
            (["login"], true, _) => {
                let mut query = query_map(query);
                Self::Login {
                    continue_to: query.remove("continue"),
                }
            },
            (["login", "callback"], true, _) => {
                let mut query = query_map(query);
                Self::LoginCallback {
                    code: query.remove("code"),
                    origin: query.remove("origin"),
                }
            },
            (["logout"], true, _) => Self::Logout,
            (["webhooks", "recurly"], _, true) => Self::RecurlyWebhook,
            (["assets", rest @ ..], true, _) if !rest.is_empty() => Self::Asset {
                name: rest.join("/"),
            },
            (rest, true, _) if !rest.is_empty() => Self::Static {
                path: rest.join("/"),
            },
            _ => Self::NotFound,
        }
    }
}

/// Decoded path segments. `None` for undecodable or traversing paths.
fn segments(path: &str) -> Option<Vec<String>> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let decoded = urlencoding::decode(segment).ok()?.into_owned();
            let unsafe_segment = decoded == "." || decoded == ".." || decoded.contains(['/', '\\']);
            (!unsafe_segment).then_some(decoded)
        })
        .collect()
}

fn query_map(query: Option<&str>) -> HashMap<String, String> {
    query
        .and_then(|query| serde_urlencoded::from_str(query).ok())
        .unwrap_or_default()
}

/// A post-login destination. Only local absolute paths are accepted.
#[must_use]
pub fn sanitize_origin(origin: Option<&str>) -> String {
    match origin {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_owned()
        },
        _ => "/".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn get(path: &str) -> Route {
        let (path, query) = path.split_once('?').map_or((path, None), |(p, q)| (p, Some(q)));
        Route::parse(&Method::GET, path, query)
    }

    #[test]
    fn test_pages() {
        assert_eq!(get("/"), Route::Home);
        assert_eq!(get("/episodes/"), Route::Episodes);
        assert_eq!(
            get("/episodes/swift-talk-1/download"),
            Route::Download {
                slug: "swift-talk-1".to_owned()
            }
        );
        assert_eq!(
            get("/login?continue=%2Fsubscription%2Fnew"),
            Route::Login {
                continue_to: Some("/subscription/new".to_owned())
            }
        );
        assert_eq!(
            get("/login/callback?code=abc&origin=%2F"),
            Route::LoginCallback {
                code: Some("abc".to_owned()),
                origin: Some("/".to_owned())
            }
        );
    }

    #[test]
    fn test_methods() {
        assert_eq!(Route::parse(&Method::POST, "/account/cancel", None), Route::Cancel);
        assert_eq!(get("/account/cancel"), Route::Static { path: "account/cancel".to_owned() });
        assert_eq!(Route::parse(&Method::POST, "/episodes", None), Route::NotFound);
        assert_eq!(Route::parse(&Method::POST, "/subscription/new", None), Route::NewSubscription);
        assert_eq!(
            Route::parse(&Method::POST, "/account/team-members/not-a-uuid/delete", None),
            Route::NotFound
        );
        let id = Uuid::from_u128(0x61f7);
        for method in [Method::GET, Method::POST] {
            assert_eq!(
                Route::parse(&method, &format!("/gift/{id}/redeem"), None),
                Route::RedeemGift { id }
            );
        }
    }

    #[test]
    fn test_assets_and_traversal() {
        assert_eq!(get("/assets/css/app-1a2b.css"), Route::Asset { name: "css/app-1a2b.css".to_owned() });
        assert_eq!(get("/robots.txt"), Route::Static { path: "robots.txt".to_owned() });
        assert_eq!(get("/assets/../secrets"), Route::NotFound);
        assert_eq!(get("/assets/%2e%2e/secrets"), Route::NotFound);
        assert_eq!(get("/a%2Fb"), Route::NotFound);
    }

    #[test]
    fn test_sanitize_origin() {
        assert_eq!(sanitize_origin(Some("/subscription/new")), "/subscription/new");
        assert_eq!(sanitize_origin(Some("https://evil.example")), "/");
        assert_eq!(sanitize_origin(Some("//evil.example")), "/");
        assert_eq!(sanitize_origin(Some("/\\evil.example")), "/");
        assert_eq!(sanitize_origin(None), "/");
    }

    proptest! {
        #[test]
        fn prop_origin_is_always_local(origin in ".*") {
            let sanitized = sanitize_origin(Some(&origin));
            prop_assert!(sanitized.starts_with('/'));
            prop_assert!(!sanitized.starts_with("//"));
        }
    }
}
