//! GitHub OAuth sign-in.

use super::http::RemoteEndpoint;
use super::{GitHub, GitHubProfile};
use crate::config::GitHubConfig;
use reel_core::Promise;
use reqwest::Method;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const AGENT: &str = "reel-server";

/// Live GitHub client.
#[derive(Debug, Clone)]
pub struct GitHubOAuth {
    endpoint: RemoteEndpoint,
    client_id: String,
    client_secret: String,
}

impl GitHubOAuth {
    #[must_use]
    pub fn new(endpoint: RemoteEndpoint, config: &GitHubConfig) -> Self {
        Self {
            endpoint,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GitHub for GitHubOAuth {
    fn authorize_url(&self, redirect_uri: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?scope=user:email&client_id={}&redirect_uri={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri)
        )
    }

    fn access_token(&self, code: &str) -> Promise<Option<String>> {
        let request = self
            .endpoint
            .request(Method::POST, TOKEN_URL)
            .header(ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ]);
        self.endpoint
            .load::<TokenResponse>("exchange GitHub OAuth code", request)
            .map(|token| token.map(|token| token.access_token))
    }

    fn profile(&self, access_token: &str) -> Promise<Option<GitHubProfile>> {
        let request = self
            .endpoint
            .request(Method::GET, USER_URL)
            .bearer_auth(access_token)
            .header(USER_AGENT, AGENT)
            .header(ACCEPT, "application/vnd.github+json");
        self.endpoint.load("fetch GitHub profile", request)
    }
}
