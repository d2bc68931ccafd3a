//! Vimeo download links.

use super::VideoHost;
use super::http::RemoteEndpoint;
use reel_core::Promise;
use reqwest::Method;
use serde::Deserialize;

const API_ROOT: &str = "https://api.vimeo.com";

/// Live video host.
#[derive(Debug, Clone)]
pub struct VimeoHost {
    endpoint: RemoteEndpoint,
    api_key: String,
}

impl VimeoHost {
    #[must_use]
    pub fn new(endpoint: RemoteEndpoint, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    download: Vec<Download>,
}

#[derive(Debug, Deserialize)]
struct Download {
    #[serde(default)]
    quality: String,
    #[serde(default)]
    width: u32,
    link: String,
}

/// The HD link if there is one, else the widest rendition.
fn best_link(video: Video) -> Option<String> {
    video
        .download
        .into_iter()
        .max_by_key(|download| (download.quality == "hd", download.width))
        .map(|download| download.link)
}

impl VideoHost for VimeoHost {
    fn download_url(&self, video_id: &str) -> Promise<Option<String>> {
        let request = self
            .endpoint
            .request(Method::GET, &format!("{API_ROOT}/videos/{video_id}"))
            .bearer_auth(&self.api_key)
            .query(&[("fields", "download")]);
        self.endpoint
            .load::<Video>(format!("download links for video {video_id}"), request)
            .map(|video| video.and_then(best_link))
    }
}
