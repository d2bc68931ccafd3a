//! Turning a finished [`Reply`] into an HTTP response.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::{CACHE_CONTROL, LOCATION};
use http::{HeaderMap, HeaderValue, Request, StatusCode};
use reel_core::{HandlerError, html};
use reel_runtime::Reply;
use std::path::{Component, Path, PathBuf};
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Build the response for `reply`.
///
/// `request_headers` are the original request's headers; file replies use
/// them for conditional and range requests.
pub async fn into_response(reply: Reply, resource_root: &Path, request_headers: HeaderMap) -> Response {
    match reply {
        Reply::Write {
            body,
            status,
            headers,
        } => (status, headers, body).into_response(),
        Reply::Redirect { path, headers } => redirect(&path, headers),
        Reply::File { path, max_age } => {
            serve_file(resource_root, &path, max_age, request_headers).await
        },
    }
}

fn redirect(path: &str, mut headers: HeaderMap) -> Response {
    match HeaderValue::from_str(path) {
        Ok(location) => {
            headers.insert(LOCATION, location);
            (StatusCode::SEE_OTHER, headers).into_response()
        },
        Err(_) => not_found(&format!("redirect target is not a valid header: {path:?}")),
    }
}

/// Resolve `path` below `root`. Absolute paths and `..` never resolve.
#[must_use]
pub fn resolve_resource(root: &Path, path: &str) -> Option<PathBuf> {
    let relative = Path::new(path.trim_start_matches('/'));
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    (safe && !path.is_empty()).then(|| root.join(relative))
}

async fn serve_file(
    root: &Path,
    path: &str,
    max_age: Option<u32>,
    request_headers: HeaderMap,
) -> Response {
    let Some(file) = resolve_resource(root, path) else {
        return not_found(&format!("rejected resource path {path:?}"));
    };
    let is_file = tokio::fs::metadata(&file)
        .await
        .is_ok_and(|metadata| metadata.is_file());
    if !is_file {
        return not_found(&format!("no resource at {}", file.display()));
    }

    let mut request = Request::new(Body::empty());
    *request.headers_mut() = request_headers;
    let mut response = match ServeFile::new(&file).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if let Some(max_age) = max_age {
        if response.status().is_success() {
            if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={max_age}")) {
                response.headers_mut().insert(CACHE_CONTROL, value);
            }
        }
    }
    response
}

fn not_found(reason: &str) -> Response {
    let error = HandlerError::not_found(reason);
    tracing::debug!(reason, "Resource not found");
    (error.status, axum::response::Html(html::error_page(&error))).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::header::CONTENT_TYPE;

    /// A throwaway resource directory, removed on drop.
    struct Resources(PathBuf);

    impl Resources {
        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for Resources {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn resources() -> Resources {
        let dir = std::env::temp_dir().join(format!("reel-web-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("css")).unwrap();
        std::fs::write(dir.join("css/site.css"), "body { color: black; }").unwrap();
        Resources(dir)
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = Path::new("/srv/static");
        assert_eq!(
            resolve_resource(root, "/css/site.css"),
            Some(PathBuf::from("/srv/static/css/site.css"))
        );
        assert_eq!(resolve_resource(root, "../secrets"), None);
        assert_eq!(resolve_resource(root, "css/../../etc/passwd"), None);
        assert_eq!(resolve_resource(root, ""), None);
    }

    #[tokio::test]
    async fn test_redirect_is_see_other() {
        let reply = Reply::Redirect {
            path: "/account/billing".to_owned(),
            headers: HeaderMap::new(),
        };
        let response = into_response(reply, Path::new("/"), HeaderMap::new()).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/account/billing");
    }

    #[tokio::test]
    async fn test_write_keeps_status_and_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let reply = Reply::Write {
            body: Bytes::from_static(b"hello"),
            status: StatusCode::ACCEPTED,
            headers,
        };
        let response = into_response(reply, Path::new("/"), HeaderMap::new()).await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    }

    #[tokio::test]
    async fn test_file_with_max_age() {
        let resources = resources();
        let reply = Reply::File {
            path: "css/site.css".to_owned(),
            max_age: Some(31_536_000),
        };
        let response = into_response(reply, resources.path(), HeaderMap::new()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/css");
        assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=31536000");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body, "body { color: black; }");
    }

    #[tokio::test]
    async fn test_file_without_max_age_and_missing_file() {
        let resources = resources();
        let plain = Reply::File {
            path: "css/site.css".to_owned(),
            max_age: None,
        };
        let response = into_response(plain, resources.path(), HeaderMap::new()).await;
        assert!(response.headers().get(CACHE_CONTROL).is_none());

        let missing = Reply::File {
            path: "css/missing.css".to_owned(),
            max_age: None,
        };
        let response = into_response(missing, resources.path(), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let traversal = Reply::File {
            path: "../etc/passwd".to_owned(),
            max_age: None,
        };
        let response = into_response(traversal, resources.path(), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
