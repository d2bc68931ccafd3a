//! The process-wide context handed to every request.
//!
//! Built once at startup from [`Config`] and the live collaborators (or from
//! fakes in tests) and shared behind an `Arc`. Nothing in the app reads
//! ambient global state.

use crate::config::Config;
use crate::model::{CatalogFile, Plan};
use crate::services::{Billing, GitHub, Mailer, VideoHost};
use chrono::{DateTime, Utc};
use reel_core::Clock;
use reel_runtime::Snapshot;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory under the resource root holding cache-busted assets.
pub const ASSET_DIRECTORY: &str = "assets";

/// Cache lifetime for hashed assets: one year.
pub const HASHED_ASSET_MAX_AGE: u32 = 31_536_000;

/// Everything a handler may need besides its session and connection.
pub struct Context {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub billing: Arc<dyn Billing>,
    pub mailer: Arc<dyn Mailer>,
    pub github: Arc<dyn GitHub>,
    pub video: Arc<dyn VideoHost>,
    pub catalog: Catalog,
    pub assets: AssetMap,
}

impl Context {
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// An absolute URL on this site.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("base_url", &self.config.base_url)
            .field("catalog", &self.catalog)
            .field("assets", &self.assets.len())
            .finish_non_exhaustive()
    }
}

/// Episodes, collections and plans, each republished atomically.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub content: Snapshot<CatalogFile>,
    pub plans: Snapshot<Vec<Plan>>,
}

impl Catalog {
    #[must_use]
    pub fn new(content: CatalogFile, plans: Vec<Plan>) -> Self {
        Self {
            content: Snapshot::new("catalog", content),
            plans: Snapshot::new("plans", plans),
        }
    }

    /// The current episodes and collections. Holding the `Arc` keeps this
    /// version alive across a concurrent refresh.
    #[must_use]
    pub fn content(&self) -> Arc<CatalogFile> {
        self.content.load()
    }

    #[must_use]
    pub fn plan(&self, code: &str) -> Option<Plan> {
        self.plans.load().iter().find(|plan| plan.code == code).cloned()
    }

    /// Plans bought for oneself.
    #[must_use]
    pub fn regular_plans(&self) -> Vec<Plan> {
        self.plans.load().iter().filter(|plan| !plan.is_gift()).cloned().collect()
    }

    #[must_use]
    pub fn gift_plans(&self) -> Vec<Plan> {
        self.plans.load().iter().filter(|plan| plan.is_gift()).cloned().collect()
    }

    /// Reload the static data file and the plans. Each snapshot keeps its
    /// previous version if its source fails; `true` when both were replaced.
    pub async fn refresh(&self, static_data_path: &Path, billing: &dyn Billing) -> bool {
        let content = self.content.refresh(read_catalog_file(static_data_path)).await;
        let plans = self.plans.refresh(billing.plans().into_future()).await;
        content && plans
    }
}

/// Read the episode and collection file. Failures are logged and yield `None`
/// so a refresh keeps the previous version.
pub async fn read_catalog_file(path: &Path) -> Option<CatalogFile> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "Failed to read static data");
            return None;
        },
    };
    match serde_json::from_slice(&bytes) {
        Ok(file) => Some(file),
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "Static data is not valid JSON");
            None
        },
    }
}

/// Content-hashed asset names.
///
/// `app.css` with contents hashing to `3f2a…` is published as
/// `app-3f2a9c01d4e5b6a7.css`; the map resolves that name back to the file.
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    by_hash: HashMap<String, String>,
    by_name: HashMap<String, String>,
}

impl AssetMap {
    /// Build from `(name, contents)` pairs, names relative to the asset
    /// directory.
    pub fn from_files<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = (String, &'a [u8])>,
    {
        let mut map = Self::default();
        for (name, contents) in files {
            let hashed = hashed_name(&name, contents);
            map.by_hash.insert(hashed.clone(), name.clone());
            map.by_name.insert(name, hashed);
        }
        map
    }

    /// Hash every file below `<resource_root>/assets`.
    ///
    /// # Errors
    ///
    /// Any I/O error while walking the directory. A missing directory is an
    /// empty map.
    pub async fn load(resource_root: &Path) -> std::io::Result<Self> {
        let root = resource_root.join(ASSET_DIRECTORY);
        if !tokio::fs::try_exists(&root).await? {
            tracing::warn!(path = %root.display(), "No asset directory");
            return Ok(Self::default());
        }
        let mut files = Vec::new();
        let mut pending: Vec<PathBuf> = vec![root.clone()];
        while let Some(directory) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&directory).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&root) {
                    let name = relative.to_string_lossy().replace('\\', "/");
                    files.push((name, tokio::fs::read(&path).await?));
                }
            }
        }
        let map = Self::from_files(files.iter().map(|(name, bytes)| (name.clone(), bytes.as_slice())));
        tracing::info!(assets = map.len(), "Hashed assets");
        Ok(map)
    }

    /// The file (relative to the resource root) behind a hashed name.
    #[must_use]
    pub fn resolve(&self, hashed: &str) -> Option<String> {
        self.by_hash
            .get(hashed)
            .map(|name| format!("{ASSET_DIRECTORY}/{name}"))
    }

    /// The URL views link to: hashed when known, literal otherwise.
    #[must_use]
    pub fn url(&self, name: &str) -> String {
        let published = self.by_name.get(name).map_or(name, String::as_str);
        format!("/{ASSET_DIRECTORY}/{published}")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

fn hashed_name(name: &str, contents: &[u8]) -> String {
    let digest = Sha256::digest(contents);
    let hash: String = digest.iter().take(8).map(|byte| format!("{byte:02x}")).collect();
    match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !stem.ends_with('/') => {
            format!("{stem}-{hash}.{extension}")
        },
        _ => format!("{name}-{hash}"),
    }
}
