//! Static files.

use super::Handler;
use crate::context::{ASSET_DIRECTORY, HASHED_ASSET_MAX_AGE};

/// Hashed names are cached for a year; anything else is served by its
/// literal path without caching.
pub fn asset<I: Handler>(name: String) -> I {
    I::with_context(move |context| match context.assets.resolve(&name) {
        Some(file) => I::write_file(&file, Some(HASHED_ASSET_MAX_AGE)),
        None => I::write_file(&format!("{ASSET_DIRECTORY}/{name}"), None),
    })
}

/// Any other literal path under the resource root.
pub fn file<I: Handler>(path: String) -> I {
    I::write_file(&path, None)
}
