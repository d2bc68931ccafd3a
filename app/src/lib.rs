//! # Reel
//!
//! A subscription-video site: episode pages and downloads, subscriptions
//! through a billing provider, team seats, gift subscriptions and GitHub
//! sign-in.
//!
//! Handlers in [`handlers`] are generic over the interpreter, so the same
//! code serves live requests through [`site::ReelSite`] and runs
//! synchronously against fakes in tests. Background work lives in the
//! `tasks` table and is run by [`tasks::TaskRunner`].

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions, missing_docs)]

pub mod config;
pub mod context;
pub mod handlers;
pub mod model;
pub mod route;
pub mod services;
pub mod site;
pub mod tasks;
pub mod views;

pub use config::Config;
pub use context::{AssetMap, Catalog, Context};
pub use site::ReelSite;
pub use tasks::TaskRunner;
