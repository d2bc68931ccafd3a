//! Domain types and the queries that load and store them.
//!
//! Every query is a [`reel_core::Query`] value: handlers describe it, the
//! interpreter decides how it runs.

pub mod catalog;
pub mod download;
pub mod gift;
pub mod session;
pub mod task;
pub mod team;
pub mod user;

pub use catalog::{CatalogFile, Collection, Episode, Plan};
pub use download::DownloadStatus;
pub use gift::{Gift, NewGift};
pub use session::Session;
pub use task::{StoredTask, Task};
pub use team::TeamMember;
pub use user::User;
