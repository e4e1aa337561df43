//! Data access over SQLite. Every function takes a borrowed connection so
//! handlers decide how long a pooled connection is held.

pub mod comments;
pub mod communities;
pub mod follows;
pub mod notifications;
pub mod posts;
pub mod projects;
pub mod toggle;
pub mod users;

use chrono::{SecondsFormat, Utc};

pub(crate) fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Timestamps use the same layout as the column defaults so they sort as text.
pub(crate) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
