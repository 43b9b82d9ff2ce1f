//! Shared identifiers, the user-facing error taxonomy and small time helpers
//! used by every partyline crate.

pub mod error;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

pub use {
    error::{ActionError, ActionResult, format_wait},
    types::{ArtifactId, CommunityId, MemberId, ResourceId, RoleId, ThreadId},
};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
