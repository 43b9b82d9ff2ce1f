//! Platform seams.
//!
//! The engine never talks to the chat platform directly. Voice resources,
//! the announcement surface, discussion threads, the ops log, the moderation
//! classifier and the member directory are all traits here; the Discord
//! adapter implements them and tests use the in-memory [`mock`] platform.

pub mod access;
pub mod plugin;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use plugin::{
    AcceptAll, Access, Announcement, AnnouncementSurface, CLEAN_LABEL, MemberDirectory,
    ModerationClassifier, OpsLog, Overwrite, OverwriteTarget, Platform, ThreadSurface,
    VoiceChannelSpec, VoicePlatform,
};
