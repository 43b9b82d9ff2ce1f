//! Interactive session plumbing: keys, the timeout-aware registry and the
//! input parsers shared by wizards and consoles.

pub mod input;
pub mod key;
pub mod registry;

pub use {
    key::SessionKey,
    registry::{Expired, Expiry, SessionHandle, SessionRegistry},
};
