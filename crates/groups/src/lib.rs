//! Party ("group") sessions: the setup wizard, publishing, the owner console
//! and teardown when a party empties.

pub mod console;
pub mod publish;
pub mod render;
pub mod service;
pub mod teardown;
pub mod wizard;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod testkit;

pub use {
    console::{ConsoleFlow, ConsoleReply},
    publish::PublishOutcome,
    service::{GroupService, WizardReply},
    teardown::TeardownReport,
    wizard::{ActiveSubflow, Effect, GroupWizard, Stage, Subflow, WizardEvent},
};
