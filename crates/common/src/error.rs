use std::time::Duration;

/// Why an interactive action was refused.
///
/// Every variant except `Internal` carries a message meant for the actor.
/// Projection failures (announcement or thread gone missing) never become an
/// `ActionError`; callers log them and carry on.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Malformed or out-of-range input. The sub-flow stays open for retry.
    #[error("{0}")]
    Validation(String),

    /// A precondition failed (already owns a record, blocked pair, ...).
    #[error("{0}")]
    Conflict(String),

    #[error("slow down, try again in {}", format_wait(*remaining))]
    RateLimited { remaining: Duration },

    /// The actor must be inside a specific resource.
    #[error("you need to be in {0} to do that")]
    NotPresent(String),

    #[error("only the owner can do that")]
    NotOwner,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("timed out")]
    Timeout,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ActionResult<T> = Result<T, ActionError>;

impl ActionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Message to show the actor. Internal failures are masked.
    pub fn user_message(&self) -> String {
        match self {
            Self::Internal(_) => "something went wrong, please try again later".into(),
            other => other.to_string(),
        }
    }

    /// Validation failures leave the current sub-flow open.
    pub fn keeps_subflow_open(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Human-readable wait, rounded up to whole seconds: `4m 05s`, `12s`.
pub fn format_wait(d: Duration) -> String {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{s}s"),
        (0, m, s) => format!("{m}m {s:02}s"),
        (h, m, _) => format!("{h}h {m:02}m"),
    }
}
