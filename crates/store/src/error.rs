use partyline_common::ActionError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("corrupt {column} column: {source}")]
    Corrupt {
        column: &'static str,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Map a write error, turning unique violations into [`StoreError::Conflict`].
    pub(crate) fn on_write(err: sqlx::Error, what: &'static str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(what),
            _ => Self::Database(err),
        }
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => ActionError::Conflict(format!("{what} already exists")),
            other => ActionError::Internal(other.into()),
        }
    }
}
