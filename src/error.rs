use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Link {id} not found")]
    LinkNotFound { id: i64 },

    #[error("Tag {id} not found")]
    TagNotFound { id: i64 },

    #[error("Highlight {id} not found")]
    HighlightNotFound { id: i64 },

    #[error("Tag {tag_id} belongs to a different user than the link")]
    OwnershipMismatch { tag_id: i64 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

// Domain errors raised inside a tokio-rusqlite `call` closure travel out
// through the closure's error channel and are unwrapped again on the other
// side. Anything that isn't a smuggled AppError or a plain rusqlite error
// is a connection-level failure.
impl From<AppError> for tokio_rusqlite::Error {
    fn from(err: AppError) -> Self {
        tokio_rusqlite::Error::Other(Box::new(err))
    }
}

impl From<tokio_rusqlite::Error> for AppError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => AppError::Database(e),
            tokio_rusqlite::Error::Other(inner) => match inner.downcast::<AppError>() {
                Ok(app_err) => *app_err,
                Err(other) => AppError::Connection(other.to_string()),
            },
            other => AppError::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_error_round_trips_through_call_error() {
        let err = AppError::OwnershipMismatch { tag_id: 7 };
        let wrapped: tokio_rusqlite::Error = err.into();
        let back: AppError = wrapped.into();
        assert!(matches!(back, AppError::OwnershipMismatch { tag_id: 7 }));
    }

    #[test]
    fn rusqlite_error_maps_to_database() {
        let wrapped = tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows);
        let back: AppError = wrapped.into();
        assert!(matches!(back, AppError::Database(_)));
    }
}
