//! Session error types.

/// Errors raised by a [`DurableStorage`](crate::storage::DurableStorage) backend.
///
/// The session store never propagates these; it logs them and keeps its
/// in-memory state.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `SQLite` error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Storage is disabled or over quota.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from calls across the REST boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server rejected the credential; the session has been cleared.
    #[error("authorization rejected; session cleared")]
    Unauthorized,

    /// Any other non-success status.
    #[error("request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_display() {
        let err = ApiError::Rejected {
            status: 503,
            message: "gateway down".to_string(),
        };
        assert_eq!(err.to_string(), "request rejected (503): gateway down");
    }

    #[test]
    fn unauthorized_display() {
        assert!(ApiError::Unauthorized.to_string().contains("session cleared"));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("read-only"));
    }
}
