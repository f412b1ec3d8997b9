//! Host error types.

use switchyard_session::{ApiError, StorageError};
use switchyard_settings::SettingsError;
use thiserror::Error;

/// Errors raised while assembling the host.
#[derive(Debug, Error)]
pub enum HostError {
    /// Settings could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The session storage backend could not be opened.
    #[error("session storage: {0}")]
    Storage(#[from] StorageError),

    /// The REST client could not be built.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An HTTP client could not be built.
    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    /// A host-provided shared dependency has an unparseable version.
    #[error("shared dependency {name}: invalid version {version:?}: {source}")]
    InvalidSharedVersion {
        /// Dependency name.
        name: String,
        /// Configured version string.
        version: String,
        /// Parse failure.
        source: semver::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_shared_version_display() {
        let source = semver::Version::parse("latest").unwrap_err();
        let err = HostError::InvalidSharedVersion {
            name: "@angular/core".into(),
            version: "latest".into(),
            source,
        };
        let text = err.to_string();
        assert!(text.starts_with("shared dependency @angular/core: invalid version \"latest\""));
    }

    #[test]
    fn settings_error_is_transparent() {
        let err: HostError = SettingsError::InvalidValue("bad delay".into()).into();
        assert_eq!(err.to_string(), "invalid settings value: bad delay");
    }
}
