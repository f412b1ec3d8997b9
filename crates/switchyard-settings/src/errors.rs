//! Settings errors.

use thiserror::Error;

/// Why settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings: {0}")]
    Io(#[from] std::io::Error),
    /// The settings file is not valid JSON, or does not fit [`HostSettings`](crate::HostSettings).
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A value is outside what the host accepts.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// `Result` alias for settings loading.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_message() {
        let source = serde_json::from_str::<serde_json::Value>("{ broker").unwrap_err();
        assert!(SettingsError::from(source).to_string().starts_with("malformed settings:"));
    }

    #[test]
    fn invalid_value_message() {
        let err = SettingsError::InvalidValue("broker.endpoint must not be empty".into());
        assert_eq!(
            err.to_string(),
            "invalid settings value: broker.endpoint must not be empty"
        );
    }
}
