//! Load error type.

/// Why a fragment could not be loaded.
///
/// `Clone` so every caller of a coalesced load receives the same error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The descriptor or module could not be fetched (connect failure,
    /// timeout, non-404 error status).
    #[error("network error fetching {url}: {message}")]
    Network {
        /// URL being fetched.
        url: String,
        /// Transport error or status.
        message: String,
    },

    /// The remote entry descriptor does not exist.
    #[error("remote entry not found: {url}")]
    RemoteEntryNotFound {
        /// Descriptor URL.
        url: String,
    },

    /// A shared dependency is already loaded at an incompatible version and
    /// one side requires strict matching.
    #[error("shared dependency {dependency} conflict: {fragment} requires {required}, loaded {loaded}")]
    VersionConflict {
        /// Fragment that declared the requirement.
        fragment: String,
        /// Dependency name.
        dependency: String,
        /// Fragment's version requirement.
        required: String,
        /// Version already loaded.
        loaded: String,
    },

    /// The descriptor does not expose the requested module, or the module
    /// file it points to is missing.
    #[error("exposed module {exposed} not found in {fragment}")]
    ExposedModuleNotFound {
        /// Fragment name (or descriptor URL).
        fragment: String,
        /// Requested exposed name.
        exposed: String,
    },

    /// The descriptor or module source does not parse.
    #[error("malformed {url}: {message}")]
    Malformed {
        /// Source URL.
        url: String,
        /// Parse error.
        message: String,
    },

    /// The evaluator rejected the module.
    #[error("evaluation of {module} failed: {message}")]
    Evaluation {
        /// Module URL.
        module: String,
        /// Evaluator error.
        message: String,
    },
}

impl LoadError {
    /// Short machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::RemoteEntryNotFound { .. } => "remote_entry_not_found",
            Self::VersionConflict { .. } => "version_conflict",
            Self::ExposedModuleNotFound { .. } => "exposed_module_not_found",
            Self::Malformed { .. } => "malformed",
            Self::Evaluation { .. } => "evaluation",
        }
    }

    pub(crate) fn network(url: &str, error: &reqwest::Error) -> Self {
        Self::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_conflict_display() {
        let err = LoadError::VersionConflict {
            fragment: "logistics-ui-shop".into(),
            dependency: "@angular/core".into(),
            required: "^18.0.0".into(),
            loaded: "17.3.0".into(),
        };
        assert_eq!(
            err.to_string(),
            "shared dependency @angular/core conflict: logistics-ui-shop requires ^18.0.0, loaded 17.3.0"
        );
        assert_eq!(err.kind(), "version_conflict");
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            LoadError::Network { url: String::new(), message: String::new() }.kind(),
            LoadError::RemoteEntryNotFound { url: String::new() }.kind(),
            LoadError::ExposedModuleNotFound { fragment: String::new(), exposed: String::new() }.kind(),
            LoadError::Malformed { url: String::new(), message: String::new() }.kind(),
            LoadError::Evaluation { module: String::new(), message: String::new() }.kind(),
        ];
        let unique: std::collections::BTreeSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
