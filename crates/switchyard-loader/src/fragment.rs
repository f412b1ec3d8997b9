//! Fragment references.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A logical pointer to one exposed module of a remote fragment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentRef {
    /// URL of the fragment's remote entry descriptor.
    pub remote_entry_url: String,
    /// Exposed module name, e.g. `./FleetComponent`.
    pub exposed_name: String,
}

impl FragmentRef {
    /// Reference `exposed_name` in the descriptor at `remote_entry_url`.
    pub fn new(remote_entry_url: impl Into<String>, exposed_name: impl Into<String>) -> Self {
        Self {
            remote_entry_url: remote_entry_url.into(),
            exposed_name: normalize_exposed(&exposed_name.into()),
        }
    }
}

impl fmt::Display for FragmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.remote_entry_url, self.exposed_name)
    }
}

/// Canonical form of an exposed name: always with a leading `./`.
pub fn normalize_exposed(name: &str) -> String {
    let bare = name.strip_prefix("./").unwrap_or(name);
    let bare = bare.strip_prefix('/').unwrap_or(bare);
    format!("./{bare}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposed_name_normalized() {
        assert_eq!(normalize_exposed("FleetComponent"), "./FleetComponent");
        assert_eq!(normalize_exposed("./FleetComponent"), "./FleetComponent");
        assert_eq!(normalize_exposed("/FleetComponent"), "./FleetComponent");
    }

    #[test]
    fn refs_with_equivalent_names_are_equal() {
        let a = FragmentRef::new("http://shop/remoteEntry.json", "FleetComponent");
        let b = FragmentRef::new("http://shop/remoteEntry.json", "./FleetComponent");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "http://shop/remoteEntry.json#./FleetComponent");
    }
}
