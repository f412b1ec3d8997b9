//! Shared dependency scope.
//!
//! The scope records which version of each shared dependency is loaded in
//! the process and who provided it. The host provides its own dependencies at
//! boot; each fragment's declarations are negotiated against the scope before
//! any of its code is evaluated.
//!
//! Rules per declared dependency:
//! - loaded and the requirement matches: reuse the loaded copy
//! - loaded, mismatch, either side singleton: [`LoadError::VersionConflict`]
//! - loaded, mismatch, either side strict: [`LoadError::VersionConflict`]
//! - loaded, mismatch, neither singleton nor strict: fragment-private copy
//! - not loaded: register the fragment's version (first provider wins)
//!
//! A singleton is never duplicated and never run at a version its
//! requirement rejects.
//!
//! Negotiation is all-or-nothing: nothing is registered unless every
//! declaration passes.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use semver::Version;
use serde::Serialize;
use tracing::{debug, warn};

use crate::descriptor::SharedRequirement;
use crate::errors::LoadError;

/// Provider name recorded for the host's own dependencies.
pub const HOST_PROVIDER: &str = "host";

/// A dependency copy registered in the scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedEntry {
    /// Loaded version.
    pub version: Version,
    /// Who registered it (`host` or a fragment name).
    pub provider: String,
    /// Only one copy may exist per process.
    pub singleton: bool,
    /// Mismatching requirements fail instead of warning.
    pub strict_version: bool,
}

/// How one declared dependency was satisfied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Resolution {
    /// Reusing the copy already in the scope.
    Reused {
        /// Loaded version.
        version: String,
        /// Who registered it.
        provider: String,
    },
    /// The fragment's copy was registered in the scope.
    Registered {
        /// Registered version.
        version: String,
    },
    /// The fragment keeps its own copy, outside the scope.
    Private {
        /// Fragment's version.
        version: String,
    },
}

/// Registry of loaded shared dependencies.
#[derive(Debug, Default)]
pub struct SharedScope {
    entries: Mutex<BTreeMap<String, SharedEntry>>,
}

impl SharedScope {
    /// Empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a host-provided dependency. Returns `false` if `name` is
    /// already registered (the first provider wins).
    pub fn provide(&self, name: &str, version: Version, strict_version: bool) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return false;
        }
        debug!(dependency = %name, version = %version, "host provides shared dependency");
        let _ = entries.insert(
            name.to_string(),
            SharedEntry {
                version,
                provider: HOST_PROVIDER.to_string(),
                singleton: true,
                strict_version,
            },
        );
        true
    }

    /// The registered copy of `name`.
    pub fn get(&self, name: &str) -> Option<SharedEntry> {
        self.entries.lock().get(name).cloned()
    }

    /// Number of registered dependencies.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Negotiate `fragment`'s declarations. See the module docs for the rules.
    pub fn negotiate(
        &self,
        fragment: &str,
        requirements: &BTreeMap<String, SharedRequirement>,
    ) -> Result<BTreeMap<String, Resolution>, LoadError> {
        let mut entries = self.entries.lock();
        let mut resolved = BTreeMap::new();
        let mut to_register = Vec::new();

        for (name, req) in requirements {
            let resolution = match entries.get(name) {
                Some(loaded) if req.required.matches(&loaded.version) => Resolution::Reused {
                    version: loaded.version.to_string(),
                    provider: loaded.provider.clone(),
                },
                Some(loaded)
                    if req.singleton
                        || loaded.singleton
                        || req.strict_version
                        || loaded.strict_version =>
                {
                    warn!(
                        fragment,
                        dependency = %name,
                        required = %req.required,
                        loaded = %loaded.version,
                        "shared dependency version conflict"
                    );
                    return Err(LoadError::VersionConflict {
                        fragment: fragment.to_string(),
                        dependency: name.clone(),
                        required: req.required.to_string(),
                        loaded: loaded.version.to_string(),
                    });
                }
                Some(_) => Resolution::Private {
                    version: req.version.to_string(),
                },
                None => {
                    to_register.push((name.clone(), req));
                    Resolution::Registered {
                        version: req.version.to_string(),
                    }
                }
            };
            let _ = resolved.insert(name.clone(), resolution);
        }

        for (name, req) in to_register {
            debug!(fragment, dependency = %name, version = %req.version, "registering shared dependency");
            let _ = entries.insert(
                name,
                SharedEntry {
                    version: req.version.clone(),
                    provider: fragment.to_string(),
                    singleton: req.singleton,
                    strict_version: req.strict_version,
                },
            );
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use semver::VersionReq;

    fn req(version: &str, required: &str, singleton: bool, strict: bool) -> SharedRequirement {
        SharedRequirement {
            version: Version::parse(version).unwrap(),
            required: VersionReq::parse(required).unwrap(),
            singleton,
            strict_version: strict,
        }
    }

    fn single(name: &str, r: SharedRequirement) -> BTreeMap<String, SharedRequirement> {
        BTreeMap::from([(name.to_string(), r)])
    }

    fn host_scope() -> SharedScope {
        let scope = SharedScope::new();
        assert!(scope.provide("@angular/core", Version::new(17, 3, 0), true));
        scope
    }

    #[test]
    fn first_provider_wins() {
        let scope = host_scope();
        assert!(!scope.provide("@angular/core", Version::new(18, 0, 0), false));
        assert_eq!(scope.get("@angular/core").unwrap().version, Version::new(17, 3, 0));
    }

    #[test]
    fn compatible_requirement_reuses_host_copy() {
        let scope = host_scope();
        let resolved = scope
            .negotiate("shop", &single("@angular/core", req("17.1.0", "^17.0.0", true, true)))
            .unwrap();
        assert_eq!(
            resolved["@angular/core"],
            Resolution::Reused {
                version: "17.3.0".into(),
                provider: HOST_PROVIDER.into()
            }
        );
    }

    #[test]
    fn strict_mismatch_conflicts() {
        let scope = host_scope();
        let result = scope.negotiate("shop", &single("@angular/core", req("18.0.0", "^18.0.0", true, false)));
        assert_matches!(
            result,
            Err(LoadError::VersionConflict { ref dependency, ref loaded, .. })
                if dependency == "@angular/core" && loaded == "17.3.0"
        );
    }

    #[test]
    fn fragment_strict_flag_alone_conflicts() {
        let scope = SharedScope::new();
        assert!(scope.provide("rxjs", Version::new(7, 8, 1), false));
        let result = scope.negotiate("shop", &single("rxjs", req("6.6.0", "^6.0.0", false, true)));
        assert_matches!(result, Err(LoadError::VersionConflict { .. }));
    }

    #[test]
    fn non_strict_singleton_mismatch_conflicts() {
        let scope = SharedScope::new();
        assert!(scope.provide("@angular/core", Version::new(17, 3, 0), false));
        let result = scope.negotiate(
            "shop",
            &single("@angular/core", req("18.0.0", "^18.0.0", true, false)),
        );
        assert_matches!(
            result,
            Err(LoadError::VersionConflict { ref required, ref loaded, .. })
                if required == "^18.0.0" && loaded == "17.3.0"
        );
    }

    #[test]
    fn singleton_registered_by_a_fragment_conflicts() {
        let scope = SharedScope::new();
        let _ = scope
            .negotiate("shop", &single("chart.js", req("4.4.0", "^4.0.0", true, false)))
            .unwrap();
        let result = scope.negotiate(
            "fleet",
            &single("chart.js", req("3.9.1", "^3.0.0", false, false)),
        );
        assert_matches!(result, Err(LoadError::VersionConflict { .. }));
    }

    #[test]
    fn non_singleton_mismatch_is_private() {
        let scope = SharedScope::new();
        let first = single("lodash", req("4.17.21", "^4.0.0", false, false));
        let _ = scope.negotiate("shop", &first).unwrap();

        let resolved = scope
            .negotiate("fleet", &single("lodash", req("3.10.1", "^3.0.0", false, false)))
            .unwrap();
        assert_eq!(
            resolved["lodash"],
            Resolution::Private {
                version: "3.10.1".into()
            }
        );
        assert_eq!(scope.get("lodash").unwrap().provider, "shop");
    }

    #[test]
    fn unloaded_dependency_is_registered() {
        let scope = SharedScope::new();
        let resolved = scope
            .negotiate("shop", &single("chart.js", req("4.4.0", "^4.0.0", true, false)))
            .unwrap();
        assert_matches!(resolved["chart.js"], Resolution::Registered { .. });
        assert_eq!(scope.get("chart.js").unwrap().provider, "shop");
    }

    #[test]
    fn conflict_registers_nothing() {
        let scope = host_scope();
        let mut reqs = single("chart.js", req("4.4.0", "^4.0.0", true, false));
        let _ = reqs.insert("@angular/core".into(), req("18.0.0", "^18.0.0", true, true));

        assert!(scope.negotiate("shop", &reqs).is_err());
        assert!(scope.get("chart.js").is_none());
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn renegotiation_is_idempotent() {
        let scope = SharedScope::new();
        let reqs = single("chart.js", req("4.4.0", "^4.0.0", true, true));
        let _ = scope.negotiate("shop", &reqs).unwrap();
        let again = scope.negotiate("shop", &reqs).unwrap();
        assert_eq!(
            again["chart.js"],
            Resolution::Reused {
                version: "4.4.0".into(),
                provider: "shop".into()
            }
        );
    }
}
