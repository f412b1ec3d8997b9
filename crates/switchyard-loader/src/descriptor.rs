//! Remote entry descriptors.
//!
//! A descriptor names the fragment, the modules it exposes, and the shared
//! dependencies it was built against:
//!
//! ```json
//! {
//!   "name": "logistics-ui-shop",
//!   "exposes": { "./FleetComponent": { "module": "fleet.json" } },
//!   "shared": {
//!     "@angular/core": { "version": "17.3.0", "requiredVersion": "^17.0.0",
//!                        "singleton": true, "strictVersion": true }
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use reqwest::Url;
use semver::{Version, VersionReq};
use serde::Deserialize;

use crate::errors::LoadError;
use crate::fragment::normalize_exposed;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    name: String,
    #[serde(default)]
    exposes: BTreeMap<String, ExposedModule>,
    #[serde(default)]
    shared: BTreeMap<String, RawShared>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShared {
    version: String,
    #[serde(default)]
    required_version: Option<String>,
    #[serde(default = "default_singleton")]
    singleton: bool,
    #[serde(default)]
    strict_version: bool,
}

fn default_singleton() -> bool {
    true
}

/// One exposed module.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ExposedModule {
    /// Module path, relative to the descriptor URL.
    pub module: String,
}

/// A fragment's declaration for one shared dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedRequirement {
    /// Version the fragment bundles.
    pub version: Version,
    /// Versions the fragment accepts.
    pub required: VersionReq,
    /// Only one copy may exist per process.
    pub singleton: bool,
    /// A mismatch fails the load even for a non-singleton copy.
    pub strict_version: bool,
}

/// A parsed remote entry descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Fragment name.
    pub name: String,
    /// Descriptor URL.
    pub url: String,
    /// Exposed name (normalized to `./Name`) → module.
    pub exposes: BTreeMap<String, ExposedModule>,
    /// Shared dependency name → requirement.
    pub shared: BTreeMap<String, SharedRequirement>,
}

impl RemoteEntry {
    /// Parse descriptor JSON fetched from `url`.
    pub fn parse(url: &str, text: &str) -> Result<Self, LoadError> {
        let malformed = |message: String| LoadError::Malformed {
            url: url.to_string(),
            message,
        };

        let raw: RawEntry = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;

        let exposes = raw
            .exposes
            .into_iter()
            .map(|(name, module)| (normalize_exposed(&name), module))
            .collect();

        let mut shared = BTreeMap::new();
        for (name, decl) in raw.shared {
            let version = Version::parse(decl.version.trim())
                .map_err(|e| malformed(format!("shared {name}: version {}: {e}", decl.version)))?;
            let required = match decl.required_version.as_deref() {
                Some(req) => VersionReq::parse(req.trim())
                    .map_err(|e| malformed(format!("shared {name}: requiredVersion {req}: {e}")))?,
                None => caret_of(&version),
            };
            let _ = shared.insert(
                name,
                SharedRequirement {
                    version,
                    required,
                    singleton: decl.singleton,
                    strict_version: decl.strict_version,
                },
            );
        }

        Ok(Self {
            name: raw.name,
            url: url.to_string(),
            exposes,
            shared,
        })
    }

    /// Look up an exposed module, with or without the leading `./`.
    pub fn exposed(&self, name: &str) -> Option<&ExposedModule> {
        self.exposes.get(&normalize_exposed(name))
    }

    /// Absolute URL of `module`, resolved against the descriptor URL.
    pub fn module_url(&self, module: &ExposedModule) -> Result<String, LoadError> {
        let base = Url::parse(&self.url).map_err(|e| LoadError::Malformed {
            url: self.url.clone(),
            message: e.to_string(),
        })?;
        let joined = base.join(&module.module).map_err(|e| LoadError::Malformed {
            url: self.url.clone(),
            message: format!("module {}: {e}", module.module),
        })?;
        Ok(joined.to_string())
    }
}

/// `^version`: the range a bare version declaration accepts.
fn caret_of(version: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![semver::Comparator {
            op: semver::Op::Caret,
            major: version.major,
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        }],
    }
}
