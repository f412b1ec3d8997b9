//! Module evaluation.
//!
//! A fetched module source becomes a set of named exports through a
//! [`ModuleEvaluator`]. The default [`ManifestEvaluator`] reads a JSON
//! manifest:
//!
//! ```json
//! { "exports": { "FleetComponent": { "title": "Fleet", "route": "fleet" } } }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::context::HostContext;
use crate::errors::LoadError;

/// Named exports of an evaluated module.
pub type Exports = BTreeMap<String, Value>;

/// A fetched, not yet evaluated module.
#[derive(Clone, Debug)]
pub struct ModuleSource {
    /// Fragment name from the descriptor.
    pub fragment: String,
    /// Exposed name that was requested.
    pub exposed: String,
    /// Absolute module URL.
    pub url: String,
    /// Module text.
    pub text: String,
}

/// Turns module sources into exports.
#[async_trait]
pub trait ModuleEvaluator: Send + Sync {
    /// Evaluate `source` with access to the host singletons.
    async fn evaluate(&self, source: &ModuleSource, context: &HostContext)
    -> Result<Exports, LoadError>;
}

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    exports: Option<Exports>,
}

/// Evaluator for JSON export manifests.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifestEvaluator;

#[async_trait]
impl ModuleEvaluator for ManifestEvaluator {
    async fn evaluate(
        &self,
        source: &ModuleSource,
        _context: &HostContext,
    ) -> Result<Exports, LoadError> {
        let manifest: Manifest =
            serde_json::from_str(&source.text).map_err(|e| LoadError::Malformed {
                url: source.url.clone(),
                message: e.to_string(),
            })?;
        match manifest.exports {
            Some(exports) if !exports.is_empty() => Ok(exports),
            _ => Err(LoadError::Malformed {
                url: source.url.clone(),
                message: "module has no exports".to_string(),
            }),
        }
    }
}
