//! Fragment loader.
//!
//! `load` runs: descriptor (cached per URL) → exposed-module lookup → shared
//! dependency negotiation → module fetch → evaluation. Descriptors are
//! fetched at most once per URL per loader; failed fetches are not cached.
//! Concurrent loads of the same [`FragmentRef`] share one resolution task.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::context::HostContext;
use crate::descriptor::RemoteEntry;
use crate::errors::LoadError;
use crate::evaluator::{Exports, ManifestEvaluator, ModuleEvaluator, ModuleSource};
use crate::fragment::FragmentRef;
use crate::shared::Resolution;

/// Default timeout for descriptor and module fetches.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

type LoadResult = Result<Arc<FragmentModule>, LoadError>;
type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// A loaded, evaluated fragment module.
#[derive(Debug)]
pub struct FragmentModule {
    /// Fragment name from the descriptor.
    pub fragment: String,
    /// Exposed name (normalized).
    pub exposed: String,
    /// Module URL.
    pub url: String,
    /// Named exports.
    pub exports: Exports,
    /// How each shared dependency was satisfied.
    pub shared: BTreeMap<String, Resolution>,
    /// Host singletons the module was evaluated with.
    pub context: HostContext,
}

impl FragmentModule {
    /// One export by name.
    pub fn export(&self, name: &str) -> Option<&Value> {
        self.exports.get(name)
    }
}

struct LoaderInner {
    http: reqwest::Client,
    context: HostContext,
    evaluator: Arc<dyn ModuleEvaluator>,
    descriptors: DashMap<String, Arc<OnceCell<Arc<RemoteEntry>>>>,
    in_flight: Mutex<HashMap<FragmentRef, SharedLoad>>,
}

/// Loads fragments into the host. Cheap to clone.
#[derive(Clone)]
pub struct FragmentLoader {
    inner: Arc<LoaderInner>,
}

impl std::fmt::Debug for FragmentLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentLoader")
            .field("cached_descriptors", &self.inner.descriptors.len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish_non_exhaustive()
    }
}

impl FragmentLoader {
    /// Loader with the [`ManifestEvaluator`] and a client using `timeout`.
    pub fn new(context: HostContext, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_evaluator(context, http, Arc::new(ManifestEvaluator)))
    }

    /// Loader with a custom HTTP client and evaluator.
    pub fn with_evaluator(
        context: HostContext,
        http: reqwest::Client,
        evaluator: Arc<dyn ModuleEvaluator>,
    ) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                http,
                context,
                evaluator,
                descriptors: DashMap::new(),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Host context passed to every module.
    pub fn context(&self) -> &HostContext {
        &self.inner.context
    }

    /// Resolve `fragment` to an evaluated module.
    ///
    /// Concurrent calls with an equal reference share one resolution and
    /// receive the same result. Must be called within a Tokio runtime.
    pub async fn load(&self, fragment: &FragmentRef) -> LoadResult {
        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(pending) = in_flight.get(fragment) {
                debug!(fragment = %fragment, "joining in-flight load");
                pending.clone()
            } else {
                let pending = self.spawn_resolution(fragment.clone());
                let _ = in_flight.insert(fragment.clone(), pending.clone());
                pending
            }
        };
        pending.await
    }

    fn spawn_resolution(&self, fragment: FragmentRef) -> SharedLoad {
        let inner = Arc::clone(&self.inner);
        let module = fragment.to_string();
        let task = tokio::spawn(async move {
            let result = inner.resolve(&fragment).await;
            let _ = inner.in_flight.lock().remove(&fragment);
            if let Err(e) = &result {
                warn!(fragment = %fragment, kind = e.kind(), error = %e, "fragment load failed");
            }
            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(LoadError::Evaluation {
                    module,
                    message: format!("load task failed: {e}"),
                })
            })
        }
        .boxed()
        .shared()
    }

    /// Fetch (or return the cached) descriptor at `url`.
    pub async fn remote_entry(&self, url: &str) -> Result<Arc<RemoteEntry>, LoadError> {
        self.inner.remote_entry(url).await
    }

    /// Whether the descriptor at `url` is cached.
    pub fn is_cached(&self, url: &str) -> bool {
        self.inner
            .descriptors
            .get(url)
            .is_some_and(|cell| cell.initialized())
    }
}

impl LoaderInner {
    #[instrument(skip_all, fields(fragment = %fragment))]
    async fn resolve(&self, fragment: &FragmentRef) -> LoadResult {
        let entry = self.remote_entry(&fragment.remote_entry_url).await?;

        let exposed = entry
            .exposed(&fragment.exposed_name)
            .ok_or_else(|| LoadError::ExposedModuleNotFound {
                fragment: entry.name.clone(),
                exposed: fragment.exposed_name.clone(),
            })?;
        let url = entry.module_url(exposed)?;

        let shared = self.context.shared().negotiate(&entry.name, &entry.shared)?;

        let text = self.fetch_module(&entry.name, &fragment.exposed_name, &url).await?;
        let source = ModuleSource {
            fragment: entry.name.clone(),
            exposed: fragment.exposed_name.clone(),
            url: url.clone(),
            text,
        };
        let exports = self.evaluator.evaluate(&source, &self.context).await?;

        info!(fragment = %entry.name, exposed = %fragment.exposed_name, exports = exports.len(), "fragment loaded");
        Ok(Arc::new(FragmentModule {
            fragment: entry.name.clone(),
            exposed: fragment.exposed_name.clone(),
            url,
            exports,
            shared,
            context: self.context.clone(),
        }))
    }

    async fn remote_entry(&self, url: &str) -> Result<Arc<RemoteEntry>, LoadError> {
        let cell = Arc::clone(self.descriptors.entry(url.to_string()).or_default().value());
        cell.get_or_try_init(|| self.fetch_descriptor(url))
            .await
            .map(Arc::clone)
    }

    async fn fetch_descriptor(&self, url: &str) -> Result<Arc<RemoteEntry>, LoadError> {
        debug!(url, "fetching remote entry");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::network(url, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(LoadError::RemoteEntryNotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(LoadError::Network {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| LoadError::network(url, &e))?;
        let entry = RemoteEntry::parse(url, &text)?;
        info!(url, fragment = %entry.name, exposes = entry.exposes.len(), "remote entry cached");
        Ok(Arc::new(entry))
    }

    async fn fetch_module(&self, fragment: &str, exposed: &str, url: &str) -> Result<String, LoadError> {
        debug!(url, "fetching module");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::network(url, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(LoadError::ExposedModuleNotFound {
                fragment: fragment.to_string(),
                exposed: exposed.to_string(),
            });
        }
        if !status.is_success() {
            return Err(LoadError::Network {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        response
            .text()
            .await
            .map_err(|e| LoadError::network(url, &e))
    }
}
