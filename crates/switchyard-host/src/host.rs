//! Composition root.
//!
//! [`Host::build`] constructs every process-wide singleton exactly once from
//! [`HostSettings`]: the session store over the configured storage backend,
//! the bus client, the shared scope seeded with the host's own dependencies,
//! the fragment loader, and the REST and identity clients. The bus is not
//! connected until [`Host::start`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use semver::Version;
use switchyard_bus::{BusClient, ReconnectPolicy, SubscriptionHandle};
use switchyard_loader::{FragmentLoader, FragmentModule, HostContext, LoadError, SharedScope};
use switchyard_session::{
    ApiClient, DurableStorage, IdentityClient, JsonFileStorage, MemoryStorage, SessionStore,
    SqliteStorage,
};
use switchyard_settings::{
    HostSettings, ReconnectSettings, SessionSettings, SharedDeclaration, StorageBackend,
    resolve_path,
};
use tracing::{debug, info, warn};

use crate::errors::HostError;
use crate::notifications::Notification;
use crate::routes::{RouteTable, RouteTarget, normalize_route};

/// Outcome of navigating to a route.
#[derive(Debug)]
pub enum Navigation {
    /// Rendered by the host itself.
    Local {
        /// Normalized route.
        route: String,
    },
    /// The fragment owning the route loaded.
    Fragment {
        /// Normalized route.
        route: String,
        /// The evaluated module.
        module: Arc<FragmentModule>,
    },
    /// The fragment owning the route failed to load; the host renders a
    /// fallback and keeps running.
    Unavailable {
        /// Normalized route.
        route: String,
        /// Why the load failed.
        error: LoadError,
    },
    /// No such route.
    NotFound {
        /// Normalized route.
        route: String,
    },
}

impl Navigation {
    /// The normalized route navigated to.
    pub fn route(&self) -> &str {
        match self {
            Self::Local { route }
            | Self::Fragment { route, .. }
            | Self::Unavailable { route, .. }
            | Self::NotFound { route } => route,
        }
    }
}

/// The host shell.
pub struct Host {
    settings: HostSettings,
    context: HostContext,
    loader: FragmentLoader,
    api: ApiClient,
    identity: IdentityClient,
    routes: RouteTable,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("name", &self.settings.name)
            .field("bus", self.context.bus())
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Assemble the host from settings.
    pub fn build(settings: HostSettings) -> Result<Self, HostError> {
        let storage = open_storage(&settings.session)?;
        let session = Arc::new(SessionStore::new(storage));
        Self::with_session(settings, session)
    }

    /// Assemble the host around an existing session store.
    pub fn with_session(
        settings: HostSettings,
        session: Arc<SessionStore>,
    ) -> Result<Self, HostError> {
        let shared = Arc::new(SharedScope::new());
        provide_shared(&shared, &settings.fragments.shared)?;

        let context = HostContext::new(Arc::clone(&session), BusClient::new(), shared);
        let loader = FragmentLoader::new(
            context.clone(),
            Duration::from_millis(settings.fragments.fetch_timeout_ms),
        )?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.api.timeout_ms))
            .build()?;
        let api = ApiClient::with_client(
            http.clone(),
            settings.api.gateway_url.clone(),
            Arc::clone(&session),
        );
        let identity = IdentityClient::new(
            http,
            settings.identity.token_url.clone(),
            settings.identity.client_id.clone(),
            session,
        );
        let routes = RouteTable::from_settings(&settings.fragments.routes);

        info!(
            name = %settings.name,
            routes = routes.len(),
            shared = context.shared().len(),
            "host assembled"
        );
        Ok(Self {
            settings,
            context,
            loader,
            api,
            identity,
            routes,
        })
    }

    /// Connect the bus to the configured broker. Returns `false` if it is
    /// already connected or connecting.
    pub fn start(&self) -> bool {
        let broker = &self.settings.broker;
        let started = self
            .bus()
            .activate(broker.endpoint.clone(), reconnect_policy(&broker.reconnect));
        if started {
            info!(endpoint = %broker.endpoint, "bus activated");
        }
        started
    }

    /// Disconnect the bus.
    pub async fn shutdown(&self) {
        self.bus().deactivate().await;
        info!("host stopped");
    }

    /// Subscribe to every configured broker topic, passing each message to
    /// `sink` as a rendered notification.
    pub fn listen_notifications<F>(&self, sink: F) -> Vec<SubscriptionHandle>
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        let sink = Arc::new(sink);
        self.settings
            .broker
            .topics
            .iter()
            .map(|topic| {
                let sink = Arc::clone(&sink);
                self.bus()
                    .subscribe(topic.clone(), move |msg| sink(Notification::from_message(msg)))
            })
            .collect()
    }

    /// Navigate to `route`, loading its fragment if it has one.
    ///
    /// A failing fragment yields [`Navigation::Unavailable`]; it never
    /// affects the host or other fragments.
    pub async fn navigate(&self, route: &str) -> Navigation {
        let route = normalize_route(route).to_string();
        match self.routes.resolve(&route) {
            Some(RouteTarget::Local) => Navigation::Local { route },
            Some(RouteTarget::Fragment(fragment)) => match self.loader.load(&fragment).await {
                Ok(module) => {
                    debug!(route = %route, fragment = %module.fragment, "navigated to fragment");
                    Navigation::Fragment { route, module }
                }
                Err(error) => {
                    warn!(route = %route, kind = error.kind(), error = %error, "fragment unavailable");
                    Navigation::Unavailable { route, error }
                }
            },
            None => Navigation::NotFound { route },
        }
    }

    /// Loaded settings.
    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Singletons shared with every fragment.
    pub fn context(&self) -> &HostContext {
        &self.context
    }

    /// The session store.
    pub fn session(&self) -> &Arc<SessionStore> {
        self.context.session()
    }

    /// The bus client.
    pub fn bus(&self) -> &BusClient {
        self.context.bus()
    }

    /// The fragment loader.
    pub fn loader(&self) -> &FragmentLoader {
        &self.loader
    }

    /// REST gateway client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Identity provider client.
    pub fn identity(&self) -> &IdentityClient {
        &self.identity
    }

    /// Route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

/// Open the configured session storage backend.
pub fn open_storage(settings: &SessionSettings) -> Result<Arc<dyn DurableStorage>, HostError> {
    let storage: Arc<dyn DurableStorage> = match settings.backend {
        StorageBackend::File => Arc::new(JsonFileStorage::new(resolve_path(&settings.path))),
        StorageBackend::Sqlite => Arc::new(SqliteStorage::open(&resolve_path(&settings.path))?),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };
    debug!(backend = ?settings.backend, path = %settings.path, "session storage opened");
    Ok(storage)
}

/// Reconnect policy from the `broker.reconnect` settings section.
pub fn reconnect_policy(settings: &ReconnectSettings) -> ReconnectPolicy {
    let policy = ReconnectPolicy::default()
        .with_delay(Duration::from_millis(settings.delay_ms))
        .with_connect_timeout(Duration::from_millis(settings.connect_timeout_ms));
    match settings.max_attempts {
        Some(max) => policy.with_max_attempts(max),
        None => policy,
    }
}

/// Register the host's own shared dependencies in `scope`.
pub fn provide_shared(
    scope: &SharedScope,
    declarations: &BTreeMap<String, SharedDeclaration>,
) -> Result<(), HostError> {
    for (name, declaration) in declarations {
        let version = Version::parse(&declaration.version).map_err(|source| {
            HostError::InvalidSharedVersion {
                name: name.clone(),
                version: declaration.version.clone(),
                source,
            }
        })?;
        let _ = scope.provide(name, version, declaration.strict_version);
    }
    Ok(())
}
