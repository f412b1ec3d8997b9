//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file only needs the keys it overrides. Each type's [`Default`] holds the
//! production default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root settings for the Switchyard host.
///
/// ```json
/// {
///   "broker": { "endpoint": "ws://gateway:8080/ws", "reconnect": { "delayMs": 500 } },
///   "fragments": { "routes": { "fleet": { "remoteEntry": "http://shop:4201/remoteEntry.json",
///                                          "exposedModule": "./FleetComponent" } } }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Realtime broker connection.
    pub broker: BrokerSettings,
    /// Session persistence.
    pub session: SessionSettings,
    /// Identity provider (token endpoint).
    pub identity: IdentitySettings,
    /// Backend REST gateway.
    pub api: ApiSettings,
    /// Fragment loading and routing.
    pub fragments: FragmentSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "switchyard".to_string(),
            broker: BrokerSettings::default(),
            session: SessionSettings::default(),
            identity: IdentitySettings::default(),
            api: ApiSettings::default(),
            fragments: FragmentSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Realtime broker settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// WebSocket URL of the STOMP broker.
    pub endpoint: String,
    /// Reconnect policy.
    pub reconnect: ReconnectSettings,
    /// Topics the host itself listens to.
    pub topics: Vec<String>,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080/ws".to_string(),
            reconnect: ReconnectSettings::default(),
            topics: vec!["/topic/shipments".to_string()],
        }
    }
}

/// Fixed-delay reconnect policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Delay between attempts in milliseconds.
    pub delay_ms: u64,
    /// Give up after this many consecutive failed attempts (`None` = never).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Per-attempt connect (and STOMP handshake) timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_ms: 200,
            max_attempts: None,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Durable storage backend for the session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file with `0o600` permissions.
    #[default]
    File,
    /// `SQLite` key/value table.
    Sqlite,
    /// In-memory only (nothing survives the process).
    Memory,
}

/// Session persistence settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Storage backend.
    pub backend: StorageBackend,
    /// Storage path (relative paths resolve against `~/.switchyard`).
    pub path: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            path: "session.json".to_string(),
        }
    }
}

/// Identity provider settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentitySettings {
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// OAuth2 client ID.
    pub client_id: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            token_url: "http://localhost:8180/realms/logistics-realm/protocol/openid-connect/token"
                .to_string(),
            client_id: "logistics-client".to_string(),
        }
    }
}

/// Backend REST gateway settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Gateway base URL.
    pub gateway_url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// A shared dependency the host provides to every fragment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDeclaration {
    /// Exact version the host has loaded.
    pub version: String,
    /// Recorded on the scope entry. Host dependencies are singletons, so a
    /// fragment whose requirement does not match fails to load either way.
    #[serde(default)]
    pub strict_version: bool,
}

/// A route owned by a fragment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSettings {
    /// URL of the fragment's remote entry descriptor.
    pub remote_entry: String,
    /// Exposed module name within the descriptor.
    pub exposed_module: String,
}

/// Fragment loading settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FragmentSettings {
    /// HTTP timeout for descriptor and module fetches, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Shared dependencies the host provides, by name.
    pub shared: BTreeMap<String, SharedDeclaration>,
    /// Route path → fragment.
    pub routes: BTreeMap<String, RouteSettings>,
}

impl Default for FragmentSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
            shared: BTreeMap::new(),
            routes: BTreeMap::new(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`RUST_LOG` syntax).
    pub level: String,
    /// Emit JSON lines instead of the compact format.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
