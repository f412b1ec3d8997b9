//! Connection state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of the single broker connection.
///
/// `Closed` → `Connecting` on activate; `Open` once the broker acknowledges
/// the handshake; `Reconnecting` after every failed attempt or dropped
/// connection; `Closed` again on deactivate or when the retry cap is hit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// First attempt in progress.
    Connecting,
    /// Handshake complete; subscriptions are live.
    Open,
    /// Waiting to retry after a failure.
    Reconnecting,
    /// Not active.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Whether messages can flow.
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
