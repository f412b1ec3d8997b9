//! The host context handed to every fragment.

use std::sync::Arc;

use switchyard_bus::BusClient;
use switchyard_session::SessionStore;

use crate::shared::SharedScope;

/// The process-wide singletons a fragment may use.
///
/// Constructed once by the host and cloned into every evaluated module, so
/// host and fragments always hold the same session store, bus connection,
/// and shared scope.
#[derive(Clone, Debug)]
pub struct HostContext {
    session: Arc<SessionStore>,
    bus: BusClient,
    shared: Arc<SharedScope>,
}

impl HostContext {
    /// Bundle the singletons.
    pub fn new(session: Arc<SessionStore>, bus: BusClient, shared: Arc<SharedScope>) -> Self {
        Self {
            session,
            bus,
            shared,
        }
    }

    /// The session store.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The bus client.
    pub fn bus(&self) -> &BusClient {
        &self.bus
    }

    /// The shared dependency scope.
    pub fn shared(&self) -> &Arc<SharedScope> {
        &self.shared
    }

    /// Whether both contexts refer to the same session store, bus connection,
    /// and shared scope.
    pub fn same_singletons(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
            && self.bus.same_connection(&other.bus)
            && Arc::ptr_eq(&self.shared, &other.shared)
    }
}
