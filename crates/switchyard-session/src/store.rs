//! The process-wide session store.
//!
//! One [`SessionStore`] is constructed by the host and shared (as
//! `Arc<SessionStore>`) with every fragment. It holds the bearer credential
//! and the identity (display name), mirrors both into [`DurableStorage`], and
//! publishes an "authenticated" [`Signal`].
//!
//! Memory is authoritative only while it holds a session this instance
//! established. Otherwise reads go to durable storage, so a store sees a
//! session written by another instance, whether it was constructed before
//! that write or logged out since.

use std::fmt;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use switchyard_core::{Observation, Signal};
use tracing::{info, warn};

use crate::storage::{DurableStorage, MemoryStorage};

/// Storage key for the bearer credential.
pub const CREDENTIAL_KEY: &str = "log_token";
/// Storage key for the identity.
pub const IDENTITY_KEY: &str = "log_username";

/// Credential and identity, set and cleared together.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token.
    pub credential: Option<String>,
    /// Display name of the signed-in user.
    pub identity: Option<String>,
}

impl Session {
    /// Whether a credential is present.
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("identity", &self.identity)
            .finish()
    }
}

/// Holder of the current session, shared by host and fragments.
pub struct SessionStore {
    storage: Arc<dyn DurableStorage>,
    /// `Some` while this instance holds a session; `None` defers to storage.
    memory: RwLock<Option<Session>>,
    authenticated: Signal<bool>,
    /// Serializes notifications with observer registration.
    notify: ReentrantMutex<()>,
}

impl SessionStore {
    /// Create a store over `storage`, hydrating the authenticated flag from it.
    pub fn new(storage: Arc<dyn DurableStorage>) -> Self {
        let hydrated = read_durable(storage.as_ref());
        if let Some(identity) = &hydrated.identity {
            info!(identity = %identity, "session hydrated from durable storage");
        }
        Self {
            storage,
            memory: RwLock::new(None),
            authenticated: Signal::new(hydrated.is_authenticated()),
            notify: ReentrantMutex::new(()),
        }
    }

    /// Store backed by fresh in-memory storage.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Durable storage shared with other store instances.
    pub fn storage(&self) -> &Arc<dyn DurableStorage> {
        &self.storage
    }

    /// Set credential and identity, persist them, and notify observers with `true`.
    ///
    /// Calling again overwrites the session and notifies again.
    pub fn establish(&self, credential: impl Into<String>, identity: impl Into<String>) {
        let credential = credential.into();
        let identity = identity.into();
        let _notify = self.notify.lock();

        *self.memory.write() = Some(Session {
            credential: Some(credential.clone()),
            identity: Some(identity.clone()),
        });
        let _ = self.persist(CREDENTIAL_KEY, Some(&credential));
        let _ = self.persist(IDENTITY_KEY, Some(&identity));

        info!(identity = %identity, "session established");
        self.authenticated.set(true);
    }

    /// Remove credential and identity, and notify observers with `false`.
    ///
    /// Idempotent; every call notifies.
    ///
    /// Afterwards reads fall back to durable storage again, unless removing
    /// the keys from it failed.
    pub fn clear(&self) {
        let _notify = self.notify.lock();
        let credential_removed = self.persist(CREDENTIAL_KEY, None);
        let identity_removed = self.persist(IDENTITY_KEY, None);
        *self.memory.write() = if credential_removed && identity_removed {
            None
        } else {
            Some(Session::default())
        };

        info!("session cleared");
        self.authenticated.set(false);
    }

    /// Current bearer credential.
    pub fn current_credential(&self) -> Option<String> {
        if let Some(session) = self.memory.read().as_ref() {
            return session.credential.clone();
        }
        self.read_key(CREDENTIAL_KEY)
    }

    /// Current identity.
    pub fn current_identity(&self) -> Option<String> {
        if let Some(session) = self.memory.read().as_ref() {
            return session.identity.clone();
        }
        self.read_key(IDENTITY_KEY)
    }

    /// Both values at once.
    pub fn snapshot(&self) -> Session {
        if let Some(session) = self.memory.read().as_ref() {
            return session.clone();
        }
        read_durable(self.storage.as_ref())
    }

    /// Whether a credential is currently present.
    pub fn is_authenticated(&self) -> bool {
        self.current_credential().is_some()
    }

    /// Observe the authenticated flag.
    ///
    /// `observer` is called immediately with the current state (as read from
    /// memory or durable storage), then synchronously on every
    /// [`establish`](Self::establish) / [`clear`](Self::clear), in
    /// subscription order.
    pub fn observe_authenticated<F>(&self, observer: F) -> Observation
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let _notify = self.notify.lock();
        let observer = Arc::new(observer);
        let forward = Arc::clone(&observer);
        let observation = self.authenticated.observe(move |value| forward(*value));
        observer(self.is_authenticated());
        observation
    }

    /// The underlying signal, for async consumers (`watch`, `wait_for`).
    pub fn authenticated_signal(&self) -> &Signal<bool> {
        &self.authenticated
    }

    fn read_key(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "durable storage read failed");
                None
            }
        }
    }

    fn persist(&self, key: &str, value: Option<&str>) -> bool {
        let result = match value {
            Some(v) => self.storage.set(key, v),
            None => self.storage.remove(key),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "durable storage write failed; keeping in-memory session");
                false
            }
        }
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.snapshot())
            .finish_non_exhaustive()
    }
}

fn read_durable(storage: &dyn DurableStorage) -> Session {
    let read = |key: &str| match storage.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "durable storage read failed");
            None
        }
    };
    let credential = read(CREDENTIAL_KEY);
    let identity = if credential.is_some() {
        read(IDENTITY_KEY)
    } else {
        None
    };
    Session {
        credential,
        identity,
    }
}
