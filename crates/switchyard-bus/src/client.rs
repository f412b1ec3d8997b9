//! Bus client handle.
//!
//! [`BusClient`] is cheap to clone; every clone drives the same connection
//! task and registry. Subscriptions can be registered at any time: while the
//! connection is not OPEN they are queued and issued on the next OPEN, and
//! after every reconnect they are re-issued in registration order.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use switchyard_core::Signal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::connection::{self, Command, Shared};
use crate::errors::BusError;
use crate::message::BusMessage;
use crate::policy::ReconnectPolicy;
use crate::registry::{Handler, Registry};
use crate::state::ConnectionState;

struct Link {
    endpoint: String,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

struct Inner {
    shared: Arc<Shared>,
    link: Mutex<Option<Link>>,
}

impl Inner {
    fn send(&self, command: Command) -> Result<(), BusError> {
        let link = self.link.lock();
        let link = link.as_ref().ok_or(BusError::NotConnected)?;
        link.commands.send(command).map_err(|_| BusError::Closed)
    }

    fn reconcile(&self) {
        // not active: the registry is applied when the next session opens
        let _ = self.send(Command::Reconcile);
    }
}

/// Client for the realtime bus.
#[derive(Clone)]
pub struct BusClient {
    inner: Arc<Inner>,
}

impl Default for BusClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BusClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusClient")
            .field("state", &self.state())
            .field("subscriptions", &self.subscription_count())
            .finish_non_exhaustive()
    }
}

impl BusClient {
    /// Inactive client in state `Closed`.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    registry: Mutex::new(Registry::default()),
                    state: Signal::new(ConnectionState::Closed),
                }),
                link: Mutex::new(None),
            }),
        }
    }

    /// Start the connection task for `endpoint`.
    ///
    /// Returns `false` (and does nothing) when a connection task is already
    /// running. Must be called within a Tokio runtime.
    pub fn activate(&self, endpoint: impl Into<String>, policy: ReconnectPolicy) -> bool {
        let mut link = self.inner.link.lock();
        if let Some(current) = link.as_ref() {
            if !current.task.is_finished() {
                debug!(endpoint = %current.endpoint, "bus already active");
                return false;
            }
        }

        let endpoint = endpoint.into();
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(connection::run(
            endpoint.clone(),
            policy,
            Arc::clone(&self.inner.shared),
            rx,
        ));
        *link = Some(Link {
            endpoint,
            commands,
            task,
        });
        true
    }

    /// Disconnect and stop the connection task. State ends `Closed`.
    ///
    /// Subscriptions stay registered and are issued again on the next
    /// [`activate`](Self::activate).
    pub async fn deactivate(&self) {
        let link = self.inner.link.lock().take();
        let Some(link) = link else { return };

        let (reply, done) = oneshot::channel();
        if link.commands.send(Command::Deactivate { reply }).is_ok() {
            let _ = done.await;
        }
        let _ = link.task.await;
    }

    /// Whether a connection task is running.
    pub fn is_active(&self) -> bool {
        self.inner
            .link
            .lock()
            .as_ref()
            .is_some_and(|link| !link.task.is_finished())
    }

    /// Register `handler` for messages on `topic`.
    ///
    /// Handlers on the same topic run in registration order, on the
    /// connection task. A panicking handler is logged and skipped.
    pub fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> SubscriptionHandle
    where
        F: Fn(&BusMessage) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let handler: Handler = Arc::new(handler);
        let id = self.inner.shared.registry.lock().insert(&topic, handler);
        debug!(topic = %topic, id, "subscription registered");
        self.inner.reconcile();

        SubscriptionHandle {
            id,
            topic,
            client: Arc::downgrade(&self.inner),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Subscribe through a channel. Dropping the watch cancels it.
    pub fn watch(&self, topic: impl Into<String>) -> TopicWatch {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.subscribe(topic, move |message: &BusMessage| {
            let _ = tx.send(message.clone());
        });
        TopicWatch { handle, rx }
    }

    /// Send `body` as text to `destination`.
    pub async fn publish(&self, destination: &str, body: impl Into<String>) -> Result<(), BusError> {
        self.publish_with(destination, "text/plain", body.into()).await
    }

    /// Serialize `payload` and send it as JSON to `destination`.
    pub async fn publish_json<T: Serialize + ?Sized>(
        &self,
        destination: &str,
        payload: &T,
    ) -> Result<(), BusError> {
        let body = serde_json::to_string(payload)?;
        self.publish_with(destination, "application/json", body).await
    }

    async fn publish_with(
        &self,
        destination: &str,
        content_type: &str,
        body: String,
    ) -> Result<(), BusError> {
        if !self.state().is_open() {
            return Err(BusError::NotConnected);
        }
        let (reply, result) = oneshot::channel();
        self.inner.send(Command::Publish {
            destination: destination.to_string(),
            content_type: content_type.to_string(),
            body,
            reply,
        })?;
        result.await.map_err(|_| BusError::Closed)?
    }

    /// Live connection state.
    pub fn connection_state(&self) -> Signal<ConnectionState> {
        self.inner.shared.state.clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state.get()
    }

    /// Number of registered local handlers.
    pub fn subscription_count(&self) -> usize {
        self.inner.shared.registry.lock().len()
    }

    /// Whether both handles drive the same connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Handle to one registered handler.
///
/// Dropping the handle does **not** cancel the subscription.
pub struct SubscriptionHandle {
    id: u64,
    topic: String,
    client: Weak<Inner>,
    cancelled: AtomicBool,
}

impl SubscriptionHandle {
    /// Topic this handler is registered on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Deregister the handler. Idempotent, and safe after the connection
    /// or the client is gone.
    ///
    /// A message already being dispatched when this is called may still be
    /// delivered to the handler once.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(inner) = self.client.upgrade() else {
            return;
        };
        let last_for_topic = inner.shared.registry.lock().remove(self.id);
        debug!(topic = %self.topic, id = self.id, "subscription cancelled");
        if last_for_topic {
            inner.reconcile();
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Channel-backed subscription.
#[derive(Debug)]
pub struct TopicWatch {
    handle: SubscriptionHandle,
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl TopicWatch {
    /// Topic being watched.
    pub fn topic(&self) -> &str {
        self.handle.topic()
    }

    /// Next message, in broker order.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }

    /// Next message if one is already buffered.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for TopicWatch {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn new_client_is_closed() {
        let client = BusClient::new();
        assert_eq!(client.state(), ConnectionState::Closed);
        assert!(!client.is_active());
    }

    #[test]
    fn clones_share_connection() {
        let client = BusClient::new();
        assert!(client.same_connection(&client.clone()));
        assert!(!client.same_connection(&BusClient::new()));
    }

    #[test]
    fn subscribe_before_activate_is_queued() {
        let client = BusClient::new();
        let handle = client.subscribe("/topic/shipments", |_| {});
        assert_eq!(client.subscription_count(), 1);
        assert_eq!(handle.topic(), "/topic/shipments");
    }

    #[test]
    fn cancel_is_idempotent() {
        let client = BusClient::new();
        let a = client.subscribe("/topic/shipments", |_| {});
        let _b = client.subscribe("/topic/shipments", |_| {});
        a.cancel();
        a.cancel();
        assert!(a.is_cancelled());
        assert_eq!(client.subscription_count(), 1);
    }

    #[test]
    fn cancel_after_client_dropped() {
        let client = BusClient::new();
        let handle = client.subscribe("/topic/shipments", |_| {});
        drop(client);
        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[test]
    fn dropping_handle_keeps_subscription() {
        let client = BusClient::new();
        drop(client.subscribe("/topic/shipments", |_| {}));
        assert_eq!(client.subscription_count(), 1);
    }

    #[test]
    fn dropping_watch_cancels() {
        let client = BusClient::new();
        let watch = client.watch("/topic/shipments");
        assert_eq!(watch.topic(), "/topic/shipments");
        assert_eq!(client.subscription_count(), 1);
        drop(watch);
        assert_eq!(client.subscription_count(), 0);
    }

    #[tokio::test]
    async fn publish_when_closed_fails() {
        let client = BusClient::new();
        assert_matches!(
            client.publish("/app/ping", "hi").await,
            Err(BusError::NotConnected)
        );
    }

    #[tokio::test]
    async fn deactivate_inactive_is_noop() {
        let client = BusClient::new();
        client.deactivate().await;
        assert_eq!(client.state(), ConnectionState::Closed);
    }
}
