//! Connection task.
//!
//! One task per activation owns the WebSocket. It connects, performs the
//! STOMP handshake, issues one SUBSCRIBE per registered topic, then loops
//! over client commands and broker frames until the socket drops. After a
//! drop or failed attempt it waits the policy delay and starts over, until
//! deactivated, the client is dropped, or the retry cap is reached.

use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use switchyard_core::Signal;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::errors::BusError;
use crate::frame::{Command as FrameCommand, Frame};
use crate::message::BusMessage;
use crate::policy::ReconnectPolicy;
use crate::registry::Registry;
use crate::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// State shared between the client handle and the connection task.
pub(crate) struct Shared {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) state: Signal<ConnectionState>,
}

/// Requests from the client to the connection task.
pub(crate) enum Command {
    /// Bring broker subscriptions in line with the registry.
    Reconcile,
    /// Send a SEND frame.
    Publish {
        destination: String,
        content_type: String,
        body: String,
        reply: oneshot::Sender<Result<(), BusError>>,
    },
    /// Disconnect and stop.
    Deactivate { reply: oneshot::Sender<()> },
}

/// Why the task is stopping.
#[derive(Default)]
struct Stop {
    reply: Option<oneshot::Sender<()>>,
}

enum SessionEnd {
    Stop(Stop),
    Dropped(String),
}

/// Run the connection until deactivated, dropped, or out of attempts.
pub(crate) async fn run(
    endpoint: String,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    shared.state.set(ConnectionState::Connecting);
    let mut failures: u32 = 0;

    let stop = loop {
        let attempt = tokio::select! {
            result = handshake(&endpoint, &policy) => result,
            stop = idle(&mut commands) => break stop,
        };

        match attempt {
            Ok(ws) => {
                failures = 0;
                info!(endpoint = %endpoint, "broker connection open");
                match Session::new(&shared).run(ws, &mut commands).await {
                    SessionEnd::Stop(stop) => break stop,
                    SessionEnd::Dropped(reason) => {
                        warn!(endpoint = %endpoint, reason = %reason, "broker connection dropped");
                    }
                }
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                warn!(endpoint = %endpoint, attempt = failures, error = %e, "broker connection attempt failed");
            }
        }

        if !policy.allows_retry(failures) {
            error!(endpoint = %endpoint, attempts = failures, "giving up on broker connection");
            break Stop::default();
        }

        shared.state.set(ConnectionState::Reconnecting);
        tokio::select! {
            () = tokio::time::sleep(policy.delay) => {}
            stop = idle(&mut commands) => break stop,
        }
    };

    shared.state.set(ConnectionState::Closed);
    info!(endpoint = %endpoint, "broker connection closed");
    if let Some(reply) = stop.reply {
        let _ = reply.send(());
    }
}

/// Serve commands while there is no connection. Returns when told to stop.
async fn idle(commands: &mut mpsc::UnboundedReceiver<Command>) -> Stop {
    loop {
        match commands.recv().await {
            None => return Stop::default(),
            Some(Command::Deactivate { reply }) => return Stop { reply: Some(reply) },
            // the next session reconciles on open
            Some(Command::Reconcile) => {}
            Some(Command::Publish { reply, .. }) => {
                let _ = reply.send(Err(BusError::NotConnected));
            }
        }
    }
}

/// Connect the WebSocket and complete the STOMP handshake within the timeout.
async fn handshake(endpoint: &str, policy: &ReconnectPolicy) -> Result<WsStream, BusError> {
    match tokio::time::timeout(policy.connect_timeout, connect_stomp(endpoint)).await {
        Ok(result) => result,
        Err(_) => Err(BusError::Timeout),
    }
}

async fn connect_stomp(endpoint: &str) -> Result<WsStream, BusError> {
    let (mut ws, _) = connect_async(endpoint).await?;
    ws.send(Message::Text(Frame::connect(&host_of(endpoint)).encode().into()))
        .await?;

    while let Some(msg) = ws.next().await {
        let Some(frame) = decode(msg?)? else { continue };
        match frame.command {
            FrameCommand::Connected => {
                debug!(
                    version = frame.header("version").unwrap_or("?"),
                    "STOMP session established"
                );
                return Ok(ws);
            }
            FrameCommand::Error => return Err(BusError::Broker(error_text(&frame))),
            other => debug!(command = %other, "ignoring frame before CONNECTED"),
        }
    }
    Err(BusError::HandshakeClosed)
}

/// Decode a WebSocket message into a frame. Control messages yield `None`.
fn decode(msg: Message) -> Result<Option<Frame>, BusError> {
    match msg {
        Message::Text(text) => Ok(Frame::parse(text.as_str())?),
        Message::Binary(bytes) => Ok(Frame::parse(&String::from_utf8_lossy(&bytes))?),
        Message::Close(_) => Err(BusError::HandshakeClosed),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(None),
    }
}

fn host_of(endpoint: &str) -> String {
    endpoint
        .parse::<Uri>()
        .ok()
        .and_then(|uri| uri.host().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string())
}

fn error_text(frame: &Frame) -> String {
    match frame.header("message") {
        Some(message) if frame.body.is_empty() => message.to_string(),
        Some(message) => format!("{message}: {}", frame.body),
        None => frame.body.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// One live STOMP session.
struct Session<'a> {
    shared: &'a Shared,
    /// Topic → broker subscription id.
    active: BTreeMap<String, String>,
    /// Broker subscription id → topic.
    by_id: HashMap<String, String>,
    next_sub: u64,
}

impl<'a> Session<'a> {
    fn new(shared: &'a Shared) -> Self {
        Self {
            shared,
            active: BTreeMap::new(),
            by_id: HashMap::new(),
            next_sub: 0,
        }
    }

    async fn run(
        mut self,
        ws: WsStream,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> SessionEnd {
        let (mut sink, mut source) = ws.split();

        if let Err(e) = self.reconcile(&mut sink).await {
            return SessionEnd::Dropped(e.to_string());
        }
        self.shared.state.set(ConnectionState::Open);

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    let Some(cmd) = cmd else {
                        disconnect(&mut sink).await;
                        return SessionEnd::Stop(Stop::default());
                    };
                    if let Some(end) = self.command(cmd, &mut sink).await {
                        return end;
                    }
                }
                msg = source.next() => {
                    if let Some(end) = self.incoming(msg) {
                        return end;
                    }
                }
            }
        }
    }

    async fn command(&mut self, cmd: Command, sink: &mut WsSink) -> Option<SessionEnd> {
        match cmd {
            Command::Reconcile => match self.reconcile(sink).await {
                Ok(()) => None,
                Err(e) => Some(SessionEnd::Dropped(e.to_string())),
            },
            Command::Publish {
                destination,
                content_type,
                body,
                reply,
            } => {
                let frame = Frame::send(&destination, &content_type, body);
                match send_frame(sink, &frame).await {
                    Ok(()) => {
                        debug!(destination = %destination, "published");
                        let _ = reply.send(Ok(()));
                        None
                    }
                    Err(e) => {
                        let reason = e.to_string();
                        let _ = reply.send(Err(e));
                        Some(SessionEnd::Dropped(reason))
                    }
                }
            }
            Command::Deactivate { reply } => {
                disconnect(sink).await;
                Some(SessionEnd::Stop(Stop { reply: Some(reply) }))
            }
        }
    }

    fn incoming(
        &mut self,
        msg: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    ) -> Option<SessionEnd> {
        let msg = match msg {
            None => return Some(SessionEnd::Dropped("stream ended".to_string())),
            Some(Err(e)) => return Some(SessionEnd::Dropped(e.to_string())),
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "closed by broker".to_string(),
                    |f| f.reason.as_str().to_string(),
                );
                return Some(SessionEnd::Dropped(reason));
            }
            Some(Ok(msg)) => msg,
        };

        let frame = match decode(msg) {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "discarding undecodable frame");
                return None;
            }
        };

        match frame.command {
            FrameCommand::Message => {
                self.dispatch(&frame);
                None
            }
            FrameCommand::Error => {
                let text = error_text(&frame);
                error!(error = %text, "broker sent ERROR");
                Some(SessionEnd::Dropped(format!("broker error: {text}")))
            }
            other => {
                debug!(command = %other, "ignoring frame");
                None
            }
        }
    }

    /// Issue SUBSCRIBE for new topics (in registration order) and UNSUBSCRIBE
    /// for topics with no local handlers left.
    async fn reconcile(&mut self, sink: &mut WsSink) -> Result<(), BusError> {
        let desired = self.shared.registry.lock().topics();

        let stale: Vec<String> = self
            .active
            .keys()
            .filter(|topic| !desired.contains(topic))
            .cloned()
            .collect();
        for topic in stale {
            if let Some(id) = self.active.remove(&topic) {
                let _ = self.by_id.remove(&id);
                send_frame(sink, &Frame::unsubscribe(&id)).await?;
                debug!(topic = %topic, id = %id, "unsubscribed");
            }
        }

        for topic in desired {
            if self.active.contains_key(&topic) {
                continue;
            }
            let id = format!("sub-{}", self.next_sub);
            self.next_sub += 1;
            send_frame(sink, &Frame::subscribe(&id, &topic)).await?;
            debug!(topic = %topic, id = %id, "subscribed");
            let _ = self.by_id.insert(id.clone(), topic.clone());
            let _ = self.active.insert(topic, id);
        }
        Ok(())
    }

    fn dispatch(&self, frame: &Frame) {
        let topic = frame
            .header("subscription")
            .and_then(|id| self.by_id.get(id).cloned())
            .or_else(|| frame.header("destination").map(str::to_string));
        let Some(topic) = topic else {
            warn!("MESSAGE without subscription or destination");
            return;
        };

        let message = BusMessage::from_frame(topic.clone(), frame);
        let handlers = self.shared.registry.lock().handlers_for(&topic);
        if handlers.is_empty() {
            debug!(topic = %topic, "no handlers for message");
        }
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&message))).is_err() {
                error!(topic = %topic, "subscription handler panicked");
            }
        }
    }
}

async fn send_frame(sink: &mut WsSink, frame: &Frame) -> Result<(), BusError> {
    sink.send(Message::Text(frame.encode().into())).await?;
    Ok(())
}

async fn disconnect(sink: &mut WsSink) {
    if let Err(e) = send_frame(sink, &Frame::disconnect()).await {
        debug!(error = %e, "DISCONNECT not delivered");
    }
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_from_endpoint() {
        assert_eq!(host_of("ws://localhost:8080/ws"), "localhost");
        assert_eq!(host_of("wss://broker.example.com/stomp"), "broker.example.com");
        assert_eq!(host_of("not a url"), "localhost");
    }

    #[test]
    fn error_text_combines_header_and_body() {
        let frame = Frame::error("bad destination").with_body("/topic/x");
        assert_eq!(error_text(&frame), "bad destination: /topic/x");
        assert_eq!(error_text(&Frame::error("denied")), "denied");
    }

    #[test]
    fn close_message_is_an_error() {
        assert!(decode(Message::Close(None)).is_err());
        assert!(decode(Message::Ping(Vec::new().into())).unwrap().is_none());
    }

    #[test]
    fn text_message_decodes() {
        let frame = decode(Message::Text("RECEIPT\nreceipt-id:1\n\n\0".into()))
            .unwrap()
            .unwrap();
        assert_eq!(frame.command, FrameCommand::Receipt);
    }
}
