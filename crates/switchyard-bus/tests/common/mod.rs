//! In-process STOMP broker and helpers for bus tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use switchyard_bus::{BusClient, Command, ConnectionState, Frame, ReconnectPolicy};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TIMEOUT: Duration = Duration::from_secs(5);

enum Outbound {
    Frame(Frame),
    Drop,
}

struct Subscription {
    conn: u64,
    id: String,
    destination: String,
}

#[derive(Default)]
struct BrokerState {
    next_conn: AtomicU64,
    next_message: AtomicU64,
    reject_connect: AtomicBool,
    connections: Mutex<HashMap<u64, mpsc::UnboundedSender<Outbound>>>,
    subscriptions: Mutex<Vec<Subscription>>,
    subscribe_log: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, String)>>,
    disconnects: AtomicU64,
}

impl BrokerState {
    fn deliver(&self, destination: &str, body: &str) {
        let targets: Vec<(u64, String)> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.destination == destination)
            .map(|s| (s.conn, s.id.clone()))
            .collect();
        let connections = self.connections.lock();
        for (conn, id) in targets {
            let message_id = self.next_message.fetch_add(1, Ordering::Relaxed).to_string();
            if let Some(tx) = connections.get(&conn) {
                let _ = tx.send(Outbound::Frame(Frame::message(
                    destination,
                    &id,
                    &message_id,
                    body,
                )));
            }
        }
    }
}

/// STOMP broker on `127.0.0.1` with a random port.
pub struct TestBroker {
    addr: SocketAddr,
    state: Arc<BrokerState>,
    accept: JoinHandle<()>,
}

impl TestBroker {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(BrokerState::default());
        let accept_state = Arc::clone(&state);
        let accept = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let _ = tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });
        Self {
            addr,
            state,
            accept,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Deliver `body` to every subscriber of `destination`.
    pub fn publish(&self, destination: &str, body: &str) {
        self.state.deliver(destination, body);
    }

    /// Close every client socket without a STOMP goodbye.
    pub fn drop_connections(&self) {
        for tx in self.state.connections.lock().values() {
            let _ = tx.send(Outbound::Drop);
        }
    }

    /// Answer CONNECT with ERROR while set.
    pub fn reject_connects(&self, reject: bool) {
        self.state.reject_connect.store(reject, Ordering::SeqCst);
    }

    pub fn subscription_count(&self, destination: &str) -> usize {
        self.state
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.destination == destination)
            .count()
    }

    /// Destinations of every SUBSCRIBE received, in order.
    pub fn subscribe_log(&self) -> Vec<String> {
        self.state.subscribe_log.lock().clone()
    }

    /// `(destination, body)` of every SEND received.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.state.sent.lock().clone()
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.lock().len()
    }

    pub fn disconnect_count(&self) -> u64 {
        self.state.disconnects.load(Ordering::SeqCst)
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.accept.abort();
        self.drop_connections();
    }
}

async fn serve(stream: TcpStream, state: Arc<BrokerState>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let conn = state.next_conn.fetch_add(1, Ordering::Relaxed);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _ = state.connections.lock().insert(conn, tx);
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            out = rx.recv() => match out {
                Some(Outbound::Frame(frame)) => {
                    if sink.send(Message::Text(frame.encode().into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Drop) | None => break,
            },
            msg = source.next() => {
                let Some(Ok(Message::Text(text))) = msg else { break };
                let Ok(Some(frame)) = Frame::parse(text.as_str()) else { continue };
                match frame.command {
                    Command::Connect | Command::Stomp => {
                        let reply = if state.reject_connect.load(Ordering::SeqCst) {
                            Frame::error("access refused")
                        } else {
                            Frame::connected()
                        };
                        if sink.send(Message::Text(reply.encode().into())).await.is_err() {
                            break;
                        }
                    }
                    Command::Subscribe => {
                        let id = frame.header("id").unwrap_or_default().to_string();
                        let destination = frame.header("destination").unwrap_or_default().to_string();
                        state.subscribe_log.lock().push(destination.clone());
                        state.subscriptions.lock().push(Subscription { conn, id, destination });
                    }
                    Command::Unsubscribe => {
                        let id = frame.header("id").unwrap_or_default();
                        state.subscriptions.lock().retain(|s| !(s.conn == conn && s.id == id));
                    }
                    Command::Send => {
                        let destination = frame.header("destination").unwrap_or_default().to_string();
                        state.sent.lock().push((destination.clone(), frame.body.clone()));
                        state.deliver(&destination, &frame.body);
                    }
                    Command::Disconnect => {
                        let _ = state.disconnects.fetch_add(1, Ordering::SeqCst);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let _ = state.connections.lock().remove(&conn);
    state.subscriptions.lock().retain(|s| s.conn != conn);
}

/// Short delays so reconnect tests run quickly.
pub fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy::default()
        .with_delay(Duration::from_millis(20))
        .with_connect_timeout(Duration::from_secs(2))
}

/// Record every connection state the client passes through.
pub fn record_states(client: &BusClient) -> Arc<Mutex<Vec<ConnectionState>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);
    // the observation stays registered for the client's lifetime
    let _ = client
        .connection_state()
        .observe(move |state| sink.lock().push(*state));
    states
}

/// Poll `condition` until it holds, panicking after [`TIMEOUT`].
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// A local port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
