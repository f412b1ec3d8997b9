//! # switchyard-bus
//!
//! One reconnecting STOMP 1.2 connection over WebSocket, shared by the host
//! and every fragment.
//!
//! - [`BusClient`]: activate / subscribe / publish / deactivate
//! - [`ConnectionState`]: `Connecting`, `Open`, `Reconnecting`, `Closed`,
//!   observable through [`BusClient::connection_state`]
//! - [`ReconnectPolicy`]: fixed retry delay, optional attempt cap, connect timeout
//! - [`frame`]: the STOMP frame codec
//!
//! The client keeps one broker subscription per topic and fans each message
//! out to every local handler on that topic. Bodies that parse as JSON are
//! delivered as [`MessageBody::Structured`], everything else as
//! [`MessageBody::Raw`].

#![deny(unsafe_code)]

pub mod client;
mod connection;
pub mod errors;
pub mod frame;
pub mod message;
pub mod policy;
mod registry;
pub mod state;

pub use client::{BusClient, SubscriptionHandle, TopicWatch};
pub use errors::{BusError, FrameError};
pub use frame::{Command, Frame};
pub use message::{BusMessage, MessageBody};
pub use policy::ReconnectPolicy;
pub use registry::Handler;
pub use state::ConnectionState;
