//! # switchyard-host
//!
//! The host shell. [`Host`] is the composition root: it owns the session
//! store, the bus client, the shared scope, and the fragment loader, and hands
//! the same instances to every fragment through a
//! [`HostContext`](switchyard_loader::HostContext).
//!
//! - **Navigation**: routes map to local views or fragments;
//!   [`Host::navigate`] turns a fragment load failure into
//!   [`Navigation::Unavailable`].
//! - **Notifications**: broker updates render as toast text.

#![deny(unsafe_code)]

pub mod errors;
pub mod host;
pub mod notifications;
pub mod routes;

pub use errors::HostError;
pub use host::{Host, Navigation, open_storage, provide_shared, reconnect_policy};
pub use notifications::{Notification, NotificationFeed, render};
pub use routes::{RouteTable, RouteTarget};
