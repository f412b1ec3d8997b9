//! # switchyard-core
//!
//! Shared building blocks for the Switchyard crates:
//!
//! - **Signals**: [`Signal`] is the observable value behind the session
//!   "authenticated" flag and the bus connection state. Observers are called
//!   synchronously, in subscription order, on every change.
//! - **Logging**: [`logging::init_subscriber`] installs the `tracing`
//!   subscriber used by the host binary.

#![deny(unsafe_code)]

pub mod logging;
pub mod signal;

pub use signal::{Observation, Signal};
