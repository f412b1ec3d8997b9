//! # switchyard-loader
//!
//! Resolves a [`FragmentRef`] (remote entry URL + exposed name) to an
//! evaluated [`FragmentModule`] at runtime.
//!
//! - [`descriptor`]: remote entry descriptor format
//! - [`SharedScope`]: one loaded copy per shared singleton dependency
//! - [`ModuleEvaluator`]: turns fetched module sources into exports
//! - [`HostContext`]: the session store, bus client, and shared scope every
//!   module receives
//! - [`LoadError`]: network, remote entry not found, version conflict,
//!   exposed module not found, malformed, evaluation

#![deny(unsafe_code)]

pub mod context;
pub mod descriptor;
pub mod errors;
pub mod evaluator;
pub mod fragment;
pub mod loader;
pub mod shared;

pub use context::HostContext;
pub use descriptor::{ExposedModule, RemoteEntry, SharedRequirement};
pub use errors::LoadError;
pub use evaluator::{Exports, ManifestEvaluator, ModuleEvaluator, ModuleSource};
pub use fragment::FragmentRef;
pub use loader::{DEFAULT_FETCH_TIMEOUT, FragmentLoader, FragmentModule};
pub use shared::{HOST_PROVIDER, Resolution, SharedEntry, SharedScope};
