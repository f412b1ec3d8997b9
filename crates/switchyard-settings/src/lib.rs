//! # switchyard-settings
//!
//! Layered configuration for the Switchyard host.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HostSettings::default()`]
//! 2. **User file**: `~/.switchyard/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SWITCHYARD_*` overrides (highest priority)
//!
//! The loaded [`HostSettings`] value is handed to
//! the host's composition root, which passes the relevant sections to each
//! component it constructs.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, home_dir, load_settings, load_settings_from_path, resolve_path, settings_path,
};
pub use types::*;
