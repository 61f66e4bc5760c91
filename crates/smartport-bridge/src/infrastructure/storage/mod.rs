//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module reads the TOML configuration from the platform
//! config directory (or an explicit path) and fills in defaults for anything
//! the file leaves out, including the case where there is no file at all.

pub mod config;
