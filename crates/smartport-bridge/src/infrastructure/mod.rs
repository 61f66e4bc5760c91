//! Infrastructure layer for the bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `smartport_core`; the application layer only reaches into it from tests.
//!
//! # Sub-modules
//!
//! - **`network`** – The production [`crate::application::transport::Connector`]:
//!   a TCP stream carrying SLIP frames, plus name resolution.  Also hosts the
//!   `ScriptedConnector` test double.
//!
//! - **`storage`** – TOML configuration loading with defaults.

pub mod network;
pub mod storage;
