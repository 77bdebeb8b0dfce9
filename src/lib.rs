//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `offline-player` and enable
//! the documented features without wiring each crate individually.
//!
//! With the default `desktop-shims` feature the [`core_service`] facade is
//! re-exported together with the reqwest-backed HTTP bridge.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreService, CoreError};
