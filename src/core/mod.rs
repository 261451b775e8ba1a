//! Core domain: the registry capability, its desktop-entry backend, and the
//! line protocol.
//!
//! Nothing in this module touches stdin/stdout or the async runtime.

pub mod desktop;
pub mod locale;
pub mod protocol;
pub mod registry;
