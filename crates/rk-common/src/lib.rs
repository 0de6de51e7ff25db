//! Rankkeeper Common
//!
//! Runtime helpers shared by the rankkeeper binaries.

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
