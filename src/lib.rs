pub mod app;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod detector;
pub mod engine;
pub mod error;
pub mod gaps;
pub mod monitor;
pub mod predict;
pub mod skill;

pub use error::{CgError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
