//! Configuration management module
//!
//! Provides TOML-based configuration following Wings patterns.

mod config;

pub use config::*;
