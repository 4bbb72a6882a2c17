//! Storage infrastructure: the service configuration file.
//!
//! The `config` sub-module reads `server.toml`, fills every missing field
//! with its default and converts the pointer section into the settings
//! used by the transform processors.

pub mod config;
