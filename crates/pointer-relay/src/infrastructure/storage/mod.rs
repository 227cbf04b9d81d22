//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML file from the platform config
//! directory (or an explicit path), supplies defaults on first run, and
//! writes changes back.

pub mod config;
