//! Configuration management for voicegate.
//!
//! Loads the TOML file describing where the verification service lives and
//! how audio is captured. Every field has a default, so a missing or partial
//! file still yields a working configuration.

pub mod file;

pub use file::{config_path, AudioConfig, ServerConfig, VoicegateConfig};
