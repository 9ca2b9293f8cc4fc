//! Application command handlers for voicegate.
//!
//! # Commands
//! - `shell`: The interactive login and registration screens
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod shell;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use shell::{handle_login, handle_register};
