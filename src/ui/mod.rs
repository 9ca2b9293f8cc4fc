//! Terminal rendering: the view shell, the heartbeat trace and the error screen.

pub mod error;
pub mod shell;
pub mod visualizer;

pub use error::ErrorScreen;
pub use shell::{Shell, ViewKind};
pub use visualizer::HeartbeatVisualizer;
