//! voicegate: voice-biometric login and enrollment from the terminal.

mod app;
mod auth;
mod commands;
mod config;
mod error;
mod logging;
mod recording;
#[cfg(test)]
mod testing;
mod ui;
mod views;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("voicegate exited with error: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
