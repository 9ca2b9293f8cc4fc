//! Opens the interactive shell on the login or registration view.

use crate::auth::AuthClient;
use crate::config::{AudioConfig, VoicegateConfig};
use crate::recording::{CaptureConstraints, Microphone};
use crate::ui::{ErrorScreen, Shell, ViewKind};
use std::sync::Arc;

/// Opens the shell on the login view.
pub async fn handle_login() -> Result<(), anyhow::Error> {
    run_shell(ViewKind::Login, None).await
}

/// Opens the shell on the registration view, optionally pre-filling the username.
pub async fn handle_register(username: Option<String>) -> Result<(), anyhow::Error> {
    run_shell(ViewKind::Register, username).await
}

async fn run_shell(initial: ViewKind, username: Option<String>) -> Result<(), anyhow::Error> {
    tracing::info!("=== voicegate started ===");

    let config_data = match VoicegateConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err:#}");
            let message = format!(
                "{err:#}\n\nPlease check your ~/.config/voicegate/voicegate.toml file and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error("Configuration Error", &message)?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    tracing::info!(
        "Configuration loaded: server={}, device={}, sample_rate={}Hz, bitrate={}",
        config_data.server.base_url,
        config_data.audio.device,
        config_data.audio.sample_rate,
        config_data.audio.bitrate
    );

    let device = Arc::new(Microphone::new(config_data.audio.device.clone()));
    let client = AuthClient::from_config(&config_data.server);

    let mut shell = Shell::new(
        device,
        capture_constraints(&config_data.audio),
        client,
        config_data.audio.min_registration_secs,
        initial,
        username,
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    shell.run().await
}

fn capture_constraints(audio: &AudioConfig) -> CaptureConstraints {
    CaptureConstraints::voice()
        .with_sample_rate(audio.sample_rate)
        .with_bitrate(audio.bitrate)
}
