// Microsoft documentation agent server
// Decision: Serve mode, thread persistence and credential lifetime come from the environment

use anyhow::{Context, Result};
use docagent_server::telemetry::{init_telemetry, TelemetryConfig};
use docagent_server::{build_server, ServeMode, ServerSettings};

fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to load .env file");
        }
    }

    let _telemetry_guard = init_telemetry(TelemetryConfig::from_env());
    tracing::info!("Starting...");

    let settings = ServerSettings::from_env().context("Invalid server settings")?;
    tracing::info!(
        address = %settings.bind_address(),
        serve_mode = %settings.serve_mode,
        persistence = %settings.persistence,
        credential_lifetime = %settings.credential_lifetime,
        "Server settings loaded"
    );

    match settings.serve_mode {
        ServeMode::Blocking => build_server(settings).run(),
        ServeMode::Async => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to build Tokio runtime")?;
            runtime.block_on(async move { build_server(settings).run_async().await })
        }
    }
}
