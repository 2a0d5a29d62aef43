//! `pushrelay` -- forwards Pushbullet notifications to a Discord webhook.
//!
//! Connects to the Pushbullet realtime event stream and posts every
//! mirrored notification as a Discord embed. Runs until SIGINT/SIGTERM or
//! until the stream connection ends; reconnection is left to whatever
//! supervises the process.
//!
//! # Environment variables
//!
//! | Variable                     | Required | Default | Description                        |
//! |------------------------------|----------|---------|------------------------------------|
//! | `PUSHBULLET_TOKEN`           | yes      | --      | Pushbullet access token            |
//! | `DISCORD_WEBHOOK`            | yes      | --      | Discord webhook URL                |
//! | `PUSHBULLET_STREAM_ENDPOINT` | no       | public  | Override the stream endpoint       |
//! | `WEBHOOK_TIMEOUT_SECS`       | no       | `30`    | Webhook request timeout            |
//! | `DISPATCH_MAX_IN_FLIGHT`     | no       | --      | Cap on concurrently running handlers |

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pushrelay::config::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "pushrelay=info,pushrelay_stream=info,pushrelay_delivery=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Ok(());
        }
    };
    tracing::info!(?config, "Loaded relay configuration");

    // --- Stream client ---
    let client = pushrelay::build_client(&config).await?;
    if let Err(e) = client.open(false).await {
        tracing::error!(error = %e, "Could not open event stream");
        return Ok(());
    }

    tokio::select! {
        () = shutdown_signal() => {
            client.close().await;
            client.drain().await;
            tracing::info!("Graceful shutdown complete");
        }
        () = client.wait() => {
            tracing::warn!("Event stream ended, exiting");
            client.drain().await;
        }
    }

    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
