//! Terminal client for the voice-enabled analytical dialogue service.
//!
//! Wires a TCP transport session and the conversation controller to a
//! stdin/stdout surface. Typed lines become conversation turns; a handful
//! of `:commands` drive the session lifecycle.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use vui_config::{load_settings, Settings};
use vui_controller::ConversationController;
use vui_session::{TcpConnector, TransportSession};

mod render;
mod voice;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("VUI_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!("Warning: failed to load config: {}. Using defaults.", e);
            Settings::default()
        }
    };

    init_tracing(&settings);
    tracing::info!("Starting VUI client v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        endpoint = %settings.connection.endpoint,
        locale = %settings.connection.locale,
        "Configuration loaded"
    );

    let session = TransportSession::new(TcpConnector::new());
    session.configure(&settings.connection.endpoint, &settings.connection.locale)?;

    let controller = ConversationController::new(
        session.clone(),
        Arc::new(voice::NullRecognizer::new()),
        Arc::new(voice::ConsoleSynthesizer::new()),
        settings.voice_config(),
        settings.voice.auto_listen,
    );

    let loop_handle = controller.clone();
    tokio::spawn(async move { loop_handle.run().await });
    render::spawn(&session, &controller);

    println!(
        "Commands: :connect, :disconnect, :revise, :auto on|off, :quit. \
         Anything else is sent to the service."
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown_signal() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim().to_string();
                match line.as_str() {
                    ":quit" => break,
                    ":connect" => {
                        if let Err(e) = session
                            .connect(&settings.connection.endpoint, &settings.connection.locale)
                            .await
                        {
                            eprintln!("connect failed: {}", e);
                        }
                    }
                    ":disconnect" => session.disconnect(),
                    ":revise" => {
                        if let Err(e) = controller.revise_query() {
                            eprintln!("{}", e);
                        }
                    }
                    ":auto on" => controller.set_auto_listen(true),
                    ":auto off" => controller.set_auto_listen(false),
                    _ => {
                        if let Err(e) = controller.submit(&line).await {
                            eprintln!("{}", e);
                        }
                    }
                }
            }
        }
    }

    session.disconnect();
    tracing::info!("Client shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("vui={},vui_session={},vui_controller={}", level, level, level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
