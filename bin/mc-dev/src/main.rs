//! Medix Camp Access Dev Server
//!
//! Runs the access layer against the REST user directory with an in-memory
//! identity provider seeded from `[[dev.accounts]]`, and exposes it as JSON:
//! - Session and role state
//! - Sign-in, Google sign-in, registration, sign-out
//! - Guarded navigation and the dashboard shell

mod api;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mc_access::{App, FederatedProvider, HttpUserDirectory, MemoryIdentityProvider};
use mc_config::GateConfig;

/// Medix Camp access layer development server
#[derive(Parser, Debug)]
#[command(name = "mc-dev")]
#[command(about = "Medix Camp access layer development server")]
struct Args {
    /// HTTP port
    #[arg(long, env = "MC_DEV_PORT", default_value = "8080")]
    port: u16,

    /// Configuration file (TOML)
    #[arg(long, env = "MC_CONFIG")]
    config: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long, env = "MC_LOG_JSON", default_value = "false")]
    log_json: bool,

    /// Account returned by the simulated Google popup
    #[arg(long, env = "MC_DEV_GOOGLE_ACCOUNT")]
    google_account: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    info!("Starting Medix Camp access dev server");

    let config = GateConfig::resolve(args.config.as_deref())?;
    info!(
        api = %config.api.base_url,
        participant_admits_organizer = config.policy.participant_admits_organizer,
        "Configuration resolved"
    );

    let identity = Arc::new(MemoryIdentityProvider::new());
    for account in &config.dev.accounts {
        identity.add_account(&account.email, &account.password, account.display_name.as_deref());
    }
    info!(accounts = config.dev.accounts.len(), "Seeded dev accounts");

    if let Some(email) = &args.google_account {
        let display_name = config
            .dev
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .and_then(|a| a.display_name.as_deref());
        identity.link_federated(FederatedProvider::Google, email, display_name);
    } else if config.dev.accounts.is_empty() {
        warn!("No dev accounts configured, sign-in will always fail");
    }

    let directory = Arc::new(HttpUserDirectory::from_config(&config.api)?);
    let app = Arc::new(App::new(&config, identity, directory));
    app.start();

    let router = api::create_router(app.clone());
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Dev server listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Dev server error: {}", e);
    }

    app.shutdown();
    info!("Medix Camp access dev server shutdown complete");
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
