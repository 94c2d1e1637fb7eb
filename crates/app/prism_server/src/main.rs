//! Prism API server binary.
//!
//! Serves the vault HTTP surface over an in-process document store and a
//! filesystem blob store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use prism_api::config::ApiConfig;
use prism_core::models::session::SessionKind;
use prism_core::session::{Approver, SessionStore};
use prism_core::storage::FsBlobStore;
use prism_core::store::{DocumentStore, MemoryStore};
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "prism_server", about = "Prism vault API server")]
struct Args {
    /// Port to listen on on localhost (0 = ephemeral). Overrides
    /// `BIND_ADDR` when given.
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Root directory for vault blobs.
    #[arg(long, env = "VAULT_DIR", default_value = "./data/vault")]
    vault_dir: PathBuf,

    /// Origin used to build public share links.
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:3100")]
    public_base_url: String,

    /// Mint an approved admin session valid for this many minutes and log
    /// its id, for use as a bearer token.
    #[arg(long)]
    issue_session_minutes: Option<i64>,

    /// Arm QR login on startup.
    #[arg(long, default_value_t = false)]
    arm_remote_login: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,prism_api=debug,prism_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let config = api_config(&args, ApiConfig::from_env());

    info!(
        vault_dir = %config.vault_dir.display(),
        bind_addr = %config.bind_addr,
        "starting prism_server"
    );

    tokio::fs::create_dir_all(&config.vault_dir).await?;

    let docs: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let blobs = Arc::new(FsBlobStore::new(&config.vault_dir));

    let approver = Approver::new(docs.clone());
    if args.arm_remote_login {
        approver.arm_remote_login(true).await?;
    }
    if let Some(minutes) = args.issue_session_minutes {
        let pending = SessionStore::new(docs.clone()).create_pending().await?;
        let record = approver
            .approve(&SessionKind::Direct, &pending.id, session_ttl(minutes)?)
            .await?;
        info!(
            session_id = %pending.id,
            expires_at = ?record.expires_at,
            "issued admin session"
        );
    }

    let state = prism_api::AppState::new(docs, blobs, config.clone());
    let app = prism_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shut down");
    Ok(())
}

/// Layer CLI arguments over the environment-derived config.
fn api_config(args: &Args, base: ApiConfig) -> ApiConfig {
    let bind_addr = match args.port {
        Some(port) => format!("127.0.0.1:{port}"),
        None => base.bind_addr.clone(),
    };
    ApiConfig {
        bind_addr,
        vault_dir: args.vault_dir.clone(),
        public_base_url: args.public_base_url.clone(),
        ..base
    }
}

fn session_ttl(minutes: i64) -> Result<chrono::Duration, String> {
    match chrono::Duration::try_minutes(minutes) {
        Some(ttl) if ttl > chrono::Duration::zero() => Ok(ttl),
        _ => Err(format!(
            "--issue-session-minutes must be a positive number of minutes, got {minutes}"
        )),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("ctrl-c received, shutting down");
}
