// xsshunter-server main.rs
// Serves the probe script, ingests payload fires, hosts the control-panel API.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use xsshunter_core::token;
use xsshunter_server::config::ServerConfig;
use xsshunter_server::db::Database;
use xsshunter_server::notify::NotificationDispatcher;
use xsshunter_server::session::{self, SessionKeys};
use xsshunter_server::state::AppState;
use xsshunter_server::{build_router, logging, object_store};

/// XSS Hunter server
#[derive(Parser, Debug)]
#[command(name = "xsshunter-server")]
#[command(about = "Blind XSS payload collection server", version)]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Create an identity and print its routing path
    AddUser {
        #[arg(long)]
        email: String,
    },

    /// Print a session cookie for an existing identity
    IssueSession {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = logging::init_logging(&config.logging);

    let db = Database::open(&config.database.path)
        .with_context(|| format!("Failed to open database at {}", config.database.path.display()))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::AddUser { email } => add_user(&db, &email),
        Command::IssueSession { email } => issue_session(&config, &db, &email),
    }
}

async fn serve(config: ServerConfig, db: Database) -> Result<()> {
    let db = Arc::new(db);

    let session_secret = match session::resolve_secret(&db, config.session.secret.as_deref())? {
        Some(secret) => secret,
        None if config.server.control_panel_enabled => {
            bail!("session.secret (or XSSHUNTER_SESSION_SECRET) is required when the control panel is enabled")
        }
        // Nothing can log in, so an ephemeral secret is enough.
        None => token::new_secret(),
    };

    let store = object_store::from_config(&config.storage).context("Failed to initialize object store")?;
    let notifier =
        NotificationDispatcher::from_config(&config.notifications).context("Invalid notification config")?;

    tokio::fs::create_dir_all(&config.server.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.server.upload_dir.display()))?;

    tracing::info!(
        listen = %config.server.listen,
        hostname = %config.server.hostname,
        database = %config.database.path.display(),
        storage = store.backend_name(),
        notification_channels = notifier.sender_count(),
        control_panel = config.server.control_panel_enabled,
        "Starting xsshunter-server"
    );

    let listen = config.server.listen.clone();
    let state = AppState::new(config, db, store, notifier, session_secret);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn add_user(db: &Database, email: &str) -> Result<()> {
    let user = match db.find_user_by_email(email)? {
        Some(existing) => {
            tracing::info!(owner_id = %existing.id, "Identity already exists");
            existing
        }
        None => db.create_user(email)?,
    };
    println!("id:   {}", user.id);
    println!("path: {}", user.path);
    Ok(())
}

fn issue_session(config: &ServerConfig, db: &Database, email: &str) -> Result<()> {
    let Some(user) = db.find_user_by_email(email)? else {
        bail!("no identity with email {email}");
    };
    let Some(secret) = session::resolve_secret(db, config.session.secret.as_deref())? else {
        bail!("no session secret configured");
    };
    let keys = SessionKeys::new(secret, config.session.ttl_hours);
    let value = keys.issue(&user.id)?;
    println!("{}", keys.cookie_header(&value));
    Ok(())
}
