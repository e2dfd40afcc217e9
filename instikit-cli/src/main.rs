//! InstiKit CLI - Command-line client for the institute-management service
//!
//! Wires the runtime together the way an application front end would:
//! session store first, route guard before anything protected, realtime
//! bridge following the session lifecycle.

use clap::{Parser, Subcommand};
use instikit_client::{ApiClient, AuthApi, AuthHandle, ProfileUpdate};
use instikit_core::{init_logging, InstikitConfig, LoggingConfig};
use instikit_realtime::{EventHub, RealtimeBridge};
use instikit_session::{
    CredentialStore, RouteDecision, RouteGuard, Role, SessionEvent, SessionStatus, SessionStore,
};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "instikit")]
#[command(about = "Command-line client for the institute management service")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and persist the session credential
    Login {
        #[arg(short, long)]
        username: String,

        /// Password; falls back to INSTIKIT_PASSWORD
        #[arg(short, long)]
        password: Option<String>,

        /// Expected role (student, faculty, admin), sent as an advisory hint
        #[arg(short, long)]
        role: Option<String>,
    },

    /// Sign out and remove the persisted credential
    Logout,

    /// Show the current session
    Status,

    /// Update profile fields on the signed-in identity
    Profile {
        #[arg(long)]
        full_name: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        phone: Option<String>,
    },

    /// Stream realtime updates until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: if cli.verbose { "debug" } else { "info" }.to_string(),
        ..Default::default()
    };
    init_logging(&logging).map_err(|e| anyhow::anyhow!("failed to init logging: {}", e))?;

    let config = match &cli.config {
        Some(path) => InstikitConfig::from_file(path)?,
        None => InstikitConfig::default(),
    }
    .apply_env();
    config.validate()?;
    debug!(base_url = %config.http.base_url, "configuration loaded");

    let auth = AuthHandle::new();
    let client = Arc::new(ApiClient::new(&config, auth)?);
    let credentials = CredentialStore::new(&config.storage.data_dir)?;
    let store = SessionStore::new(AuthApi::new(client.clone()), credentials);

    match cli.command {
        Commands::Login {
            username,
            password,
            role,
        } => login(&store, &username, password, role).await,
        Commands::Logout => {
            store.initialize().await?;
            store.logout().await?;
            println!("Signed out.");
            Ok(())
        }
        Commands::Status => status(&store).await,
        Commands::Profile {
            full_name,
            email,
            phone,
        } => profile(&store, full_name, email, phone).await,
        Commands::Watch => watch(&config, &store).await,
    }
}

async fn login(
    store: &Arc<SessionStore>,
    username: &str,
    password: Option<String>,
    role: Option<String>,
) -> anyhow::Result<()> {
    let password = password
        .or_else(|| std::env::var("INSTIKIT_PASSWORD").ok())
        .ok_or_else(|| anyhow::anyhow!("no password given (use --password or INSTIKIT_PASSWORD)"))?;
    let role = role
        .map(|value| Role::from_str(&value).map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;

    store.initialize().await?;
    let identity = store.login(username, &password, role).await?;
    println!("Signed in as {}.", identity.display_string());
    if identity.needs_password_reset {
        println!("A password change is required before the portal is usable.");
    }
    Ok(())
}

async fn status(store: &Arc<SessionStore>) -> anyhow::Result<()> {
    let snapshot = store.initialize().await?;
    match (snapshot.status, snapshot.identity) {
        (SessionStatus::Authenticated, Some(identity)) => {
            println!("Signed in as {}.", identity.display_string());
        }
        _ => {
            println!("Not signed in.");
            if let Some(error) = snapshot.last_error {
                println!("Last session ended with: {}", error);
            }
        }
    }
    Ok(())
}

async fn profile(
    store: &Arc<SessionStore>,
    full_name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
) -> anyhow::Result<()> {
    let update = ProfileUpdate {
        full_name,
        email,
        phone,
    };
    if update.is_empty() {
        anyhow::bail!("nothing to update; pass --full-name, --email or --phone");
    }

    store.initialize().await?;
    let identity = store.update_profile(&update).await?;
    println!("Profile updated for {}.", identity.display_string());
    Ok(())
}

async fn watch(config: &InstikitConfig, store: &Arc<SessionStore>) -> anyhow::Result<()> {
    let snapshot = store.initialize().await?;

    // Watching is open to every signed-in role, but a pending password
    // rotation still takes priority over everything else.
    let guard = RouteGuard::allowing([Role::Student, Role::Faculty, Role::Admin]);
    match guard.evaluate(&snapshot, "/watch") {
        RouteDecision::Render => {}
        RouteDecision::RedirectLogin { .. } => {
            println!("Not signed in; run `instikit login` first.");
            return Ok(());
        }
        RouteDecision::RedirectPasswordReset => {
            println!("A password change is required before watching for updates.");
            return Ok(());
        }
        RouteDecision::RedirectHome | RouteDecision::Loading => {
            println!("Watching is not available right now.");
            return Ok(());
        }
    }

    let hub = Arc::new(EventHub::new(config.realtime.channel_capacity));
    let bridge = RealtimeBridge::new(config, store.auth().clone(), hub.clone())?;

    // Follow later transitions (a forced teardown closes the channel), and
    // open the channel for the session that already exists.
    let _runner = bridge.clone().run(store.subscribe());
    bridge.open_channel().await?;
    println!("Watching for updates; press Ctrl-C to stop.");

    let mut toasts = hub.subscribe_toasts();
    let mut downloads = hub.subscribe_downloads();
    let mut attendance = hub.subscribe_attendance();
    let mut marks = hub.subscribe_marks();
    let mut notifications = hub.subscribe_notifications();
    let mut session_events = store.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            toast = toasts.recv() => {
                if let Ok(toast) = toast {
                    println!("• {}", toast.message);
                }
            }
            hint = downloads.recv() => print_hint("downloads", hint),
            hint = attendance.recv() => print_hint("attendance", hint),
            hint = marks.recv() => print_hint("marks", hint),
            hint = notifications.recv() => print_hint("notifications", hint),
            event = session_events.recv() => {
                if let Ok(SessionEvent::Anonymous { .. }) = event {
                    println!("Session ended; stopping.");
                    break;
                }
            }
        }
    }

    bridge.close_channel().await;
    Ok(())
}

fn print_hint(
    channel: &str,
    hint: Result<instikit_realtime::RealtimeEvent, tokio::sync::broadcast::error::RecvError>,
) {
    if let Ok(event) = hint {
        // The payload is a hint to refetch, not data worth caching here.
        println!(
            "  [{}] {} -> {}",
            channel,
            event.topic,
            serde_json::to_string(&event.payload).unwrap_or_else(|_| "{}".to_string())
        );
    }
}
