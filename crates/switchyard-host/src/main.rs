//! # switchyard
//!
//! Host shell binary: boots the host, manages the session, and resolves
//! fragment routes from the command line.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use switchyard_core::logging::init_subscriber;
use switchyard_host::{Host, Navigation};
use switchyard_settings::{load_settings_from_path, settings_path};

/// Switchyard host shell.
#[derive(Parser, Debug)]
#[command(name = "switchyard", about = "Switchyard host shell")]
struct Cli {
    /// Settings file (defaults to `~/.switchyard/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Connect to the broker and log notifications until Ctrl-C.
    Run,
    /// Log in against the identity provider.
    Login {
        /// Account name.
        #[arg(long)]
        username: String,
        /// Account password.
        #[arg(long)]
        password: String,
    },
    /// Clear the stored session.
    Logout,
    /// Show session, broker, and route configuration.
    Status,
    /// Navigate to a route and print what it resolves to.
    Open {
        /// Route path, e.g. `fleet`.
        route: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(settings_path);
    let settings = load_settings_from_path(&path)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    init_subscriber(&settings.logging.level, settings.logging.json);

    let host = Host::build(settings).context("Failed to assemble host")?;

    match cli.command {
        Command::Run => run(&host).await,
        Command::Login { username, password } => {
            let _ = host
                .identity()
                .login(&username, &password)
                .await
                .context("Login failed")?;
            println!("Logged in as {username}");
            Ok(())
        }
        Command::Logout => {
            host.identity().logout();
            println!("Logged out");
            Ok(())
        }
        Command::Status => {
            status(&host);
            Ok(())
        }
        Command::Open { route } => open(&host, &route).await,
    }
}

async fn run(host: &Host) -> Result<()> {
    let _state = host.bus().connection_state().subscribe(|state| {
        tracing::info!(state = %state, "broker connection");
    });
    let _auth = host.session().observe_authenticated(|authenticated| {
        tracing::info!(authenticated, "session");
    });
    let _subscriptions = host.listen_notifications(|notification| {
        tracing::info!(topic = %notification.topic, "{notification}");
    });

    let _ = host.start();
    tracing::info!(endpoint = %host.settings().broker.endpoint, "Switchyard host running");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    host.shutdown().await;
    Ok(())
}

fn status(host: &Host) {
    let session = host.session().snapshot();
    match session.identity.as_deref() {
        Some(identity) if session.is_authenticated() => println!("Session:  {identity}"),
        _ if session.is_authenticated() => println!("Session:  authenticated"),
        _ => println!("Session:  not logged in"),
    }
    println!("Broker:   {}", host.settings().broker.endpoint);
    println!("Gateway:  {}", host.api().base_url());
    for (route, fragment) in host.routes().fragment_routes() {
        println!("Route:    /{route} -> {fragment}");
    }
}

async fn open(host: &Host, route: &str) -> Result<()> {
    match host.navigate(route).await {
        Navigation::Local { route } => println!("/{route}: rendered by the host"),
        Navigation::Fragment { route, module } => {
            println!("/{route}: {} {} ({})", module.fragment, module.exposed, module.url);
            let exports = serde_json::to_string_pretty(&module.exports)?;
            println!("{exports}");
        }
        Navigation::Unavailable { route, error } => {
            println!("/{route}: unavailable ({}): {error}", error.kind());
        }
        Navigation::NotFound { route } => println!("/{route}: no such route"),
    }
    Ok(())
}
