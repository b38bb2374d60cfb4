pub mod api;
pub mod blob;
pub mod cli;
pub mod config;
pub mod models;
pub mod password;
pub mod services;
pub mod state;
pub mod stats;
pub mod store;

use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use anyhow::Context;
use cli::{Cli, Commands, DigestCommands, UserCommands};
pub use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use state::SharedState;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Reads `.env`, then the config file (explicit path or the search path),
/// then environment overrides.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(e).context("Failed to read .env");
    }

    let mut config = match path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    if matches!(cli.command, Some(Commands::Init)) {
        return init_config();
    }

    config.validate()?;

    let prometheus_handle = init_observability(&config)?;

    let Some(command) = cli.command else {
        print_help();
        return Ok(());
    };

    if matches!(command, Commands::Serve) {
        return run_server(config, prometheus_handle).await;
    }

    let state = SharedState::new(config)?;

    match command {
        Commands::User { command } => match command {
            UserCommands::List => cli::cmd_user_list(&state).await,
            UserCommands::Add {
                username,
                password,
                email,
            } => cli::cmd_user_add(&state, &username, password, email).await,
            UserCommands::Delete { username } => cli::cmd_user_delete(&state, &username).await,
            UserCommands::Passwd { username, password } => {
                cli::cmd_user_passwd(&state, &username, password).await
            }
            UserCommands::Email { username, email } => {
                cli::cmd_user_email(&state, &username, email).await
            }
            UserCommands::Bootstrap { password, email } => {
                cli::cmd_user_bootstrap(&state, &password, email).await
            }
        },
        Commands::Digest { command } => match command {
            DigestCommands::List => cli::cmd_digest_list(&state).await,
            DigestCommands::Upload { date, file } => {
                cli::cmd_digest_upload(&state, &date, &file).await
            }
            DigestCommands::Delete { date } => cli::cmd_digest_delete(&state, &date).await,
            DigestCommands::Rename { from, to } => {
                cli::cmd_digest_rename(&state, &from, &to).await
            }
        },
        Commands::Activity { limit } => cli::cmd_activity(&state, limit).await,
        Commands::Stats { days } => cli::cmd_stats(&state, days).await,
        Commands::Serve | Commands::Init => Ok(()),
    }
}

fn init_observability(config: &Config) -> anyhow::Result<Option<PrometheusHandle>> {
    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key.as_str(), value.as_str())?;
        }
        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    if prometheus_handle.is_some() {
        info!("Prometheus metrics recorder initialized");
    }

    Ok(prometheus_handle)
}

fn init_config() -> anyhow::Result<()> {
    if Config::create_default_if_missing()? {
        println!("✓ Created config.toml with default settings");
        println!("  Set the bootstrap password with RASSEGNA_BOOTSTRAP_PASSWORD before first login.");
    } else {
        println!("config.toml already exists; leaving it untouched.");
    }
    Ok(())
}

async fn run_server(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "Rassegna v{} starting web server...",
        env!("CARGO_PKG_VERSION")
    );

    if !config.server.enabled {
        warn!("Web server disabled in config ([server] enabled = false)");
        return Ok(());
    }

    if config.accounts.bootstrap_password.is_none() {
        warn!("No bootstrap password configured; break-glass administrator login is disabled");
    }

    let port = config.server.port;
    let api_state = api::create_app_state(Arc::new(SharedState::new(config)?), prometheus_handle);
    let app = api::router(api_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Web server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}

fn print_help() {
    println!("rassegna v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: rassegna <command>");
    println!();
    println!("Commands:");
    println!("  serve                     Start the web API server");
    println!("  init                      Create default config.toml");
    println!("  user list|add|delete|passwd|email|bootstrap");
    println!("  digest list|upload|delete|rename");
    println!("  activity [--limit N]      Most recent digest views");
    println!("  stats [--days N]          Usage statistics");
    println!();
    println!("Run 'rassegna <command> --help' for details.");
}
