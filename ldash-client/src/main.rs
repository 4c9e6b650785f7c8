//! ldash-client - command-line front end for the log dashboard
//!
//! Runs one dashboard operation against the remote log server, reporting progress to the
//! terminal. With `--serve-events` the same events are also streamed over SSE for a browser UI.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ldash_client::api::{build_router, AppState};
use ldash_client::config::{ClientConfig, ConfigOverrides};
use ldash_client::polling::PollExit;
use ldash_client::remote::LogQuery;
use ldash_client::ui::{ConsoleAdapter, EventBusAdapter, Fanout, UiAdapter};
use ldash_client::{build_dashboard, Dashboard};
use ldash_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ldash-client
#[derive(Parser, Debug)]
#[command(name = "ldash-client")]
#[command(about = "Log dashboard client: drive parsing jobs and queries on a log server")]
#[command(version)]
struct Args {
    /// Config file (default: <config_dir>/ldash/ldash-client.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the log server
    #[arg(short, long, env = "LDASH_SERVER_URL")]
    server: Option<String>,

    /// Status polling interval in milliseconds
    #[arg(long, env = "LDASH_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Serve dashboard events over SSE on this local port
    #[arg(long, env = "LDASH_EVENTS_PORT")]
    serve_events: Option<u16>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a log file on the server and follow progress until it finishes
    Parse {
        /// Full path of the log file on the server (.log or .txt)
        path: String,
    },
    /// Load one page of parsed log records
    Logs {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        size: u32,
        #[arg(long)]
        date_from: Option<String>,
        #[arg(long)]
        date_to: Option<String>,
        #[arg(long)]
        client_ip: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    /// Load the first page of records if the server already holds parsed data
    CheckData,
    /// Most requested URLs
    TopUrls,
    /// Most active users
    TopUsers,
    /// Ask the server to cancel the running parsing job
    Cancel,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        server_url: args.server.clone(),
        poll_interval_ms: args.poll_interval_ms,
        events_port: args.serve_events,
        log_level: args.log_level.clone(),
    };
    let config = ClientConfig::load(args.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;

    init_tracing(&config.log_level);
    info!(server = %config.server_url, "Starting ldash-client v{}", env!("CARGO_PKG_VERSION"));

    let event_bus = EventBus::new(256);
    let adapters: Vec<Arc<dyn UiAdapter>> = vec![
        Arc::new(ConsoleAdapter),
        Arc::new(EventBusAdapter::new(event_bus.clone())),
    ];
    let ui: Arc<dyn UiAdapter> = Arc::new(Fanout::new(adapters));
    let dashboard = build_dashboard(&config, ui).context("Failed to initialize dashboard")?;

    if let Some(port) = config.events_port {
        serve_events(port, AppState::new(dashboard.clone(), event_bus.clone())).await?;
    }

    tokio::select! {
        result = run_command(&dashboard, args.command) => result,
        _ = shutdown_signal() => {
            teardown(&dashboard).await;
            bail!("Interrupted");
        }
    }
}

fn init_tracing(level: &str) {
    let default_directive = if level.contains('=') {
        level.to_string()
    } else {
        format!("ldash_client={level},ldash_common={level},tower_http=warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve_events(port: u16, state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind events server to {}", addr))?;
    info!("Serving dashboard events on http://{}/events", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, build_router(state)).await {
            warn!(error = %e, "Events server stopped");
        }
    });
    Ok(())
}

async fn run_command(dashboard: &Dashboard, command: Command) -> Result<()> {
    match command {
        Command::Parse { path } => {
            let handle = dashboard.start_parsing(&path).await?;
            match handle.await.context("Polling task failed")? {
                PollExit::Completed => Ok(()),
                PollExit::CancelledByServer => bail!("Parsing was cancelled on the server"),
                PollExit::Failed(message) => bail!("Parsing failed: {}", message),
                PollExit::Abandoned {
                    consecutive_failures,
                } => bail!(
                    "Gave up after {} consecutive failed status polls",
                    consecutive_failures
                ),
                PollExit::Stopped => bail!("Parsing stopped"),
            }
        }
        Command::Logs {
            page,
            size,
            date_from,
            date_to,
            client_ip,
            username,
            status,
            search,
        } => {
            let query = LogQuery {
                page,
                size,
                date_from,
                date_to,
                client_ip,
                username,
                status,
                search,
            };
            let logs = dashboard.load_data(query).await?;
            println!("{}", serde_json::to_string_pretty(&logs)?);
            Ok(())
        }
        Command::CheckData => {
            match dashboard.check_initial_data().await? {
                Some(logs) => println!("{}", serde_json::to_string_pretty(&logs)?),
                None => println!("No parsed data on the server yet"),
            }
            Ok(())
        }
        Command::TopUrls => {
            for (rank, entry) in dashboard.top_urls().await?.iter().enumerate() {
                println!("{:>4}  {:>8}  {}", rank + 1, entry.count, entry.url);
            }
            Ok(())
        }
        Command::TopUsers => {
            for (rank, entry) in dashboard.top_users().await?.iter().enumerate() {
                println!("{:>4}  {:>8}  {}", rank + 1, entry.count, entry.username);
            }
            Ok(())
        }
        Command::Cancel => {
            let ack = dashboard.cancel_remote().await?;
            if ack.accepted {
                println!("{}", ack.message.unwrap_or_else(|| "Parsing cancelled".to_string()));
                Ok(())
            } else {
                bail!(ack.rejection_reason("Server refused to cancel"))
            }
        }
    }
}

/// Local teardown, then a bounded remote cancel if a parsing job was running
async fn teardown(dashboard: &Dashboard) {
    if dashboard.shutdown() == Some(ldash_common::events::OperationKind::Parsing) {
        if let Err(e) = dashboard.cancel_remote().await {
            warn!(error = %e, "Remote cancellation failed");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
