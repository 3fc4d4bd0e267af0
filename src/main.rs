use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use forward_proxy::config::load_or_default;
use forward_proxy::lifecycle::signals;
use forward_proxy::net::Listener;
use forward_proxy::{Dispatcher, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "forward-proxy")]
#[command(about = "Forward HTTP/HTTPS proxy with CONNECT tunneling", long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Override the next-hop proxy address (host:port)
    #[arg(short, long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forward_proxy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("forward-proxy v0.1.0 starting");

    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        config.listener.bind_address = listen;
    }
    if let Some(upstream) = args.upstream {
        config.upstream.address = Some(upstream);
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = ?config.upstream.address,
        max_connections = config.listener.max_connections,
        connect_timeout_secs = config.timeouts.connect_secs,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let dispatcher = Dispatcher::new(config);
    let tracker = dispatcher.tracker();

    let shutdown_rx = shutdown.subscribe();
    let server = tokio::spawn(async move {
        dispatcher.run(listener, shutdown_rx).await;
    });

    signals::wait_for_signal().await;
    shutdown.trigger();
    let _ = server.await;

    // Give in-flight sessions a bounded window to finish.
    if !tracker.drain(Duration::from_secs(5)).await {
        tracing::warn!(
            active = tracker.active_count(),
            "Sessions still open at shutdown deadline"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
