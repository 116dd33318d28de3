mod agent;
mod api;
mod compute;
mod config;
mod error;
mod http;
mod ids;
mod servers;
mod services;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::Request;
use clap::Parser;
use dotenvy::dotenv;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::agent::HttpSandboxAgent;
use crate::compute::build_adapter;
use crate::config::Config;
use crate::servers::ServerRegistry;
use crate::services::placement::build_strategy;
use crate::services::{Fleet, ServiceRegistry};

#[derive(Parser)]
#[command(name = "jcs", about = "Container placement control plane")]
enum Cli {
    /// Start the HTTP server (default when no subcommand is given)
    #[command(alias = "run")]
    Serve {
        /// Listen on this port instead of $PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the compute backend's instances as JSON and exit
    Servers,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Default to Serve when no subcommand is given, but still allow --help
    // and --version to work.
    let args: Vec<String> = std::env::args().collect();
    let cli = if args.len() <= 1 {
        Cli::Serve { port: None }
    } else {
        Cli::parse()
    };

    let mut config = Config::from_env().context("invalid configuration")?;
    let _guard = init_observability(&config);

    match cli {
        Cli::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            run_server(config).await
        }
        Cli::Servers => print_servers(config).await,
    }
}

fn init_observability(config: &Config) -> sentry::ClientInitGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("jcs=info,tower_http=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true).with_bracketed_fields(false))
        .with(sentry::integrations::tracing::layer().event_filter(
            |metadata| match *metadata.level() {
                tracing::Level::ERROR => sentry::integrations::tracing::EventFilter::Event,
                tracing::Level::WARN | tracing::Level::INFO => {
                    sentry::integrations::tracing::EventFilter::Breadcrumb
                }
                _ => sentry::integrations::tracing::EventFilter::Ignore,
            },
        ))
        .init();

    sentry::init((
        config.sentry_dsn.clone().unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            send_default_pii: true,
            traces_sample_rate: 0.2,
            enable_logs: true,
            ..Default::default()
        },
    ))
}

async fn run_server(config: Config) -> Result<()> {
    tracing::info!(
        backend = %config.compute.kind(),
        environment = %config.environment,
        "starting jcs"
    );
    let http_client = http::build_client(&config.remote).context("failed to build HTTP client")?;

    let adapter = build_adapter(&config.compute, http_client.clone(), config.remote.max_in_flight);
    let servers = Arc::new(ServerRegistry::new(adapter, config.provision.clone()));
    let known = servers.initialize().await;
    tracing::info!(
        backend = %servers.backend_kind(),
        servers = known,
        placement = config.placement.as_str(),
        "server registry ready"
    );

    let agent = Arc::new(HttpSandboxAgent::new(
        http_client,
        config.agent.clone(),
        config.remote.max_in_flight,
    ));
    let fleet = Arc::new(Fleet {
        servers: servers.clone(),
        agent,
        placement: build_strategy(config.placement),
    });

    let app_state = api::AppState {
        servers,
        services: Arc::new(ServiceRegistry::new(fleet)),
    };

    let app = api::create_app(app_state)
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(NewSentryLayer::<Request<Body>>::new_from_top());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn print_servers(config: Config) -> Result<()> {
    let http_client = http::build_client(&config.remote).context("failed to build HTTP client")?;
    let adapter = build_adapter(&config.compute, http_client, config.remote.max_in_flight);
    let remotes = adapter
        .list_servers()
        .await
        .with_context(|| format!("failed to list {} servers", adapter.kind()))?;
    println!("{}", serde_json::to_string_pretty(&remotes)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
