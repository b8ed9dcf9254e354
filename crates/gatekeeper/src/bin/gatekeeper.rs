//! Gatekeeper service binary.
//!
//! Receives GitHub webhooks and runs the matching pipeline for each delivery.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gatekeeper::comments::CommentTemplates;
use gatekeeper::labels::Taxonomy;
use gatekeeper::{server, Config, GitHubClient, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::default();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("gatekeeper=info".parse()?);
    if config.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!(?config, "Starting gatekeeper");

    let token = config
        .github_token
        .as_deref()
        .context("GITHUB_TOKEN must be set")?;
    if config.webhook_secret.is_none() {
        warn!("No GITHUB_WEBHOOK_SECRET configured - webhook signatures will not be verified");
    }

    let client = GitHubClient::new(token, &config.api_url, config.organization.clone())
        .context("Failed to create GitHub client")?;

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(client),
        Arc::new(Taxonomy::standard()),
        Arc::new(CommentTemplates::standard()),
        config.pipeline,
    ));

    let (queue, receiver) = server::delivery_queue(config.queue_depth);
    let workers = server::spawn_workers(orchestrator, receiver, config.workers);
    info!(workers = workers.len(), queue_depth = config.queue_depth, "Pipeline workers started");

    let state = server::AppState {
        webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
        queue,
    };
    let app = server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Gatekeeper listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last sender; workers drain what is queued and exit
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker task failed");
        }
    }
    info!("Gatekeeper stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
