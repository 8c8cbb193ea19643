use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trigger_bot::buildapi::{BuildApiClient, VisibilityClient};
use trigger_bot::config::{Credentials, EngineConfig, ServiceConfig};
use trigger_bot::engine::{AllowList, TriggerEngine};
use trigger_bot::scheduler::{RetrySchedule, TriggerExecutor, TriggerPool};
use trigger_bot::server::{AppState, build_router};
use trigger_bot::worker::{EventWorker, WorkerMessage};

/// Notifications buffered between the HTTP handler and the worker.
const CHANNEL_CAPACITY: usize = 1024;

/// Retriggers failing or explicitly requested try jobs.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Address to accept notifications on. Overrides TB_LISTEN_ADDR.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Credentials file. Overrides TB_CONF_PATH.
    #[arg(long, value_name = "PATH")]
    conf: Option<PathBuf>,

    /// Trigger for every submitter instead of only the configured users.
    #[arg(long, default_value_t = false)]
    all_users: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trigger_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut service = ServiceConfig::from_env()?;
    if let Some(listen) = args.listen {
        service.listen_addr = listen;
    }
    if let Some(conf) = args.conf {
        service.conf_path = conf;
    }
    let engine_config = EngineConfig::from_env();

    let credentials = Credentials::load(&service.conf_path)
        .with_context(|| format!("loading credentials from {}", service.conf_path.display()))?;
    let allow_list = if args.all_users {
        AllowList::Everyone
    } else {
        AllowList::only(credentials.users.iter().cloned())
    };
    info!(
        users = credentials.users.len(),
        all_users = args.all_users,
        buildapi = %service.buildapi_url,
        "Loaded configuration"
    );

    let shutdown = CancellationToken::new();
    let engine = Arc::new(TriggerEngine::new(engine_config.clone(), allow_list));

    let client = BuildApiClient::new(
        &service.buildapi_url,
        credentials.ldap.clone(),
        service.http_timeout,
    )
    .context("creating build API client")?;
    let executor = TriggerExecutor::new(Arc::clone(&engine), client.clone(), client);
    let pool = TriggerPool::new(
        executor,
        RetrySchedule::from_config(&engine_config),
        engine_config.trigger_workers,
        shutdown.clone(),
    );
    let visibility = service
        .visibility_url
        .as_deref()
        .map(|url| VisibilityClient::new(url, service.http_timeout))
        .transpose()
        .context("creating visibility client")?;
    let worker = EventWorker::new(pool, visibility);

    let (tx, rx) = mpsc::channel::<WorkerMessage>(CHANNEL_CAPACITY);
    let worker_task = tokio::spawn(worker.run(rx, shutdown.clone()));

    let app = build_router(AppState::new(engine, tx, service.notify_secret.clone()))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(service.listen_addr)
        .await
        .with_context(|| format!("binding {}", service.listen_addr))?;
    info!("listening on {}", service.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    worker_task.await?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down");
    shutdown.cancel();
}
