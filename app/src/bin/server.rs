//! Reel server binary.
//!
//! Reads configuration from the environment (and `.env` when present), builds
//! the context, then runs the web server, the task poller and the static-data
//! refreshers until Ctrl+C.

use anyhow::Context as _;
use axum::Router;
use axum::routing::get;
use reel_app::context::read_catalog_file;
use reel_app::services::github::GitHubOAuth;
use reel_app::services::http::RemoteEndpoint;
use reel_app::services::recurly::RecurlyBilling;
use reel_app::services::sendgrid::SendGridMailer;
use reel_app::services::vimeo::VimeoHost;
use reel_app::services::Billing;
use reel_app::{AssetMap, Catalog, Config, Context, ReelSite, TaskRunner};
use reel_core::{Clock, SystemClock};
use reel_postgres::PgConnector;
use reel_runtime::TaskPoller;
use reel_runtime::metrics::MetricsServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!(bind = %config.bind_address, base_url = %config.base_url, "Starting Reel");

    let connector = PgConnector::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to the database")?;

    let endpoint = RemoteEndpoint::new();
    let billing: Arc<dyn Billing> = Arc::new(RecurlyBilling::new(endpoint.clone(), &config.recurly));
    let content = read_catalog_file(&config.static_data_path).await.unwrap_or_default();
    let plans = billing.plans().await.unwrap_or_else(|| {
        tracing::warn!("No plans from the billing provider, starting without any");
        Vec::new()
    });
    let assets = AssetMap::load(&config.resource_path)
        .await
        .context("Failed to read assets")?;
    tracing::info!(
        episodes = content.episodes.len(),
        plans = plans.len(),
        assets = assets.len(),
        "Static data loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let context = Arc::new(Context {
        billing: Arc::clone(&billing),
        mailer: Arc::new(SendGridMailer::new(endpoint.clone(), config.sendgrid_api_key.clone())),
        github: Arc::new(GitHubOAuth::new(endpoint.clone(), &config.github)),
        video: Arc::new(VimeoHost::new(endpoint, config.vimeo_api_key.clone())),
        catalog: Catalog::new(content, plans),
        assets,
        clock: Arc::clone(&clock),
        config: config.clone(),
    });

    if let Some(address) = config.metrics_address {
        start_metrics(address).await?;
    }

    let runner = Arc::new(TaskRunner::new(connector.clone(), Arc::clone(&context)));
    match runner.schedule_releases(&context.catalog.content().episodes).await {
        Ok(scheduled) => tracing::info!(scheduled, "Episode releases scheduled"),
        Err(error) => tracing::warn!(%error, "Failed to schedule episode releases"),
    }

    let (poller, poller_shutdown) =
        TaskPoller::new(Arc::clone(&runner), clock, config.task_poll_interval);
    let poller_handle = tokio::spawn(poller.run());

    let refresh_shutdown = poller_shutdown.subscribe();
    let static_data_path = config.static_data_path.clone();
    let content_refresher = context.catalog.content.refresh_every(
        config.static_refresh_interval,
        move || {
            let path = static_data_path.clone();
            let runner = Arc::clone(&runner);
            async move {
                let content = read_catalog_file(&path).await?;
                if let Err(error) = runner.schedule_releases(&content.episodes).await {
                    tracing::warn!(%error, "Failed to schedule episode releases");
                }
                Some(content)
            }
        },
        refresh_shutdown.clone(),
    );
    let plans_refresher = context.catalog.plans.refresh_every(
        config.static_refresh_interval,
        move || billing.plans().into_future(),
        refresh_shutdown,
    );

    let site = Arc::new(ReelSite::new(connector, Arc::clone(&context)));
    reel_web::serve(site, &config.bind_address, async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "Failed to listen for Ctrl+C");
        }
        tracing::info!("Shutting down");
    })
    .await?;

    let _ = poller_shutdown.send(true);
    for (name, handle) in [
        ("task poller", poller_handle),
        ("static data refresher", content_refresher),
        ("plans refresher", plans_refresher),
    ] {
        if let Err(error) = handle.await {
            tracing::warn!(%error, name, "Background task ended abnormally");
        }
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reel_app=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Install the recorder and serve `/metrics` on its own listener.
async fn start_metrics(address: SocketAddr) -> anyhow::Result<()> {
    let mut metrics = MetricsServer::new(address);
    metrics.start().context("Failed to install metrics recorder")?;
    let metrics = Arc::new(metrics);
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.render().unwrap_or_default() }
        }),
    );
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind metrics address {address}"))?;
    tracing::info!(%address, "Serving metrics");
    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, app).await {
            tracing::error!(%error, "Metrics server stopped");
        }
    });
    Ok(())
}
