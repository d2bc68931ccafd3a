//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the request pipeline:
//! - Requests by outcome and duration
//! - Queries by outcome and duration
//! - Background tasks processed
//! - Snapshot refreshes
//!
//! # Example
//!
//! ```rust,no_run
//! use reel_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Render for a scrape endpoint
//! let body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint listens on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should bind.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// A second installation in the same process (tests) is tolerated; the
    /// first recorder stays active and `handle` remains `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("reel_requests_total", "Requests handled, by outcome");
    describe_histogram!(
        "reel_request_duration_seconds",
        "Time from routing to a finished reply"
    );
    describe_counter!("reel_queries_total", "Database queries run, by outcome");
    describe_histogram!("reel_query_duration_seconds", "Time taken by one query");
    describe_counter!(
        "reel_tasks_processed_total",
        "Background tasks processed, by outcome"
    );
    describe_counter!(
        "reel_snapshot_refresh_total",
        "Snapshot refreshes, by source and outcome"
    );
}

/// Recorder for runtime events.
pub struct RuntimeMetrics;

impl RuntimeMetrics {
    /// Record a finished request.
    pub fn record_request(outcome: &'static str, duration: Duration) {
        counter!("reel_requests_total", "outcome" => outcome).increment(1);
        histogram!("reel_request_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a query.
    pub fn record_query(outcome: &'static str, duration: Duration) {
        counter!("reel_queries_total", "outcome" => outcome).increment(1);
        histogram!("reel_query_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a processed background task.
    pub fn record_task(outcome: &'static str) {
        counter!("reel_tasks_processed_total", "outcome" => outcome).increment(1);
    }

    /// Record a snapshot refresh.
    pub fn record_refresh(source: &'static str, outcome: &'static str) {
        counter!("reel_snapshot_refresh_total", "source" => source, "outcome" => outcome)
            .increment(1);
    }
}
