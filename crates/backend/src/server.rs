//! Backend server: the campaign REST API plus a Prometheus metrics listener.

use std::net::SocketAddr;
use std::sync::Arc;

use outreach_core::AppConfig;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::executor::PipelineExecutor;
use crate::handlers::BackendState;
use crate::router::backend_router;
use crate::store::CampaignStore;

pub struct BackendServer {
    config: AppConfig,
    state: BackendState,
}

impl BackendServer {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(CampaignStore::new());
        let executor = PipelineExecutor::from_config(store, &config)?;
        Ok(Self {
            config,
            state: BackendState { executor },
        })
    }

    pub fn with_executor(config: AppConfig, executor: PipelineExecutor) -> Self {
        Self {
            config,
            state: BackendState { executor },
        }
    }

    /// Bind the configured host and port and serve until the process exits.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let addr = SocketAddr::new(
            self.config.server.host.parse()?,
            self.config.server.http_port,
        );
        info!(addr = %addr, "Starting HTTP server");
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let app = backend_router(self.state.clone())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Install the Prometheus recorder with its own HTTP listener.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.server.host.parse()?,
                self.config.server.metrics_port,
            ))
            .install()?;

        info!(port = self.config.server.metrics_port, "Metrics exporter started");
        Ok(())
    }
}
