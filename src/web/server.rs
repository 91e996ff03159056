//! Web server for the mail API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::claim::ClaimCoordinator;
use crate::config::{ClaimConfig, WebConfig};
use crate::{MailRewardError, Result};

use super::handlers::AppState;
use super::middleware::JwtState;
use super::router::{create_health_router, create_openapi_router, create_router};

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// JWT state.
    jwt_state: Arc<JwtState>,
    /// Web configuration.
    web_config: WebConfig,
    /// Claim configuration (background sweeps).
    claim_config: ClaimConfig,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &WebConfig, claim_config: &ClaimConfig, app_state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                MailRewardError::Config(format!(
                    "invalid web server address {}:{}: {}",
                    config.host, config.port, e
                ))
            })?;

        let jwt_state = Arc::new(JwtState::new(&config.jwt_secret));

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            jwt_state,
            web_config: config.clone(),
            claim_config: claim_config.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the claim maintenance background task.
    ///
    /// Every `reconcile_interval_secs` this settles claim intents whose
    /// status update was lost and drops expired claim locks. Intents younger
    /// than the lock TTL may still belong to a claim in flight and are left
    /// alone.
    fn start_reconcile_task(claims: ClaimCoordinator, config: ClaimConfig) {
        if config.reconcile_interval_secs == 0 {
            tracing::info!("Claim reconciliation disabled");
            return;
        }

        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(config.reconcile_interval_secs));
            let older_than = Duration::from_secs(config.lock_ttl_secs);

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                match claims
                    .reconcile(older_than, config.reconcile_batch_size)
                    .await
                {
                    Ok(report) => {
                        if report.settled > 0 || report.failed > 0 {
                            tracing::info!(
                                settled = report.settled,
                                failed = report.failed,
                                "Reconciled claim intents"
                            );
                        } else {
                            tracing::debug!("No claim intents to reconcile");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to reconcile claim intents");
                    }
                }

                match claims.purge_expired_locks().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(deleted_count = count, "Purged expired claim locks");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to purge claim locks");
                    }
                }
            }
        });
        tracing::info!(
            interval_secs = config.reconcile_interval_secs,
            "Claim reconciliation task started"
        );
    }

    fn build_router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            self.jwt_state.clone(),
            &self.web_config.cors_origins,
            Duration::from_secs(self.web_config.request_timeout_secs),
        )
        .merge(create_health_router())
        .merge(create_openapi_router())
        // Add gzip compression layer
        .layer(CompressionLayer::new())
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        // Start background maintenance after successful bind
        Self::start_reconcile_task(self.app_state.claims.clone(), self.claim_config.clone());

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, router).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let router = self.build_router();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_reconcile_task(self.app_state.claims.clone(), self.claim_config.clone());

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
