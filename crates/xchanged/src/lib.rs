//! xchanged - SkillXchange marketplace daemon
//!
//! Library components for the daemon process: the in-memory store, the
//! exchange service wrapping discovery and session completion, external
//! collaborators, and the local HTTP control plane.

pub mod collaborators;
pub mod exchange;
pub mod seed;
pub mod server;
pub mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use collaborators::{CredentialIssuer, KeywordTagger, LogCredentialIssuer, Tagger};
use exchange::{ExchangeService, ServiceConfig};
use server::{create_router, AppState};
use store::Store;
use tokio::sync::Notify;
use tracing::info;
use xchange_core::Config;

pub struct Daemon {
    config: Config,
    service: Arc<ExchangeService>,
    shutdown: Arc<Notify>,
}

impl Daemon {
    /// Build the daemon: store, optional demo data, and collaborators.
    pub async fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(Store::new());
        if config.seed_demo_data {
            seed::load(&store).await?;
        }

        let tagger: Arc<dyn Tagger> = Arc::new(KeywordTagger);
        let issuer: Arc<dyn CredentialIssuer> = Arc::new(LogCredentialIssuer);

        Ok(Self::with_collaborators(config, store, tagger, issuer))
    }

    /// Build the daemon around caller-supplied collaborators.
    pub fn with_collaborators(
        config: Config,
        store: Arc<Store>,
        tagger: Arc<dyn Tagger>,
        issuer: Arc<dyn CredentialIssuer>,
    ) -> Self {
        let service = ExchangeService::new(store, tagger, issuer, ServiceConfig::from(&config));
        Self {
            config,
            service: Arc::new(service),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn service(&self) -> &Arc<ExchangeService> {
        &self.service
    }

    pub fn router(&self) -> axum::Router {
        create_router(Arc::new(AppState {
            service: Arc::clone(&self.service),
            auth_token: self.config.auth_token.clone(),
        }))
    }

    /// Serve the HTTP API on 127.0.0.1 until [`Daemon::shutdown`] is called.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        info!("xchanged starting on port {}", self.config.port);
        info!(
            "default sort: {}, tagging: {}",
            self.config.default_sort,
            if self.config.tagging_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        if self.config.auth_token.is_none() {
            info!("auth token not set; API is open to local clients");
        }

        let addr = SocketAddr::from(([127, 0, 0, 1], self.config.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("HTTP server listening on http://{}", addr);

        let shutdown = Arc::clone(&self.shutdown);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.notified().await })
            .await?;

        info!("xchanged stopped");
        Ok(())
    }

    /// Stop accepting requests and let in-flight ones finish.
    pub fn shutdown(&self) {
        info!("shutdown requested");
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xchange_core::Query;

    #[tokio::test]
    async fn new_seeds_demo_data_when_enabled() {
        let daemon = Daemon::new(Config::default()).await.unwrap();
        assert_eq!(daemon.service().explore(&Query::default()).await.len(), 4);
    }

    #[tokio::test]
    async fn new_starts_empty_without_seed() {
        let config = Config {
            seed_demo_data: false,
            ..Config::default()
        };
        let daemon = Daemon::new(config).await.unwrap();
        assert!(daemon.service().explore(&Query::default()).await.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let config = Config {
            port: 0,
            ..Config::default()
        };
        let daemon = Daemon::new(config).await.unwrap();
        daemon.shutdown();
        daemon.run().await.unwrap();
    }
}
