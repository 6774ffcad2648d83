//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use golive_control::{GoLiveControlPlane, GoLiveControlPlaneBuilder};
use golive_registry::{CapabilityRegistry, CapabilitySource, ManifestSource};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Actor recorded for capabilities loaded at startup
const STARTUP_ACTOR: &str = "golived";

/// Go-live daemon server
pub struct Server {
    config: DaemonConfig,
    plane: Arc<GoLiveControlPlane>,
}

impl Server {
    /// Build the control plane and load the configured manifests
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let sources: Vec<Arc<dyn CapabilitySource>> = config
            .capabilities
            .manifests
            .iter()
            .map(|path| Arc::new(ManifestSource::file(path)) as Arc<dyn CapabilitySource>)
            .collect();

        let registry = Arc::new(CapabilityRegistry::with_sources(sources));

        let plane = GoLiveControlPlaneBuilder::new()
            .with_config(config.control_plane())
            .with_registry(registry)
            .build()?;

        if config.capabilities.manifests.is_empty() {
            tracing::warn!("No capability manifests configured; registry starts empty");
        } else if plane.is_enabled() {
            let summary = plane.load_capabilities(STARTUP_ACTOR).await?;
            tracing::info!(
                inserted = summary.inserted,
                updated = summary.updated,
                manifests = config.capabilities.manifests.len(),
                "Capabilities loaded"
            );
        }

        Ok(Self {
            config,
            plane: Arc::new(plane),
        })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        // Create app state
        let state = AppState::new(self.plane.clone());

        // Create router
        let app = create_router(state, self.config.server.enable_cors);

        // Create listener
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Go-live daemon listening on {}", addr);
        if !self.plane.is_enabled() {
            tracing::warn!("Control plane disabled; API calls will answer 503");
        }

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Go-live daemon shutting down");

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use golive_types::CapabilityId;

    #[tokio::test]
    async fn test_loads_manifests_at_startup() {
        let path = std::env::temp_dir().join(format!("golive-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
[[capability]]
id = "content.drafts"
name = "Drafts"
domain = "content"

[[capability]]
id = "publishing.scheduled"
name = "Scheduled publishing"
domain = "publishing"
risk_level = "high"
depends_on = ["content.drafts"]
"#,
        )
        .unwrap();

        let mut config = DaemonConfig::default();
        config.capabilities.manifests = vec![path.clone()];

        let server = Server::new(config).await.unwrap();
        let capabilities = server.plane.list_capabilities().unwrap();
        assert_eq!(capabilities.len(), 2);
        assert!(server
            .plane
            .get_capability(&CapabilityId::new("publishing.scheduled"))
            .is_ok());

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_manifest_fails_startup() {
        let mut config = DaemonConfig::default();
        config.capabilities.manifests = vec!["/nonexistent/golive.toml".into()];

        assert!(matches!(
            Server::new(config).await,
            Err(DaemonError::ControlPlane(_))
        ));
    }
}
