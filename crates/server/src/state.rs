//! Application State

use std::sync::Arc;
use std::time::Duration;

use farmhand_agent::{AgentServices, SessionConfig};
use farmhand_config::Settings;
use farmhand_core::ConnectivityProbe;
use farmhand_persistence::RetryQueue;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::session::SessionManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub sessions: Arc<SessionManager>,
    pub services: AgentServices,
    /// Consulted before each retry-queue pass
    pub probe: Arc<dyn ConnectivityProbe>,
    /// `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Settings,
        services: AgentServices,
        probe: Arc<dyn ConnectivityProbe>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let sessions = SessionManager::new(
            services.clone(),
            SessionConfig::from_settings(&config),
            config.server.max_sessions,
            Duration::from_secs(config.server.session_timeout_secs),
        );

        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            services,
            probe,
            metrics,
        }
    }

    pub fn retry_queue(&self) -> &Arc<RetryQueue> {
        &self.services.retry_queue
    }
}
