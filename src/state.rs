//! Application State
//!
//! Shared services assembled once at startup: the process controller, the
//! command registry, presence, and the HTTP client every command sees.

use std::sync::Arc;
use std::time::Duration;

use chat_companion_core::MessagingBackend;

use crate::commands::register_all;
use crate::models::settings::AppConfig;
use crate::services::exec::{OpenSshBackend, ProcessController, RemoteSessionBackend};
use crate::services::presence::PresenceState;
use crate::services::remote::adapters::RemoteAdapter;
use crate::services::remote::gateway::RemoteGateway;
use crate::services::remote::types::CommandContext;
use crate::utils::error::AppResult;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state built from a validated configuration.
pub struct AppState {
    context: CommandContext,
}

impl AppState {
    /// Build every shared service. The SSH backend is attached only when
    /// `ssh.enabled` is set.
    pub fn new(config: AppConfig, backend: Arc<dyn MessagingBackend>) -> AppResult<Self> {
        let mut controller = ProcessController::from_config(&config.exec);
        if config.ssh.enabled {
            let ssh = OpenSshBackend::new(config.ssh.clone())?
                .with_check_timeout(controller.deadline());
            tracing::info!("[Ssh] Remote commands enabled for {}", ssh.endpoint());
            controller = controller.with_remote(Arc::new(ssh));
        }

        let registry = register_all(&config);
        tracing::info!("[Registry] {} commands registered", registry.len());

        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(Self {
            context: CommandContext {
                backend,
                config: Arc::new(config),
                presence: Arc::new(PresenceState::new()),
                controller: Arc::new(controller),
                registry: Arc::new(registry),
                http,
            },
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.context.config
    }

    pub fn context(&self) -> &CommandContext {
        &self.context
    }

    /// Bind the shared context to `adapter`.
    pub fn into_gateway(self, adapter: Arc<dyn RemoteAdapter>) -> AppResult<RemoteGateway> {
        RemoteGateway::new(self.context, adapter)
    }
}
