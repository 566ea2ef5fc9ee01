use std::sync::Arc;

use exam_core::Clock;
use storage::repository::{ProgressRepository, Storage};

use crate::error::AppServicesError;
use crate::gateway::{GatewayConfig, HttpSessionGateway, SessionGateway};
use crate::sessions::{CompletionCoordinator, RecoveryService, SessionLoopService};

/// Assembles app-facing services around one gateway and one progress store.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    session_loop: Arc<SessionLoopService>,
    recovery: Arc<RecoveryService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP gateway.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        gateway_config: GatewayConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let gateway: Arc<dyn SessionGateway> = Arc::new(HttpSessionGateway::new(gateway_config));
        Ok(Self::with_parts(clock, gateway, storage.progress))
    }

    /// Assemble from explicit parts; useful for tests and alternative
    /// backends. One completion guard is shared across everything that can
    /// finalize a session.
    #[must_use]
    pub fn with_parts(
        clock: Clock,
        gateway: Arc<dyn SessionGateway>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        let coordinator = Arc::new(CompletionCoordinator::new());
        let session_loop = Arc::new(
            SessionLoopService::new(clock, Arc::clone(&gateway), Arc::clone(&progress))
                .with_coordinator(coordinator),
        );
        let recovery = Arc::new(RecoveryService::new(gateway, progress));

        Self {
            clock,
            session_loop,
            recovery,
        }
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }

    #[must_use]
    pub fn recovery(&self) -> Arc<RecoveryService> {
        Arc::clone(&self.recovery)
    }
}
