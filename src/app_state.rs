use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::analysis::ProviderRegistry;
use crate::services::classifier::FoodGate;
use crate::services::connectivity::NetworkState;
use crate::services::scheduler::JobScheduler;

/// Shared application state passed to all route handlers. Every collaborator
/// is an explicitly constructed handle injected here; there are no ambient
/// globals.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub providers: Arc<ProviderRegistry>,
    pub network: Arc<dyn NetworkState>,
    pub scheduler: Arc<dyn JobScheduler>,
    /// Food/non-food screen; `None` disables the gate.
    pub food_gate: Option<Arc<FoodGate>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        providers: Arc<ProviderRegistry>,
        network: Arc<dyn NetworkState>,
        scheduler: Arc<dyn JobScheduler>,
        food_gate: Option<Arc<FoodGate>>,
    ) -> Self {
        Self {
            db,
            providers,
            network,
            scheduler,
            food_gate,
        }
    }
}
