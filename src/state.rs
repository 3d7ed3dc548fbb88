//! Application state shared across handlers.

use crate::config::config;
use crate::db::{self, DbPool};
use crate::services::{AuthService, NotificationService, VoteService};
use crate::Result;

/// Shared application state. Cheap to clone; the pool and services are
/// handle types.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub auth: AuthService,
    pub notifications: NotificationService,
    pub votes: VoteService,
}

impl AppState {
    /// Initialize state from configuration: open the pool, apply the
    /// schema, and wire up services.
    pub async fn new() -> Result<Self> {
        let config = config();
        let pool = db::init_pool(&config.database.path).await?;
        db::initialize_schema(&pool).await?;
        Ok(Self::with_pool(pool))
    }

    /// Build state around an existing pool. Used by tests with in-memory
    /// databases.
    pub fn with_pool(pool: DbPool) -> Self {
        let config = config();
        Self {
            db: pool.clone(),
            auth: AuthService::new(pool.clone()),
            notifications: NotificationService::new(pool.clone()),
            votes: VoteService::new(
                config.session.secret.clone(),
                config.votes.window_days,
            ),
        }
    }
}
