//! Server dependencies (using traits for testability)
//!
//! Central dependency container handed to route handlers. External services
//! sit behind trait objects so tests can inject in-memory implementations.

use std::sync::Arc;

use sqlx::PgPool;

use crate::domains::lifecycle::LifecycleService;
use crate::kernel::identity::IdentityProvider;
use crate::kernel::media::MediaStore;

#[derive(Clone)]
pub struct ServerDeps {
    pub db_pool: PgPool,
    /// Lifecycle service owning all multi-record mutations
    pub lifecycle: Arc<LifecycleService>,
    /// Identity provider: accounts, tokens, role claims
    pub identity: Arc<dyn IdentityProvider>,
    /// Object store for uploaded attachments
    pub media: Arc<dyn MediaStore>,
}

impl ServerDeps {
    pub fn new(
        db_pool: PgPool,
        identity: Arc<dyn IdentityProvider>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleService::new(db_pool.clone()));
        Self {
            db_pool,
            lifecycle,
            identity,
            media,
        }
    }
}
