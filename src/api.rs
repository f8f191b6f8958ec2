//! HTTP and WebSocket surface
//!
//! REST endpoints for accounts and stored history, plus the `/ws` chat
//! session route.

mod handlers;
mod session;
mod types;

pub use handlers::create_router;

use crate::auth::AuthService;
use crate::conversation::ModelClient;
use crate::db::Database;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: Arc<AuthService>,
    /// `None` when no model credential is configured
    pub model: Option<Arc<dyn ModelClient>>,
}

impl AppState {
    pub fn new(
        db: Database,
        auth: Arc<AuthService>,
        model: Option<Arc<dyn ModelClient>>,
    ) -> Self {
        Self { db, auth, model }
    }
}
