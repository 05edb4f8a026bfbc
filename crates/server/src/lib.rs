//! XSS Hunter server library.
//!
//! Everything the binary wires together is public so integration tests can
//! build the router in-process against an in-memory database.

pub mod api;
pub mod config;
pub mod correlation;
pub mod db;
pub mod health;
pub mod logging;
pub mod notify;
pub mod object_store;
pub mod pipeline;
pub mod probe;
pub mod session;
pub mod state;

pub use api::{build_router, ApiError, ApiResponse};
pub use config::{ConfigError, ServerConfig};
pub use db::{Database, DbError};
pub use health::{check_health, HealthResponse};
pub use object_store::{ArtifactId, ObjectStore, StoreError};
pub use pipeline::{IngestOutcome, IngestionPipeline, PurgeReport};
pub use session::{SessionKeys, SESSION_COOKIE, SESSION_SECRET_SETTING};
pub use state::{AppState, SharedState};
