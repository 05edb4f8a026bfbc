use std::sync::Arc;

use crate::config::ServerConfig;
use crate::db::Database;
use crate::notify::NotificationDispatcher;
use crate::object_store::ObjectStore;
use crate::pipeline::IngestionPipeline;
use crate::session::SessionKeys;

pub struct AppState {
    pub config: ServerConfig,
    pub db: Arc<Database>,
    pub store: Arc<dyn ObjectStore>,
    pub pipeline: Arc<IngestionPipeline>,
    /// The only piece of state replaced at runtime (secret rotation).
    pub sessions: SessionKeys,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Wire the pipeline and session keys around already-opened backends.
    pub fn new(
        config: ServerConfig,
        db: Arc<Database>,
        store: Arc<dyn ObjectStore>,
        notifier: NotificationDispatcher,
        session_secret: String,
    ) -> SharedState {
        let pipeline = Arc::new(IngestionPipeline::new(
            db.clone(),
            store.clone(),
            Arc::new(notifier),
            config.public_base_url(),
        ));
        let sessions = SessionKeys::new(session_secret, config.session.ttl_hours);
        Arc::new(Self {
            config,
            db,
            store,
            pipeline,
            sessions,
        })
    }
}
