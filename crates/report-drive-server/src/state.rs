use std::sync::Arc;

use report_drive::HttpTransport;

use crate::config::ServerConfig;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub transport: Arc<dyn HttpTransport>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: ServerConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            sessions: SessionStore::default(),
        }
    }
}
