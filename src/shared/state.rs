use crate::config::AppConfig;
use crate::llm::Classifier;
use crate::shared::utils::DbPool;
use std::sync::Arc;

pub struct AppState {
    pub config: AppConfig,
    pub conn: DbPool,
    pub classifier: Arc<dyn Classifier>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"[REDACTED]")
            .field("conn", &"DbPool")
            .field("classifier", &"Arc<dyn Classifier>")
            .finish()
    }
}
