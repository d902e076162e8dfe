use std::sync::Arc;

use logging::Logger;

use crate::db::Db;
use crate::lifecycle::RecordingManager;
use crate::store::Store;

/// Everything a handler needs, cloned into each route.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub db: Arc<dyn Db>,
    pub recordings: RecordingManager,
    pub config: Config,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, db: Arc<dyn Db>, store: Arc<dyn Store>, config: Config) -> Self {
        let recordings = RecordingManager::new(logger.clone(), db.clone(), store);

        Self {
            logger,
            db,
            recordings,
            config,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// The first path segment of every API route, e.g. `v1`.
    pub(crate) api_prefix: String,

    /// Assumed when an upload request names no content type.
    pub(crate) default_content_type: String,
}

impl Config {
    pub fn new(api_prefix: String, default_content_type: String) -> Self {
        Self {
            api_prefix,
            default_content_type,
        }
    }
}
