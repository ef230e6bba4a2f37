use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::{DbConfig, DbsConfig};
use crate::db::Db;
use crate::error::EngineError;

/// Named databases, opened on first use and shared afterwards.
///
/// Names containing `://` are treated as database URLs and cached under the URL.
#[derive(Debug, Default)]
pub struct DbRegistry {
    configs: HashMap<String, DbConfig>,
    open: RwLock<HashMap<String, Arc<Db>>>,
}

impl DbRegistry {
    pub fn new(config: DbsConfig) -> Self {
        Self {
            configs: config.databases,
            open: RwLock::new(HashMap::new()),
        }
    }

    pub fn load(path: &str) -> Result<Self, EngineError> {
        Ok(Self::new(DbsConfig::load(path)?))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Result<Arc<Db>, EngineError> {
        {
            let guard = match self.open.read() {
                Ok(g) => g,
                Err(poisoned) => {
                    tracing::warn!("database registry read lock was poisoned, recovering");
                    poisoned.into_inner()
                }
            };
            if let Some(db) = guard.get(name) {
                return Ok(Arc::clone(db));
            }
        }

        let config = if name.contains("://") {
            DbConfig::from_url(name)?
        } else {
            self.configs
                .get(name)
                .cloned()
                .ok_or_else(|| EngineError::UnknownDatabase(name.to_string()))?
        };

        let mut guard = match self.open.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("database registry write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        // Another caller may have opened it while the lock was released.
        if let Some(db) = guard.get(name) {
            return Ok(Arc::clone(db));
        }
        let db = Arc::new(Db::open(config).map_err(|e| e.with_context(name))?);
        guard.insert(name.to_string(), Arc::clone(&db));
        Ok(db)
    }
}
