//! In-memory connector.
//!
//! [`InMemoryConnector`] plays the part of a database server: it hosts named
//! in-memory databases keyed by `host:port/db`, can require credentials per
//! address, and can mark an address unreachable.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryDocumentStore;
use crate::traits::{Connector, DocumentStore};

#[derive(Debug, Default)]
pub struct InMemoryConnector {
    databases: RwLock<HashMap<String, Arc<InMemoryDocumentStore>>>,
    credentials: RwLock<HashMap<String, (String, String)>>,
    unreachable: RwLock<HashSet<String>>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `user`/`password` for every database at `address` (`host:port`).
    pub fn require_credentials(
        &self,
        address: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> StoreResult<()> {
        let mut credentials = self
            .credentials
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        credentials.insert(address.into(), (user.into(), password.into()));
        Ok(())
    }

    /// Make every connection attempt to `address` fail.
    pub fn set_unreachable(&self, address: impl Into<String>) -> StoreResult<()> {
        let mut unreachable = self
            .unreachable
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        unreachable.insert(address.into());
        Ok(())
    }

    /// The hosted database for `config`, if it has been created.
    pub fn database(&self, config: &ConnectionConfig) -> Option<Arc<InMemoryDocumentStore>> {
        self.databases
            .read()
            .ok()
            .and_then(|dbs| dbs.get(&database_key(config)).cloned())
    }

    fn failure(config: &ConnectionConfig, reason: &str) -> StoreError {
        StoreError::ConnectionFailure {
            db: config.db.clone(),
            host: config.host.clone(),
            port: config.port,
            reason: reason.to_string(),
        }
    }

    fn authenticate(&self, config: &ConnectionConfig) -> StoreResult<()> {
        let credentials = self
            .credentials
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let Some((user, password)) = credentials.get(&config.address()) else {
            return Ok(());
        };
        match config.credentials() {
            Some((u, p)) if u == user && p == password => {
                debug!(user = u, "authenticated");
                Ok(())
            }
            _ => Err(Self::failure(config, "incorrect credentials")),
        }
    }
}

fn database_key(config: &ConnectionConfig) -> String {
    format!("{}/{}", config.address(), config.db)
}

impl Connector for InMemoryConnector {
    fn connect(&self, config: &ConnectionConfig) -> StoreResult<Arc<dyn DocumentStore>> {
        debug!(url = %config.redacted_url(), "connection requested");

        let unreachable = self
            .unreachable
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?
            .contains(&config.address());
        if unreachable {
            return Err(Self::failure(config, "host unreachable"));
        }

        self.authenticate(config)?;

        let mut databases = self
            .databases
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let store: Arc<dyn DocumentStore> = databases
            .entry(database_key(config))
            .or_insert_with(|| {
                warn!(db = %config.db, "database does not exist and will be created");
                Arc::new(InMemoryDocumentStore::new())
            })
            .clone();

        debug!(url = %config.redacted_url(), "connected");
        Ok(store)
    }
}
