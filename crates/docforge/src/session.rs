use std::path::Path;
use std::sync::Arc;

use docforge_forge::{Document, Forge};
use docforge_store::{ConnectionConfig, Connector, Indices};
use docforge_types::{Identifier, Map, Query, Value};
use tracing::{debug, warn};

use crate::config::{default_config_path, load_config_file, ConfigFile, ConnectionParams};
use crate::error::DocforgeResult;
use crate::logging::init_logging;

/// An open connection to a document store together with its identity cache.
///
/// Documents obtained through one session share one cache: two lookups that
/// reach the same stored document return the same `Arc<Document>`.
pub struct Session {
    config: ConnectionConfig,
    forge: Forge,
}

impl Session {
    /// Connect with a fully resolved configuration.
    ///
    /// Connection failures are returned immediately; nothing is retried.
    pub fn open(config: ConnectionConfig, connector: &dyn Connector) -> DocforgeResult<Self> {
        debug!(url = %config.redacted_url(), "opening session");
        let store = connector.connect(&config)?;
        Ok(Self {
            config,
            forge: Forge::new(store),
        })
    }

    /// Resolve `params` against the configuration file and connect.
    ///
    /// `config_path` defaults to `~/.docforge.toml`. A `[logging]
    /// verbosity` set in the file installs logging at that level first.
    pub fn connect(
        params: ConnectionParams,
        config_path: Option<&Path>,
        connector: &dyn Connector,
    ) -> DocforgeResult<Self> {
        let path = config_path.map(Path::to_path_buf).or_else(default_config_path);
        let file = match &path {
            Some(path) => load_config_file(path)?,
            None => None,
        };
        if let Some(verbosity) = file.as_ref().map(ConfigFile::verbosity).transpose()?.flatten() {
            init_logging(verbosity);
        }
        Self::open(params.resolve(file.as_ref()), connector)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn forge(&self) -> &Forge {
        &self.forge
    }

    // ---- Documents ----

    /// New uncommitted document of `kind`, or a stored one when
    /// `properties` carries an `_id`.
    pub fn create(&self, kind: &str, properties: Map) -> DocforgeResult<Arc<Document>> {
        Ok(self.forge.create(kind, properties, Indices::new())?)
    }

    /// Like [`create`](Self::create), declaring indices for the kind.
    pub fn create_indexed(
        &self,
        kind: &str,
        properties: Map,
        indices: Indices,
    ) -> DocforgeResult<Arc<Document>> {
        Ok(self.forge.create(kind, properties, indices)?)
    }

    pub fn find(&self, kind: &str, query: &Query) -> DocforgeResult<Vec<Arc<Document>>> {
        Ok(self.forge.find(kind, query)?)
    }

    pub fn find_one(&self, kind: &str, query: &Query) -> DocforgeResult<Option<Arc<Document>>> {
        Ok(self.forge.find_one(kind, query)?)
    }

    pub fn get(&self, kind: &str, id: Identifier) -> DocforgeResult<Option<Arc<Document>>> {
        Ok(self.forge.get(kind, id)?)
    }

    // ---- Aggregates ----

    pub fn count(&self, kind: &str, query: &Query) -> DocforgeResult<u64> {
        Ok(self.forge.count(kind, query)?)
    }

    pub fn distinct(&self, kind: &str, field: &str) -> DocforgeResult<Vec<(Value, u64)>> {
        Ok(self.forge.distinct(kind, field)?)
    }

    /// Delete every document of `kind`; live instances become uncommitted.
    pub fn remove_all(&self, kind: &str) -> DocforgeResult<usize> {
        Ok(self.forge.remove_all(kind)?)
    }

    /// End the session, returning how many documents were still alive.
    ///
    /// Documents held elsewhere stay usable; their forge keeps the store open
    /// until the last of them is dropped.
    pub fn close(self) -> usize {
        let live = self.forge.live_count();
        if live > 0 {
            warn!(live, url = %self.config.redacted_url(), "session closed with live documents");
        } else {
            debug!(url = %self.config.redacted_url(), "session closed");
        }
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, DocforgeError};
    use docforge_forge::{Direction, ForgeError};
    use docforge_store::{IndexSpec, InMemoryConnector};
    use serde_json::json;
    use std::io::Write;

    fn props(value: Value) -> Map {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn open(connector: &InMemoryConnector) -> Session {
        Session::open(ConnectionConfig::default(), connector).unwrap()
    }

    #[test]
    fn sessions_on_one_database_share_storage() {
        let connector = InMemoryConnector::new();
        let first = open(&connector);
        let doc = first.create("Sample", props(json!({"n": 1}))).unwrap();
        let id = doc.commit_default().unwrap();

        let second = open(&connector);
        let found = second.get("Sample", id).unwrap().unwrap();
        assert_eq!(found.get("n").unwrap(), json!(1));
        // Separate caches, separate instances.
        assert!(!Arc::ptr_eq(&doc, &found));
    }

    #[test]
    fn unreachable_host_fails_immediately() {
        let connector = InMemoryConnector::new();
        connector.set_unreachable("localhost:27017").unwrap();
        let err = Session::open(ConnectionConfig::default(), &connector)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DocforgeError::Forge(ForgeError::ConnectionFailure(_))
        ));
    }

    #[test]
    fn connect_reads_configuration_file() {
        let connector = InMemoryConnector::new();
        connector
            .require_credentials("localhost:27017", "alice", "pw")
            .unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection]\ndb = \"lab\"\nuser = \"alice\"\npassword = \"pw\"").unwrap();

        let session = Session::connect(ConnectionParams::default(), Some(file.path()), &connector)
            .unwrap();
        assert_eq!(session.config().db, "lab");

        let wrong = ConnectionParams {
            password: Some("nope".into()),
            ..ConnectionParams::default()
        };
        assert!(Session::connect(wrong, Some(file.path()), &connector).is_err());
    }

    #[test]
    fn connect_applies_logging_section() {
        let connector = InMemoryConnector::new();

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "[logging]\nverbosity = \"chatty\"").unwrap();
        let err = Session::connect(ConnectionParams::default(), Some(bad.path()), &connector)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            DocforgeError::Config(ConfigError::InvalidVerbosity(_))
        ));

        let mut good = tempfile::NamedTempFile::new().unwrap();
        writeln!(good, "[logging]\nverbosity = \"Error\"").unwrap();
        assert!(Session::connect(ConnectionParams::default(), Some(good.path()), &connector).is_ok());
    }

    #[test]
    fn aggregates_and_bulk_removal() {
        let connector = InMemoryConnector::new();
        let session = open(&connector);
        let mut kept = Vec::new();
        for site in ["A", "B", "A"] {
            let doc = session
                .create("Sample", props(json!({"origin": {"site": site}})))
                .unwrap();
            doc.commit_default().unwrap();
            kept.push(doc);
        }

        assert_eq!(session.count("Sample", &Query::new()).unwrap(), 3);
        assert_eq!(
            session.distinct("Sample", "origin.site").unwrap(),
            vec![(json!("A"), 2), (json!("B"), 1)]
        );

        assert_eq!(session.remove_all("Sample").unwrap(), 3);
        assert_eq!(session.count("Sample", &Query::new()).unwrap(), 0);
        assert!(kept.iter().all(|d| !d.is_committed()));
        for doc in &kept {
            doc.discard();
        }
    }

    #[test]
    fn indexed_kind_rejects_duplicates() {
        let connector = InMemoryConnector::new();
        let session = open(&connector);
        let indices = Indices::from([("name".to_string(), IndexSpec::unique())]);

        let a = session
            .create_indexed("Sample", props(json!({"name": "s1"})), indices.clone())
            .unwrap();
        a.commit_default().unwrap();
        let b = session
            .create_indexed("Sample", props(json!({"name": "s1"})), indices)
            .unwrap();
        assert!(b.commit_default().is_err());
        b.discard();
    }

    #[test]
    fn graph_through_session() {
        let connector = InMemoryConnector::new();
        let session = open(&connector);
        let sample = session.create("Sample", props(json!({"name": "s1"}))).unwrap();
        sample.commit_default().unwrap();
        let read = session.create("Read", props(json!({"length": 150}))).unwrap();
        read.commit_default().unwrap();
        read.connect_to(&sample, props(json!({"role": "part-of"}))).unwrap();

        let found = session
            .find_one("Sample", &Query::new().eq("name", "s1"))
            .unwrap()
            .unwrap();
        let reads = found
            .neighbors(
                Direction::Ingoing,
                "Read",
                &Query::new(),
                &Query::new().eq("role", "part-of"),
            )
            .unwrap();
        assert_eq!(reads.len(), 1);
        assert!(Arc::ptr_eq(&reads[0], &read));
    }

    #[test]
    fn close_reports_live_documents() {
        let connector = InMemoryConnector::new();
        let session = open(&connector);
        let doc = session.create("Sample", Map::new()).unwrap();
        doc.commit_default().unwrap();
        let forge = session.forge().clone();

        assert_eq!(session.close(), 1);
        drop(doc);
        assert_eq!(forge.live_count(), 0);
    }
}
