use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DB: &str = "docforge";

/// Where and how to reach the backing store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub db: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            db: DEFAULT_DB.to_string(),
            user: None,
            password: None,
        }
    }
}

impl ConnectionConfig {
    /// `host:port`, the address part of the connection string.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection string: `[user[:password]@]host:port/db`.
    ///
    /// Empty user names and passwords are treated as absent.
    pub fn url(&self) -> String {
        let base = format!("{}/{}", self.address(), self.db);
        match (non_empty(&self.user), non_empty(&self.password)) {
            (Some(user), Some(password)) => format!("{user}:{password}@{base}"),
            (Some(user), None) => format!("{user}@{base}"),
            _ => base,
        }
    }

    /// Connection string with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        let base = format!("{}/{}", self.address(), self.db);
        match (non_empty(&self.user), non_empty(&self.password)) {
            (Some(user), Some(_)) => format!("{user}:***@{base}"),
            (Some(user), None) => format!("{user}@{base}"),
            _ => base,
        }
    }

    /// The configured user, if it is non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = non_empty(&self.user)?;
        Some((user, non_empty(&self.password).unwrap_or("")))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ConnectionConfig::default();
        assert_eq!(c.host, "localhost");
        assert_eq!(c.port, 27017);
        assert_eq!(c.db, "docforge");
        assert!(c.credentials().is_none());
        assert_eq!(c.url(), "localhost:27017/docforge");
    }

    #[test]
    fn url_with_user_only() {
        let c = ConnectionConfig {
            user: Some("alice".into()),
            ..ConnectionConfig::default()
        };
        assert_eq!(c.url(), "alice@localhost:27017/docforge");
    }

    #[test]
    fn url_with_credentials() {
        let c = ConnectionConfig {
            host: "db.example".into(),
            port: 4000,
            db: "samples".into(),
            user: Some("alice".into()),
            password: Some("s3cret".into()),
        };
        assert_eq!(c.url(), "alice:s3cret@db.example:4000/samples");
        assert_eq!(c.redacted_url(), "alice:***@db.example:4000/samples");
        assert_eq!(c.credentials(), Some(("alice", "s3cret")));
    }

    #[test]
    fn empty_user_is_absent() {
        let c = ConnectionConfig {
            user: Some(String::new()),
            password: Some("ignored".into()),
            ..ConnectionConfig::default()
        };
        assert_eq!(c.url(), "localhost:27017/docforge");
        assert!(c.credentials().is_none());
    }
}
