//! Connection settings for the MongoDB store.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Explicit connection settings passed to [`MongoDbStore::connect`](crate::MongoDbStore::connect).
///
/// Missing keys fall back to the defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MongoSettings {
    /// Connection string, e.g. `mongodb://localhost:27017`.
    pub uri: String,
    pub database: String,
    /// Maximum number of pooled connections.
    #[serde(alias = "poolsize")]
    pub pool_size: u32,
    /// Connect timeout in seconds.
    #[serde(rename = "connection-timeout")]
    pub connection_timeout_secs: u64,
}

impl MongoSettings {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "docmap".to_string(),
            pool_size: 10,
            connection_timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = MongoSettings::default();
        assert_eq!(settings.uri, "mongodb://localhost:27017");
        assert_eq!(settings.pool_size, 10);
        assert_eq!(settings.connection_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_settings_keep_defaults() {
        let settings: MongoSettings = serde_json::from_value(serde_json::json!({
            "database": "people",
            "poolsize": 4,
            "connection-timeout": 3,
        }))
        .unwrap();

        assert_eq!(
            settings,
            MongoSettings {
                uri: "mongodb://localhost:27017".into(),
                database: "people".into(),
                pool_size: 4,
                connection_timeout_secs: 3,
            }
        );
    }
}
