//! SurrealDB connection management.
//!
//! The endpoint is resolved through SurrealDB's `any` engine, so one binary
//! can talk to a remote server (`ws://`, `wss://`, `http://`, `https://`) or
//! run against an embedded store such as `mem://`.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::{debug, info};

use crate::error::DbError;

const REMOTE_SCHEMES: [&str; 4] = ["ws://", "wss://", "http://", "https://"];

/// Where and how to reach the CMDB store.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL, e.g. `ws://127.0.0.1:8000` or `mem://`. A bare
    /// `host:port` is treated as a WebSocket address.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials, used for remote endpoints only.
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "cmdb".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// The endpoint with a scheme, defaulting to `ws://`.
    pub fn endpoint(&self) -> String {
        if self.url.contains("://") {
            self.url.clone()
        } else {
            format!("ws://{}", self.url)
        }
    }

    /// Whether the endpoint is a server that expects a root signin.
    pub fn is_remote(&self) -> bool {
        let endpoint = self.endpoint();
        REMOTE_SCHEMES.iter().any(|s| endpoint.starts_with(s))
    }
}

/// An open, namespace-scoped handle on the CMDB store.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Open the configured endpoint, sign in when it is remote and select
    /// the namespace and database.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let endpoint = config.endpoint();
        info!(
            endpoint = %endpoint,
            namespace = %config.namespace,
            database = %config.database,
            "Opening CMDB store"
        );

        let db = any::connect(endpoint.as_str()).await?;

        if config.is_remote() {
            db.signin(Root {
                username: config.username.clone(),
                password: config.password.clone(),
            })
            .await?;
        } else {
            debug!(endpoint = %endpoint, "Embedded endpoint, skipping signin");
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> DbConfig {
        DbConfig {
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn bare_address_defaults_to_websocket() {
        let cfg = config("10.0.0.5:8000");
        assert_eq!(cfg.endpoint(), "ws://10.0.0.5:8000");
        assert!(cfg.is_remote());
    }

    #[test]
    fn embedded_endpoints_are_local() {
        assert!(!config("mem://").is_remote());
        assert!(config("https://cmdb.internal").is_remote());
        assert_eq!(config("mem://").endpoint(), "mem://");
    }
}
