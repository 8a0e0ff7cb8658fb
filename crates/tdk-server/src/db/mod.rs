//! Database connection helper
//!
//! The pipeline never holds a connection across stages: each stage asks the
//! [`ConnectionFactory`] for a fresh [`PgConnection`] and hands it back to
//! [`close`] on every exit path.
//!
//! An optional client directory (`DB_CLIENT_DIR`) may hold a `root.crt` CA
//! bundle. It is inspected once per factory, on first use, and cached in a
//! [`ClientProfile`].

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{env_parse, env_string};
use crate::error::{PipelineError, PipelineResult};

/// CA bundle file looked up inside the client directory
pub const ROOT_CERT_FILE: &str = "root.crt";

/// Database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Full connection URL; takes precedence over the discrete fields
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    /// Preferred database identifier
    pub service_name: String,
    /// Fallback database identifier when no service name is set
    pub sid: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub client_dir: Option<PathBuf>,
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            service_name: String::new(),
            sid: "pipeline".to_string(),
            user: "pipeline_user".to_string(),
            password: "pipeline".to_string(),
            client_dir: None,
            connect_timeout_secs: 10,
        }
    }
}

impl DbConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            url: env_string("DATABASE_URL"),
            host: env_string("DB_HOST").unwrap_or(defaults.host),
            port: env_parse("DB_PORT", defaults.port),
            service_name: env_string("DB_SERVICE_NAME").unwrap_or_default(),
            sid: env_string("DB_SID").unwrap_or(defaults.sid),
            user: env_string("DB_USER").unwrap_or(defaults.user),
            password: std::env::var("DB_PASSWORD").unwrap_or(defaults.password),
            client_dir: env_string("DB_CLIENT_DIR").map(PathBuf::from),
            connect_timeout_secs: env_parse("DB_CONNECT_TIMEOUT", defaults.connect_timeout_secs),
        }
    }

    /// Database to connect to: the service name when present, otherwise the SID
    pub fn database_name(&self) -> &str {
        if self.service_name.trim().is_empty() {
            &self.sid
        } else {
            &self.service_name
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_none() {
            if self.host.trim().is_empty() {
                anyhow::bail!("Database host cannot be empty");
            }
            if self.database_name().trim().is_empty() {
                anyhow::bail!("Either DB_SERVICE_NAME or DB_SID must be set");
            }
        }

        if self.connect_timeout_secs == 0 {
            anyhow::bail!("DB_CONNECT_TIMEOUT must be greater than 0");
        }

        Ok(())
    }

    /// Human-readable target for log lines, never includes credentials
    pub fn describe(&self) -> String {
        match self.url {
            Some(_) => "DATABASE_URL".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.database_name()),
        }
    }
}

/// Client-side transport settings resolved from the client directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientProfile {
    /// CA bundle used to verify the server, when available
    pub root_cert: Option<PathBuf>,
}

impl ClientProfile {
    /// Inspect the configured client directory
    ///
    /// A missing or unusable directory is not an error: connections fall back
    /// to the default transport.
    pub fn detect(client_dir: Option<&Path>) -> Self {
        let Some(dir) = client_dir else {
            return Self::default();
        };

        let cert = dir.join(ROOT_CERT_FILE);
        if cert.is_file() {
            info!(client_dir = %dir.display(), "Database client initialised with verified TLS");
            Self {
                root_cert: Some(cert),
            }
        } else {
            warn!(
                client_dir = %dir.display(),
                "Could not initialise database client from {} - falling back to default transport",
                cert.display()
            );
            Self::default()
        }
    }
}

/// Opens scoped database connections
#[derive(Debug)]
pub struct ConnectionFactory {
    options: PgConnectOptions,
    client_dir: Option<PathBuf>,
    connect_timeout: Duration,
    target: String,
    profile: OnceLock<ClientProfile>,
}

impl ConnectionFactory {
    pub fn new(config: &DbConfig) -> PipelineResult<Self> {
        let options = match config.url {
            Some(ref url) => PgConnectOptions::from_str(url).map_err(PipelineError::connection)?,
            None => PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .username(&config.user)
                .password(&config.password)
                .database(config.database_name()),
        };

        Ok(Self {
            options,
            client_dir: config.client_dir.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            target: config.describe(),
            profile: OnceLock::new(),
        })
    }

    /// Client profile, detected on first call only
    pub fn client_profile(&self) -> &ClientProfile {
        self.profile
            .get_or_init(|| ClientProfile::detect(self.client_dir.as_deref()))
    }

    fn connect_options(&self) -> PgConnectOptions {
        let options = self.options.clone();

        match self.client_profile().root_cert {
            Some(ref cert) => options.ssl_mode(PgSslMode::VerifyFull).ssl_root_cert(cert),
            None => options,
        }
    }

    /// Open a new connection
    pub async fn connect(&self) -> PipelineResult<PgConnection> {
        let options = self.connect_options();

        match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => {
                debug!(target_db = %self.target, "Connected to database");
                Ok(conn)
            },
            Ok(Err(e)) => Err(PipelineError::connection(e)),
            Err(_) => Err(PipelineError::Connection(format!(
                "timed out after {}s connecting to {}",
                self.connect_timeout.as_secs(),
                self.target
            ))),
        }
    }

    /// Round-trip check used by the health endpoint
    pub async fn ping(&self) -> PipelineResult<()> {
        let mut conn = self.connect().await?;
        let result = sqlx::query("SELECT 1")
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(PipelineError::connection);
        close(conn).await;
        result
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Release a connection, logging rather than failing on close errors
pub async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close database connection cleanly");
    }
}

/// Double-quote an identifier so its case and characters are kept verbatim
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
