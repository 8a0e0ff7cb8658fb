//! PostgreSQL test container for pipeline integration tests
//!
//! Each test starts its own container, so tests never share tables. Docker
//! must be running.

use anyhow::{Context, Result};
use sqlx::Connection;
use std::sync::Arc;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tdk_server::db::{quote_ident, ConnectionFactory, DbConfig};

/// A throwaway PostgreSQL server and a connection factory pointed at it
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    connector: Arc<ConnectionFactory>,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let config = DbConfig {
            url: Some(format!("postgresql://postgres:postgres@{}:{}/postgres", host, port)),
            ..DbConfig::default()
        };
        let connector = Arc::new(ConnectionFactory::new(&config)?);

        Ok(Self {
            _container: container,
            connector,
        })
    }

    pub fn connector(&self) -> Arc<ConnectionFactory> {
        Arc::clone(&self.connector)
    }

    /// Number of rows currently in `table`
    pub async fn row_count(&self, table: &str) -> Result<i64> {
        let mut conn = self.connector.connect().await?;
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;
        Ok(count)
    }

    /// Column names of `table` in ordinal order
    pub async fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut conn = self.connector.connect().await?;
        let columns = sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_name = $1 ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&mut conn)
        .await?;
        conn.close().await?;
        Ok(columns)
    }
}
