//! Bulk loader
//!
//! Replaces the full contents of the Target Table:
//!
//! ```text
//! BEGIN -> PROVISION -> TRUNCATE -> NORMALIZE -> INSERT (chunked) -> COMMIT
//! ```
//!
//! PostgreSQL DDL and `TRUNCATE` are transactional, so a failure anywhere
//! before commit rolls the table back to its previous contents.
//!
//! Rows are bound positionally: cell `i` of a record always lands in column
//! `i` of the provisioned column list.

use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use super::provisioner::ensure_table;
use crate::db::quote_ident;
use crate::error::{PipelineError, PipelineResult};

/// PostgreSQL accepts at most this many bind parameters per statement
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Pad with empty cells or cut on the right so `row` has exactly `column_count` cells
pub fn normalize_row(row: &[String], column_count: usize) -> Vec<String> {
    let mut normalized: Vec<String> = row.iter().take(column_count).cloned().collect();
    normalized.resize(column_count, String::new());
    normalized
}

/// Rows per `INSERT` statement for a table of `column_count` columns
pub fn rows_per_statement(column_count: usize) -> usize {
    (MAX_BIND_PARAMS / column_count.max(1)).max(1)
}

fn insert_prefix(table: &str, columns: &[String]) -> String {
    let column_list = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!("INSERT INTO {} ({}) ", quote_ident(table), column_list)
}

/// Provision, truncate and reload `table` in one transaction
///
/// Returns the number of rows inserted.
pub async fn replace_contents(
    conn: &mut PgConnection,
    table: &str,
    columns: &[String],
    records: &[Vec<String>],
) -> PipelineResult<usize> {
    let mut tx = conn.begin().await.map_err(PipelineError::data)?;

    match load_in_transaction(&mut tx, table, columns, records).await {
        Ok(rows) => {
            tx.commit().await.map_err(PipelineError::data)?;
            info!(table, rows, "Committed table reload");
            Ok(rows)
        },
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed load also failed");
            }
            Err(e)
        },
    }
}

async fn load_in_transaction(
    conn: &mut PgConnection,
    table: &str,
    columns: &[String],
    records: &[Vec<String>],
) -> PipelineResult<usize> {
    let columns = ensure_table(conn, table, columns).await?;

    sqlx::query(&format!("TRUNCATE TABLE {}", quote_ident(table)))
        .execute(&mut *conn)
        .await
        .map_err(PipelineError::data)?;
    info!(table, "Truncated table");

    let column_count = columns.len();
    let normalized: Vec<Vec<String>> = records
        .iter()
        .map(|row| normalize_row(row, column_count))
        .collect();

    let prefix = insert_prefix(table, &columns);
    let chunk_size = rows_per_statement(column_count);
    let total_chunks = normalized.len().div_ceil(chunk_size);

    for (chunk_idx, chunk) in normalized.chunks(chunk_size).enumerate() {
        debug!(
            "Inserting chunk {} / {} ({} rows)",
            chunk_idx + 1,
            total_chunks,
            chunk.len()
        );

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(&prefix);
        query_builder.push_values(chunk, |mut b, row| {
            for cell in row {
                b.push_bind(cell.as_str());
            }
        });

        query_builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(PipelineError::data)?;
    }

    Ok(normalized.len())
}
