//! Table provisioning
//!
//! Creates the Target Table on first ingestion. Every column is a bounded
//! text column named after a sanitized header entry, in header order.
//!
//! PostgreSQL cuts identifiers to [`ENGINE_IDENTIFIER_BYTES`] without
//! complaint, so names are compared in that stored form.
//!
//! An existing table is never altered. Its column list is compared with the
//! current header and any difference is reported as a schema error instead
//! of letting rows drift into the wrong columns positionally.

use sqlx::postgres::PgConnection;
use tracing::info;

use crate::db::quote_ident;
use crate::error::{PipelineError, PipelineResult};

/// Maximum length of every text column
pub const TEXT_COLUMN_LENGTH: u32 = 4000;

/// Longest identifier PostgreSQL keeps (`NAMEDATALEN - 1`)
pub const ENGINE_IDENTIFIER_BYTES: usize = 63;

/// `name` as PostgreSQL stores it, cut on a char boundary
pub fn stored_identifier(name: &str) -> &str {
    if name.len() <= ENGINE_IDENTIFIER_BYTES {
        return name;
    }

    let mut end = ENGINE_IDENTIFIER_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Stored form of every column, rejecting names that collide once stored
pub fn stored_columns(table: &str, columns: &[String]) -> PipelineResult<Vec<String>> {
    let stored: Vec<String> = columns
        .iter()
        .map(|column| stored_identifier(column).to_string())
        .collect();

    for (i, name) in stored.iter().enumerate() {
        if let Some(j) = stored[..i].iter().position(|earlier| earlier == name) {
            return Err(PipelineError::Schema(format!(
                "Cannot create {}: columns {} and {} both map to {}",
                table,
                j + 1,
                i + 1,
                name
            )));
        }
    }

    Ok(stored)
}

/// Build the `CREATE TABLE` statement for `columns`
pub fn create_table_sql(table: &str, columns: &[String]) -> String {
    let column_defs = columns
        .iter()
        .map(|column| format!("{} VARCHAR({})", quote_ident(column), TEXT_COLUMN_LENGTH))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {} ({})", quote_ident(table), column_defs)
}

/// Compare an existing table's columns with the ones derived from the header
pub fn check_columns(table: &str, existing: &[String], expected: &[String]) -> PipelineResult<()> {
    if existing == expected {
        return Ok(());
    }

    let position = existing
        .iter()
        .zip(expected)
        .position(|(have, want)| have != want);

    let detail = match position {
        Some(i) => format!(
            "column {} is {} in the table but {} in the file header",
            i + 1,
            existing[i],
            expected[i]
        ),
        None => format!(
            "table has {} columns but the file header has {}",
            existing.len(),
            expected.len()
        ),
    };

    Err(PipelineError::Schema(format!(
        "Table {} does not match the input file: {}",
        table, detail
    )))
}

/// Whether `table` exists in the current schema
pub async fn table_exists(conn: &mut PgConnection, table: &str) -> PipelineResult<bool> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM information_schema.tables
        WHERE table_schema = current_schema()
          AND table_name = $1
        "#,
    )
    .bind(table)
    .fetch_one(&mut *conn)
    .await
    .map_err(PipelineError::schema)?;

    Ok(count > 0)
}

/// Column names of `table` in ordinal order
pub async fn table_columns(conn: &mut PgConnection, table: &str) -> PipelineResult<Vec<String>> {
    sqlx::query_scalar(
        r#"
        SELECT column_name::text
        FROM information_schema.columns
        WHERE table_schema = current_schema()
          AND table_name = $1
        ORDER BY ordinal_position
        "#,
    )
    .bind(table)
    .fetch_all(&mut *conn)
    .await
    .map_err(PipelineError::schema)
}

/// Make sure `table` exists with exactly `columns`
///
/// Returns the stored column names the loader must bind against.
pub async fn ensure_table(
    conn: &mut PgConnection,
    table: &str,
    columns: &[String],
) -> PipelineResult<Vec<String>> {
    if columns.is_empty() {
        return Err(PipelineError::Schema(
            "Input file header has no columns".to_string(),
        ));
    }

    let table = stored_identifier(table);
    let columns = stored_columns(table, columns)?;

    if table_exists(conn, table).await? {
        let existing = table_columns(conn, table).await?;
        check_columns(table, &existing, &columns)?;
        info!(table, "Table already exists - skipping creation");
    } else {
        sqlx::query(&create_table_sql(table, &columns))
            .execute(&mut *conn)
            .await
            .map_err(PipelineError::schema)?;
        info!(table, columns = columns.len(), "Created table");
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql("C_DUNS_V", &cols(&["NAME", "CITY"]));
        assert_eq!(
            sql,
            r#"CREATE TABLE "C_DUNS_V" ("NAME" VARCHAR(4000), "CITY" VARCHAR(4000))"#
        );
    }

    #[test]
    fn test_matching_columns_pass() {
        let columns = cols(&["NAME", "CITY"]);
        assert!(check_columns("C_DUNS_V", &columns, &columns).is_ok());
    }

    #[test]
    fn test_renamed_column_is_schema_error() {
        let err = check_columns("C_DUNS_V", &cols(&["NAME", "CITY"]), &cols(&["NAME", "TOWN"]))
            .unwrap_err();

        match err {
            PipelineError::Schema(msg) => {
                assert!(msg.contains("column 2"));
                assert!(msg.contains("CITY"));
                assert!(msg.contains("TOWN"));
            },
            other => panic!("expected Schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_extra_column_is_schema_error() {
        let err = check_columns("C_DUNS_V", &cols(&["NAME"]), &cols(&["NAME", "CITY"])).unwrap_err();

        match err {
            PipelineError::Schema(msg) => assert!(msg.contains("1 columns")),
            other => panic!("expected Schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_reordered_columns_are_schema_error() {
        assert!(check_columns(
            "C_DUNS_V",
            &cols(&["NAME", "CITY"]),
            &cols(&["CITY", "NAME"])
        )
        .is_err());
    }

    #[test]
    fn test_short_identifiers_are_stored_unchanged() {
        assert_eq!(stored_identifier("NAME"), "NAME");
        let exact = "A".repeat(ENGINE_IDENTIFIER_BYTES);
        assert_eq!(stored_identifier(&exact), exact);
    }

    #[test]
    fn test_long_identifier_is_cut_to_engine_limit() {
        let header = "CUSTOMER_PRIMARY_BUSINESS_ADDRESS_LINE_ONE_INCLUDING_SUITE_NUMBER_TEXT";
        assert_eq!(
            stored_identifier(header),
            "CUSTOMER_PRIMARY_BUSINESS_ADDRESS_LINE_ONE_INCLUDING_SUITE_NUMB"
        );
    }

    #[test]
    fn test_cut_respects_char_boundaries() {
        // 62 ASCII bytes then a two-byte char straddling the limit
        let name = format!("{}ÉX", "A".repeat(62));
        let stored = stored_identifier(&name);
        assert_eq!(stored.len(), 62);
        assert!(stored.chars().all(|c| c == 'A'));
    }

    #[test]
    fn test_stored_columns_matches_existing_long_table() {
        let header = cols(&[
            "ID",
            "CUSTOMER_PRIMARY_BUSINESS_ADDRESS_LINE_ONE_INCLUDING_SUITE_NUMBER_TEXT",
        ]);
        let existing = cols(&[
            "ID",
            "CUSTOMER_PRIMARY_BUSINESS_ADDRESS_LINE_ONE_INCLUDING_SUITE_NUMB",
        ]);

        let stored = stored_columns("C_DUNS_V", &header).unwrap();
        assert!(check_columns("C_DUNS_V", &existing, &stored).is_ok());
    }

    #[test]
    fn test_columns_colliding_after_cut_are_schema_error() {
        let prefix = "X".repeat(ENGINE_IDENTIFIER_BYTES);
        let header = vec![format!("{prefix}_ONE"), format!("{prefix}_TWO")];

        match stored_columns("C_DUNS_V", &header).unwrap_err() {
            PipelineError::Schema(msg) => assert!(msg.contains("columns 1 and 2")),
            other => panic!("expected Schema error, got {other:?}"),
        }
    }
}
