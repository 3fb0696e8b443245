//! SQLite schema for scored reviews
//!
//! One table per product ID:
//! - text: review body as scraped
//! - actual: star rating given by the reviewer
//! - prediction: score returned by the rating model

use rusqlite::{Connection, Result};

/// Quote a product ID for use as a table name.
///
/// IDs are used verbatim as table names; quoting keeps arbitrary IDs from
/// being interpreted as SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Create the product's table if it does not exist yet
pub fn ensure_product_table(conn: &Connection, product_id: &str) -> Result<()> {
    conn.execute(
        &format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                text TEXT NOT NULL,
                actual INTEGER NOT NULL,
                prediction REAL NOT NULL
            )
            "#,
            quote_identifier(product_id)
        ),
        [],
    )?;
    Ok(())
}

/// Names of all product tables
pub fn product_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>>>()?;
    Ok(names)
}
