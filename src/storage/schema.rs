use rusqlite::Connection;
use tracing::info;

use crate::constants::is_valid_table_name;
use crate::error::{EtlError, Result};

/// Column list of the analytics relation, in insert order
pub const TARGET_COLUMNS: [&str; 18] = [
    "id",
    "name",
    "host_id",
    "host_name",
    "neighbourhood_group",
    "neighbourhood",
    "latitude",
    "longitude",
    "room_type",
    "price",
    "minimum_nights",
    "number_of_reviews",
    "review_date",
    "review_time",
    "reviews_per_month",
    "calculated_host_listings_count",
    "availability_365",
    "average_price_neighborhood",
];

/// Column list read from the staging relation, in select order
pub const SOURCE_COLUMNS: [&str; 16] = [
    "id",
    "name",
    "host_id",
    "host_name",
    "neighbourhood_group",
    "neighbourhood",
    "latitude",
    "longitude",
    "room_type",
    "price",
    "minimum_nights",
    "number_of_reviews",
    "last_review",
    "reviews_per_month",
    "calculated_host_listings_count",
    "availability_365",
];

pub(crate) fn checked_table_name(table: &str) -> Result<&str> {
    if is_valid_table_name(table) {
        Ok(table)
    } else {
        Err(EtlError::Config(format!("Invalid table name '{table}'")))
    }
}

/// Create the analytics relation if it does not exist yet.
pub fn ensure_target_table(conn: &Connection, table: &str) -> Result<()> {
    let table = checked_table_name(table)?;
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id                              INTEGER PRIMARY KEY,
            name                            TEXT,
            host_id                         INTEGER,
            host_name                       TEXT,
            neighbourhood_group             TEXT,
            neighbourhood                   TEXT,
            latitude                        REAL,
            longitude                       REAL,
            room_type                       TEXT,
            price                           REAL,
            minimum_nights                  INTEGER,
            number_of_reviews               INTEGER,
            review_date                     TEXT,
            review_time                     TEXT,
            reviews_per_month               REAL,
            calculated_host_listings_count  INTEGER,
            availability_365                INTEGER,
            average_price_neighborhood      REAL
        );
        "#
    ))?;
    info!("Ensured target table '{}'", table);
    Ok(())
}

/// Create the staging relation if it does not exist yet. Normally the raw
/// copy step owns this table; local runs and tests create it here.
pub fn ensure_source_table(conn: &Connection, table: &str) -> Result<()> {
    let table = checked_table_name(table)?;
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id                              INTEGER,
            name                            TEXT,
            host_id                         INTEGER,
            host_name                       TEXT,
            neighbourhood_group             TEXT,
            neighbourhood                   TEXT,
            latitude                        REAL,
            longitude                       REAL,
            room_type                       TEXT,
            price                           REAL,
            minimum_nights                  INTEGER,
            number_of_reviews               INTEGER,
            last_review                     TEXT,
            reviews_per_month               REAL,
            calculated_host_listings_count  INTEGER,
            availability_365                INTEGER
        );
        "#
    ))?;
    info!("Ensured source table '{}'", table);
    Ok(())
}
