use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row, Transaction};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{checked_table_name, SOURCE_COLUMNS, TARGET_COLUMNS};
use super::{ListingSink, ListingSource};
use crate::config::DatabaseConfig;
use crate::constants::{REVIEW_DATE_FORMAT, REVIEW_TIME_FORMAT};
use crate::error::{EtlError, Result};
use crate::types::{RawListing, TransformedListing};

// Stay well below SQLite's bound-parameter limit when verifying ids
const VERIFY_CHUNK_SIZE: usize = 500;

/// SQLite-backed source and sink.
///
/// Every call opens its own connection and drops it before returning, so no
/// connection is ever shared between stages or between retry attempts.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    source_table: String,
    target_table: String,
}

impl SqliteStore {
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            path: config.path.clone(),
            source_table: checked_table_name(&config.source_table)?.to_string(),
            target_table: checked_table_name(&config.target_table)?.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a read-write connection, creating the database file if needed.
    pub fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Connection::open(&self.path).map_err(|e| EtlError::Database {
            message: format!("Failed to open '{}': {e}", self.path.display()),
        })
    }

    fn open_read_only(&self) -> Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| EtlError::Database {
            message: format!("Failed to open '{}' read-only: {e}", self.path.display()),
        })
    }

    /// Create the target relation if absent. Used by provisioning, never by
    /// the load stage itself.
    pub fn ensure_target_table(&self) -> Result<()> {
        let conn = self.open()?;
        super::schema::ensure_target_table(&conn, &self.target_table)
    }

    pub fn ensure_source_table(&self) -> Result<()> {
        let conn = self.open()?;
        super::schema::ensure_source_table(&conn, &self.source_table)
    }

    /// Count target rows whose id belongs to `ids`.
    pub fn count_persisted(&self, ids: &[i64]) -> Result<usize> {
        let conn = self.open()?;
        count_ids(&conn, &self.target_table, ids)
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE price < ?1",
            SOURCE_COLUMNS.join(", "),
            self.source_table
        )
    }

    fn insert_sql(&self) -> String {
        let placeholders: Vec<String> = (1..=TARGET_COLUMNS.len()).map(|i| format!("?{i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.target_table,
            TARGET_COLUMNS.join(", "),
            placeholders.join(", ")
        )
    }

    fn insert_rows(&self, tx: &Transaction<'_>, rows: &[TransformedListing]) -> Result<usize> {
        let mut stmt = tx.prepare(&self.insert_sql())?;
        let mut inserted = 0;
        for row in rows {
            let review_date = row
                .review_date
                .map(|d| d.format(REVIEW_DATE_FORMAT).to_string());
            let review_time = row
                .review_time
                .map(|t| t.format(REVIEW_TIME_FORMAT).to_string());

            inserted += stmt
                .execute(params![
                    row.id,
                    row.name,
                    row.host_id,
                    row.host_name,
                    row.neighbourhood_group,
                    row.neighbourhood,
                    row.latitude,
                    row.longitude,
                    row.room_type,
                    row.price,
                    row.minimum_nights,
                    row.number_of_reviews,
                    review_date,
                    review_time,
                    row.reviews_per_month,
                    row.calculated_host_listings_count,
                    row.availability_365,
                    row.average_price_neighborhood,
                ])
                .map_err(|e| EtlError::Database {
                    message: format!("Failed to insert listing {}: {e}", row.id),
                })?;
        }
        Ok(inserted)
    }

    fn load_blocking(&self, rows: &[TransformedListing]) -> Result<usize> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        let inserted = match self.insert_rows(&tx, rows) {
            Ok(n) => n,
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    warn!("Rollback after failed insert also failed: {}", rb);
                } else {
                    warn!("Rolled back load of {} rows: {}", rows.len(), e);
                }
                return Err(e);
            }
        };

        tx.commit().map_err(|e| EtlError::Database {
            message: format!("Failed to commit load transaction: {e}"),
        })?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        verify_committed(&conn, &self.target_table, &ids, inserted);
        info!("Committed {} rows into '{}'", inserted, self.target_table);
        Ok(inserted)
    }

    fn fetch_blocking(&self, price_limit: f64) -> Result<Vec<RawListing>> {
        let conn = self.open_read_only()?;
        let mut stmt = conn.prepare(&self.select_sql())?;
        let listings = stmt
            .query_map(params![price_limit], raw_listing_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(
            "Fetched {} rows from '{}' with price < {}",
            listings.len(),
            self.source_table,
            price_limit
        );
        Ok(listings)
    }
}

fn raw_listing_from_row(row: &Row<'_>) -> rusqlite::Result<RawListing> {
    Ok(RawListing {
        id: row.get(0)?,
        name: row.get(1)?,
        host_id: row.get(2)?,
        host_name: row.get(3)?,
        neighbourhood_group: row.get(4)?,
        neighbourhood: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        room_type: row.get(8)?,
        price: row.get(9)?,
        minimum_nights: row.get(10)?,
        number_of_reviews: row.get(11)?,
        last_review: row.get(12)?,
        reviews_per_month: row.get(13)?,
        calculated_host_listings_count: row.get(14)?,
        availability_365: row.get(15)?,
    })
}

/// Recount the batch ids after commit. The rows are already durable, so a
/// failed or mismatched count is only logged and never fails the load.
fn verify_committed(conn: &Connection, table: &str, ids: &[i64], inserted: usize) -> Option<usize> {
    match count_ids(conn, table, ids) {
        Ok(verified) => {
            if verified != inserted {
                warn!(
                    "Committed {} rows but found {} of the batch in '{}'",
                    inserted, verified, table
                );
            }
            Some(verified)
        }
        Err(e) => {
            warn!("Could not verify {} committed rows in '{}': {}", inserted, table, e);
            None
        }
    }
}

fn count_ids(conn: &Connection, table: &str, ids: &[i64]) -> Result<usize> {
    let mut total = 0usize;
    for chunk in ids.chunks(VERIFY_CHUNK_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE id IN ({placeholders})");
        let count: i64 = conn.query_row(&sql, params_from_iter(chunk.iter()), |row| row.get(0))?;
        total += count as usize;
    }
    Ok(total)
}

#[async_trait]
impl ListingSource for SqliteStore {
    async fn fetch_listings(&self, price_limit: f64) -> Result<Vec<RawListing>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.fetch_blocking(price_limit)).await?
    }
}

#[async_trait]
impl ListingSink for SqliteStore {
    async fn insert_batch(&self, rows: &[TransformedListing]) -> Result<usize> {
        let store = self.clone();
        let rows = rows.to_vec();
        tokio::task::spawn_blocking(move || store.load_blocking(&rows)).await?
    }
}
