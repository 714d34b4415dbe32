use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::{ListingSink, ListingSource};
use crate::error::{EtlError, Result};
use crate::types::{RawListing, TransformedListing};

/// In-memory source and sink for development/testing.
///
/// `insert_batch` enforces the primary key and keeps the all-or-nothing
/// contract: the batch is staged on a copy and only swapped in when every
/// row was accepted.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    source: Arc<Mutex<Vec<RawListing>>>,
    target: Arc<Mutex<HashMap<i64, TransformedListing>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(rows: Vec<RawListing>) -> Self {
        Self {
            source: Arc::new(Mutex::new(rows)),
            target: Arc::default(),
        }
    }

    /// Snapshot of the persisted rows, ordered by id
    pub fn persisted(&self) -> Result<Vec<TransformedListing>> {
        let target = lock(&self.target)?;
        let mut rows: Vec<_> = target.values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    pub fn persisted_count(&self) -> Result<usize> {
        Ok(lock(&self.target)?.len())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| EtlError::Database {
        message: "In-memory store lock poisoned".to_string(),
    })
}

#[async_trait]
impl ListingSource for InMemoryStore {
    async fn fetch_listings(&self, price_limit: f64) -> Result<Vec<RawListing>> {
        let source = lock(&self.source)?;
        let rows: Vec<RawListing> = source
            .iter()
            .filter(|r| r.price < price_limit)
            .cloned()
            .collect();
        debug!("Fetched {} in-memory rows with price < {}", rows.len(), price_limit);
        Ok(rows)
    }
}

#[async_trait]
impl ListingSink for InMemoryStore {
    async fn insert_batch(&self, rows: &[TransformedListing]) -> Result<usize> {
        let mut target = lock(&self.target)?;
        let mut staged = target.clone();

        for row in rows {
            if staged.insert(row.id, row.clone()).is_some() {
                return Err(EtlError::Database {
                    message: format!("UNIQUE constraint failed: id {}", row.id),
                });
            }
        }

        *target = staged;
        debug!("Committed {} in-memory rows", rows.len());
        Ok(rows.len())
    }
}
