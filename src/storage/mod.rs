// Store ports used by the extract and load stages, plus their adapters

pub mod in_memory;
pub mod schema;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{RawListing, TransformedListing};

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Read side: the staging relation the extract stage pulls from
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch every staged listing with `price < price_limit`.
    async fn fetch_listings(&self, price_limit: f64) -> Result<Vec<RawListing>>;
}

/// Write side: the analytics relation the load stage persists into
#[async_trait]
pub trait ListingSink: Send + Sync {
    /// Insert the whole batch in one transaction and return the number of
    /// rows inserted. On any error nothing from the batch stays committed.
    async fn insert_batch(&self, rows: &[TransformedListing]) -> Result<usize>;
}
