// Pure in-memory transforms applied to one extracted batch

pub mod aggregate;
pub mod dates;
pub mod impute;

use tracing::info;

use crate::types::{RawListing, TransformedListing};

pub use aggregate::{annotate_average_prices, neighbourhood_average_prices};
pub use dates::{normalize_listing, normalize_review_timestamp};
pub use impute::impute_reviews_per_month;

/// Counters describing what a transform pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub rows: usize,
    pub with_review_date: usize,
    pub with_review_time: usize,
    pub neighbourhood_groups: usize,
    pub imputed_reviews_per_month: usize,
}

/// Normalize review timestamps, annotate neighbourhood averages and impute
/// missing `reviews_per_month`, in that order.
pub fn transform_batch(raw: Vec<RawListing>) -> (Vec<TransformedListing>, TransformStats) {
    let mut rows: Vec<TransformedListing> = raw.into_iter().map(normalize_listing).collect();

    let neighbourhood_groups = annotate_average_prices(&mut rows);
    let imputed_reviews_per_month = impute_reviews_per_month(&mut rows);

    let stats = TransformStats {
        rows: rows.len(),
        with_review_date: rows.iter().filter(|r| r.review_date.is_some()).count(),
        with_review_time: rows.iter().filter(|r| r.review_time.is_some()).count(),
        neighbourhood_groups,
        imputed_reviews_per_month,
    };

    info!(
        "Transformed {} rows ({} with review date, {} neighbourhoods, {} imputed)",
        stats.rows, stats.with_review_date, stats.neighbourhood_groups, stats.imputed_reviews_per_month
    );

    (rows, stats)
}
