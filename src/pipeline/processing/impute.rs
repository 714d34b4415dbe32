use crate::types::TransformedListing;

/// Value used when a listing has no `reviews_per_month`
pub const DEFAULT_REVIEWS_PER_MONTH: f64 = 0.0;

/// Fill missing `reviews_per_month` values. Returns how many rows were filled.
pub fn impute_reviews_per_month(rows: &mut [TransformedListing]) -> usize {
    let mut filled = 0;
    for row in rows.iter_mut().filter(|r| r.reviews_per_month.is_none()) {
        row.reviews_per_month = Some(DEFAULT_REVIEWS_PER_MONTH);
        filled += 1;
    }
    filled
}
