/// Relation and default constants shared by the store adapters and config.

// Relations
pub const SOURCE_TABLE: &str = "airbnb_nyc";
pub const TARGET_TABLE: &str = "transformed_airbnb_nyc";

// Pipeline defaults
pub const DEFAULT_DATABASE_PATH: &str = "data/listings.db";
pub const DEFAULT_PRICE_LIMIT: f64 = 100.0;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

// Timestamp layouts accepted for `last_review`, tried in order
pub const REVIEW_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const REVIEW_DATE_FORMAT: &str = "%Y-%m-%d";
pub const REVIEW_TIME_FORMAT: &str = "%H:%M:%S";

/// Validate that a relation name is a plain SQL identifier before it is
/// interpolated into a statement.
pub fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
