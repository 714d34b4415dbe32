use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::constants::{REVIEW_DATE_FORMAT, REVIEW_TIMESTAMP_FORMAT};
use crate::types::{RawListing, TransformedListing};

/// Decompose a free-form `last_review` value into a date and a time.
///
/// A full `YYYY-MM-DD HH:MM:SS` timestamp yields both parts, a bare
/// `YYYY-MM-DD` date yields only the date, and anything else (including an
/// absent or empty value) yields neither. Never fails.
pub fn normalize_review_timestamp(raw: Option<&str>) -> (Option<NaiveDate>, Option<NaiveTime>) {
    // chrono skips leading whitespace and accepts a signed year; both must
    // be rejected here.
    let Some(raw) = raw.filter(|s| s.starts_with(|c: char| c.is_ascii_digit())) else {
        return (None, None);
    };

    if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, REVIEW_TIMESTAMP_FORMAT) {
        // Second 60 parses as a leap second, which is not a valid wall time
        if timestamp.time().nanosecond() >= 1_000_000_000 {
            return (None, None);
        }
        return (Some(timestamp.date()), Some(timestamp.time()));
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, REVIEW_DATE_FORMAT) {
        return (Some(date), None);
    }

    (None, None)
}

/// Convert a raw row into its transformed form, consuming the raw timestamp.
pub fn normalize_listing(raw: RawListing) -> TransformedListing {
    let (review_date, review_time) = normalize_review_timestamp(raw.last_review.as_deref());
    TransformedListing::from_raw(raw, review_date, review_time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_full_timestamp_is_decomposed() {
        assert_eq!(
            normalize_review_timestamp(Some("2019-05-21 00:00:00")),
            (Some(date(2019, 5, 21)), Some(time(0, 0, 0)))
        );
        assert_eq!(
            normalize_review_timestamp(Some("2018-12-31 23:59:58")),
            (Some(date(2018, 12, 31)), Some(time(23, 59, 58)))
        );
    }

    #[test]
    fn test_date_only_has_no_time() {
        assert_eq!(
            normalize_review_timestamp(Some("2019-05-21")),
            (Some(date(2019, 5, 21)), None)
        );
    }

    #[test]
    fn test_absent_or_empty_is_null() {
        assert_eq!(normalize_review_timestamp(None), (None, None));
        assert_eq!(normalize_review_timestamp(Some("")), (None, None));
    }

    #[test]
    fn test_malformed_values_are_absorbed() {
        for raw in [
            "not a date",
            "21/05/2019",
            "2019-13-01",
            "2019-02-30",
            "2019-05-21T10:00:00",
            "2019-05-21 25:00:00",
            "2019-05-21 10:00",
            "   ",
            " 2019-05-21",
            "+2019-05-21",
            "-2019-05-21",
            "\t2019-05-21 10:00:00",
            "2019-05-21 10:00:60",
        ] {
            assert_eq!(normalize_review_timestamp(Some(raw)), (None, None), "input: {raw:?}");
        }
    }

    #[test]
    fn test_normalize_listing_carries_fields() {
        let raw = RawListing {
            id: 2539,
            name: Some("Clean & quiet apt home by the park".to_string()),
            host_id: 2787,
            host_name: Some("John".to_string()),
            neighbourhood_group: Some("Brooklyn".to_string()),
            neighbourhood: Some("Kensington".to_string()),
            latitude: 40.64749,
            longitude: -73.97237,
            room_type: Some("Private room".to_string()),
            price: 149.0,
            minimum_nights: 1,
            number_of_reviews: 9,
            last_review: Some("2018-10-19".to_string()),
            reviews_per_month: Some(0.21),
            calculated_host_listings_count: 6,
            availability_365: 365,
        };

        let row = normalize_listing(raw);
        assert_eq!(row.id, 2539);
        assert_eq!(row.neighbourhood.as_deref(), Some("Kensington"));
        assert_eq!(row.review_date, Some(date(2018, 10, 19)));
        assert_eq!(row.review_time, None);
        assert_eq!(row.reviews_per_month, Some(0.21));
        assert_eq!(row.average_price_neighborhood, 0.0);
    }
}
