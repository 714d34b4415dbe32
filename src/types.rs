use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// A listing row as read from the staging relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub id: i64,
    pub name: Option<String>,
    pub host_id: i64,
    pub host_name: Option<String>,
    pub neighbourhood_group: Option<String>,
    pub neighbourhood: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub room_type: Option<String>,
    pub price: f64,
    pub minimum_nights: i64,
    pub number_of_reviews: i64,
    /// Free-form review timestamp, parsed by the date normalizer
    pub last_review: Option<String>,
    pub reviews_per_month: Option<f64>,
    pub calculated_host_listings_count: i64,
    pub availability_365: i64,
}

/// A listing enriched for the analytics relation.
///
/// Created from a [`RawListing`] by the date normalizer, then annotated in
/// place by the aggregator and the imputer before it reaches the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedListing {
    pub id: i64,
    pub name: Option<String>,
    pub host_id: i64,
    pub host_name: Option<String>,
    pub neighbourhood_group: Option<String>,
    pub neighbourhood: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub room_type: Option<String>,
    pub price: f64,
    pub minimum_nights: i64,
    pub number_of_reviews: i64,
    pub review_date: Option<NaiveDate>,
    /// Only ever set together with `review_date`
    pub review_time: Option<NaiveTime>,
    /// May be `None` straight out of `from_raw`; `transform_batch` always
    /// leaves it `Some`, imputing 0 for missing values.
    pub reviews_per_month: Option<f64>,
    pub calculated_host_listings_count: i64,
    pub availability_365: i64,
    pub average_price_neighborhood: f64,
}

impl TransformedListing {
    /// Build a transformed row from a raw one with the review timestamp
    /// already decomposed. The neighbourhood average starts at zero.
    pub fn from_raw(
        raw: RawListing,
        review_date: Option<NaiveDate>,
        review_time: Option<NaiveTime>,
    ) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            host_id: raw.host_id,
            host_name: raw.host_name,
            neighbourhood_group: raw.neighbourhood_group,
            neighbourhood: raw.neighbourhood,
            latitude: raw.latitude,
            longitude: raw.longitude,
            room_type: raw.room_type,
            price: raw.price,
            minimum_nights: raw.minimum_nights,
            number_of_reviews: raw.number_of_reviews,
            review_date,
            review_time: review_date.and(review_time),
            reviews_per_month: raw.reviews_per_month,
            calculated_host_listings_count: raw.calculated_host_listings_count,
            availability_365: raw.availability_365,
            average_price_neighborhood: 0.0,
        }
    }
}
