use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rusqlite::params;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use listings_etl::config::DatabaseConfig;
use listings_etl::storage::{ListingSink, SqliteStore};
use listings_etl::{
    EtlError, PipelineState, RawListing, Result, RetryPolicy, Stage, StageRunner, TransformedListing,
};

fn raw(id: i64, neighbourhood: &str, price: f64, last_review: Option<&str>) -> RawListing {
    RawListing {
        id,
        name: Some(format!("Cozy room {id}")),
        host_id: 500 + id,
        host_name: Some("Maria".to_string()),
        neighbourhood_group: Some("Brooklyn".to_string()),
        neighbourhood: Some(neighbourhood.to_string()),
        latitude: 40.68,
        longitude: -73.95,
        room_type: Some("Private room".to_string()),
        price,
        minimum_nights: 2,
        number_of_reviews: 12,
        last_review: last_review.map(str::to_string),
        reviews_per_month: if id % 2 == 0 { Some(1.25) } else { None },
        calculated_host_listings_count: 1,
        availability_365: 90,
    }
}

fn setup(dir: &TempDir, rows: &[RawListing]) -> SqliteStore {
    let config = DatabaseConfig {
        path: dir.path().join("listings.db"),
        ..DatabaseConfig::default()
    };
    let store = SqliteStore::new(&config).unwrap();
    store.ensure_source_table().unwrap();
    store.ensure_target_table().unwrap();

    let conn = store.open().unwrap();
    for r in rows {
        conn.execute(
            "INSERT INTO airbnb_nyc (id, name, host_id, host_name, neighbourhood_group, neighbourhood, \
             latitude, longitude, room_type, price, minimum_nights, number_of_reviews, last_review, \
             reviews_per_month, calculated_host_listings_count, availability_365) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                r.id,
                r.name,
                r.host_id,
                r.host_name,
                r.neighbourhood_group,
                r.neighbourhood,
                r.latitude,
                r.longitude,
                r.room_type,
                r.price,
                r.minimum_nights,
                r.number_of_reviews,
                r.last_review,
                r.reviews_per_month,
                r.calculated_host_listings_count,
                r.availability_365,
            ],
        )
        .unwrap();
    }
    store
}

fn staged_rows() -> Vec<RawListing> {
    vec![
        raw(1, "X", 10.0, Some("2019-05-21 00:00:00")),
        raw(2, "X", 20.0, Some("2019-05-21")),
        raw(3, "Y", 50.0, None),
        raw(4, "Y", 70.0, Some("last tuesday")),
        raw(5, "X", 300.0, Some("2019-06-01")),
    ]
}

type TargetRow = (i64, Option<String>, Option<String>, f64, f64);

fn target_rows(store: &SqliteStore) -> Vec<TargetRow> {
    let conn = store.open().unwrap();
    let mut stmt = conn
        .prepare(
            "SELECT id, review_date, review_time, reviews_per_month, average_price_neighborhood \
             FROM transformed_airbnb_nyc ORDER BY id",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)))
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap();
    rows
}

/// Sink that fails a fixed number of calls before delegating to SQLite
struct FlakySink {
    inner: SqliteStore,
    failures: u32,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl ListingSink for FlakySink {
    async fn insert_batch(&self, rows: &[TransformedListing]) -> Result<usize> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(EtlError::Transient {
                message: format!("connection lost during load (call {call})"),
            });
        }
        self.inner.insert_batch(rows).await
    }
}

#[tokio::test]
async fn test_end_to_end_run_against_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(setup(&dir, &staged_rows()));
    let mut runner = StageRunner::new(store.clone(), store.clone(), RetryPolicy::immediate(3), 100.0);

    let report = runner.run().await.unwrap();

    assert_eq!(report.final_state, PipelineState::End);
    assert_eq!(report.rows_extracted, 4);
    assert_eq!(report.rows_loaded, 4);
    assert_eq!(store.count_persisted(&[1, 2, 3, 4, 5]).unwrap(), 4);

    let rows = target_rows(&store);
    assert_eq!(
        rows,
        vec![
            (1, Some("2019-05-21".to_string()), Some("00:00:00".to_string()), 0.0, 15.0),
            (2, Some("2019-05-21".to_string()), None, 1.25, 15.0),
            (3, None, None, 0.0, 60.0),
            (4, None, None, 1.25, 60.0),
        ]
    );
}

#[tokio::test]
async fn test_load_succeeds_on_third_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let store = setup(&dir, &staged_rows());
    let calls = Arc::new(AtomicU32::new(0));
    let sink = FlakySink {
        inner: store.clone(),
        failures: 2,
        calls: calls.clone(),
    };

    let mut runner = StageRunner::new(
        Arc::new(store.clone()),
        Arc::new(sink),
        RetryPolicy::new(3, Duration::from_millis(5)),
        100.0,
    );

    let report = runner.run().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.attempts.load, 3);
    assert_eq!(report.rows_loaded, 4);
    assert_eq!(runner.state(), PipelineState::End);
    assert_eq!(store.count_persisted(&[1, 2, 3, 4]).unwrap(), 4);
}

#[tokio::test]
async fn test_load_exhaustion_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = setup(&dir, &staged_rows());

    // A row already holding id 4 makes every load attempt violate the key
    // after ids 1..3 were written inside the transaction.
    let blocker = TransformedListing {
        id: 4,
        name: None,
        host_id: 0,
        host_name: None,
        neighbourhood_group: None,
        neighbourhood: None,
        latitude: 0.0,
        longitude: 0.0,
        room_type: None,
        price: 1.0,
        minimum_nights: 1,
        number_of_reviews: 0,
        review_date: NaiveDate::from_ymd_opt(2020, 1, 1),
        review_time: NaiveTime::from_hms_opt(8, 0, 0),
        reviews_per_month: Some(0.0),
        calculated_host_listings_count: 1,
        availability_365: 0,
        average_price_neighborhood: 1.0,
    };
    store.insert_batch(std::slice::from_ref(&blocker)).await.unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let sink = FlakySink {
        inner: store.clone(),
        failures: 0,
        calls: calls.clone(),
    };
    let mut runner = StageRunner::new(
        Arc::new(store.clone()),
        Arc::new(sink),
        RetryPolicy::immediate(3),
        100.0,
    );

    let err = runner.run().await.unwrap_err();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(runner.state(), PipelineState::Failed);
    match &err {
        EtlError::StageFailed { stage, attempts, source } => {
            assert_eq!(*stage, Stage::Load);
            assert_eq!(*attempts, 3);
            assert!(source.to_string().contains("listing 4"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(store.count_persisted(&[1, 2, 3]).unwrap(), 0);
    let rows = target_rows(&store);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, 4);
}

#[tokio::test]
async fn test_missing_source_table_fails_extract() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("empty.db"),
        ..DatabaseConfig::default()
    };
    let store = SqliteStore::new(&config).unwrap();
    store.ensure_target_table().unwrap();
    let store = Arc::new(store);

    let mut runner = StageRunner::new(store.clone(), store.clone(), RetryPolicy::immediate(2), 100.0);
    let err = runner.run().await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(Stage::Extract));
    assert_eq!(runner.state(), PipelineState::Failed);
}

#[tokio::test]
async fn test_rerun_with_same_batch_is_rejected_whole() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(setup(&dir, &staged_rows()));

    let mut first = StageRunner::new(store.clone(), store.clone(), RetryPolicy::immediate(1), 100.0);
    first.run().await.unwrap();

    // Repeated runs are not deduplicated; the second load conflicts and
    // leaves the first run's rows untouched.
    let mut second = StageRunner::new(store.clone(), store.clone(), RetryPolicy::immediate(1), 100.0);
    let err = second.run().await.unwrap_err();

    assert_eq!(err.failed_stage(), Some(Stage::Load));
    assert_eq!(target_rows(&store).len(), 4);
}
