use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

use super::processing::{transform_batch, TransformStats};
use super::retry::{retry_stage, RetryPolicy};
use super::{PipelineState, Stage};
use crate::error::{EtlError, Result};
use crate::storage::{ListingSink, ListingSource};

/// Attempts spent per stage in one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageAttempts {
    pub extract: u32,
    pub transform: u32,
    pub load: u32,
}

/// Outcome of a run that reached `End`
#[derive(Debug, Clone)]
pub struct RunReport {
    pub price_limit: f64,
    pub rows_extracted: usize,
    pub rows_loaded: usize,
    pub transform: TransformStats,
    pub attempts: StageAttempts,
    pub final_state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// Drives extract → transform → load, retrying each stage under the same
/// policy and stopping at the first stage that runs out of attempts.
pub struct StageRunner {
    source: Arc<dyn ListingSource>,
    sink: Arc<dyn ListingSink>,
    policy: RetryPolicy,
    price_limit: f64,
    is_retryable: fn(&EtlError) -> bool,
    state: PipelineState,
}

impl StageRunner {
    pub fn new(
        source: Arc<dyn ListingSource>,
        sink: Arc<dyn ListingSink>,
        policy: RetryPolicy,
        price_limit: f64,
    ) -> Self {
        Self {
            source,
            sink,
            policy,
            price_limit,
            is_retryable: EtlError::is_retryable,
            state: PipelineState::Start,
        }
    }

    /// Replace the classification of which errors earn another attempt
    pub fn with_retry_predicate(mut self, is_retryable: fn(&EtlError) -> bool) -> Self {
        self.is_retryable = is_retryable;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        info!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: EtlError) -> EtlError {
        error!("Pipeline failed: {}", err);
        self.transition(PipelineState::Failed);
        err
    }

    /// Execute one full run. Stages never overlap; a stage starts only after
    /// the previous one handed over its complete output.
    #[instrument(skip(self), fields(price_limit = self.price_limit))]
    pub async fn run(&mut self) -> Result<RunReport> {
        let started_at = Utc::now();
        self.state = PipelineState::Start;
        info!("Starting ETL run with price_limit={}", self.price_limit);
        println!("Starting ETL flow...");

        // Extract
        self.transition(PipelineState::Extract);
        println!("Extracting listings with price < {}...", self.price_limit);
        let t_stage = Instant::now();
        let source = Arc::clone(&self.source);
        let price_limit = self.price_limit;
        let extracted = retry_stage(&self.policy, Stage::Extract, self.is_retryable, |_| {
            let source = Arc::clone(&source);
            async move { source.fetch_listings(price_limit).await }
        })
        .await;
        histogram!("etl_stage_duration_seconds", "stage" => Stage::Extract.as_str())
            .record(t_stage.elapsed().as_secs_f64());
        let (raw, extract_attempts) = extracted.map_err(|e| self.fail(e))?;
        let rows_extracted = raw.len();
        info!("Extracted {} rows", rows_extracted);

        // Transform; every attempt restarts from the untouched raw batch
        self.transition(PipelineState::Transform);
        println!("Transforming {} listings...", rows_extracted);
        let t_stage = Instant::now();
        let transformed = retry_stage(&self.policy, Stage::Transform, self.is_retryable, |_| {
            let raw = raw.clone();
            async move { Ok(transform_batch(raw)) }
        })
        .await;
        histogram!("etl_stage_duration_seconds", "stage" => Stage::Transform.as_str())
            .record(t_stage.elapsed().as_secs_f64());
        let ((rows, transform_stats), transform_attempts) = transformed.map_err(|e| self.fail(e))?;
        drop(raw);

        // Load
        self.transition(PipelineState::Load);
        println!("Loading {} transformed listings...", rows.len());
        let t_stage = Instant::now();
        let sink = Arc::clone(&self.sink);
        let batch = rows.as_slice();
        let loaded = retry_stage(&self.policy, Stage::Load, self.is_retryable, |_| {
            let sink = Arc::clone(&sink);
            async move { sink.insert_batch(batch).await }
        })
        .await;
        histogram!("etl_stage_duration_seconds", "stage" => Stage::Load.as_str())
            .record(t_stage.elapsed().as_secs_f64());
        let (rows_loaded, load_attempts) = loaded.map_err(|e| self.fail(e))?;
        counter!("etl_rows_loaded_total").increment(rows_loaded as u64);

        self.transition(PipelineState::End);
        println!("Successfully loaded {} rows.", rows_loaded);
        println!("ETL process completed.");

        Ok(RunReport {
            price_limit,
            rows_extracted,
            rows_loaded,
            transform: transform_stats,
            attempts: StageAttempts {
                extract: extract_attempts,
                transform: transform_attempts,
                load: load_attempts,
            },
            final_state: self.state,
            started_at,
            completed_at: Utc::now(),
        })
    }
}
