pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use error::{EtlError, Result};
pub use pipeline::{PipelineState, RetryPolicy, RunReport, Stage, StageRunner};
pub use types::{RawListing, TransformedListing};
