//! Measurement data model and the raw results file
//!
//! A session produces one [`RawResultSet`] holding a [`RunRecord`] per
//! attempted run; each record carries the [`MetricSample`]s collected in it.

mod record;
mod sample;
mod storage;

pub use record::{FailureCause, RunFailure, RunRecord, Stage};
pub use sample::{DuplicateMetric, MetricSample, Phase, SampleSet, Unit};
pub use storage::{
    RawResultSet, RawResultStore, StoreError, FORMAT_VERSION, RAW_RESULTS_FILE,
};
