use crate::error::WatchError;
use crate::types::{
    CreateReviewWatchInput, RecordReviewPrTaskInput, ReviewPrTask, ReviewWatch, ReviewWatchId,
    UpdateReviewWatchInput,
};
use chrono::{DateTime, Utc};

pub trait ReviewWatchRepository {
    fn create(&self, input: CreateReviewWatchInput) -> Result<ReviewWatch, WatchError>;
    fn get(&self, id: &ReviewWatchId) -> Result<Option<ReviewWatch>, WatchError>;
    fn list_for_workspace(&self, workspace_id: &str) -> Result<Vec<ReviewWatch>, WatchError>;
    fn list_enabled(&self) -> Result<Vec<ReviewWatch>, WatchError>;
    fn update(
        &self,
        id: &ReviewWatchId,
        input: UpdateReviewWatchInput,
    ) -> Result<ReviewWatch, WatchError>;
    fn set_last_polled(
        &self,
        id: &ReviewWatchId,
        polled_at: DateTime<Utc>,
    ) -> Result<(), WatchError>;
    fn delete(&self, id: &ReviewWatchId) -> Result<(), WatchError>;
}

/// The dedup ledger. Rows are only ever inserted.
pub trait ReviewPrTaskRepository {
    /// Idempotent: recording an already-handled key returns the existing row.
    fn record(&self, input: RecordReviewPrTaskInput) -> Result<ReviewPrTask, WatchError>;
    fn exists(
        &self,
        review_watch_id: &ReviewWatchId,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<bool, WatchError>;
    fn list_for_watch(&self, review_watch_id: &ReviewWatchId)
        -> Result<Vec<ReviewPrTask>, WatchError>;
}
