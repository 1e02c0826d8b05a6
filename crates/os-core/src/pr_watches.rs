use crate::error::WatchError;
use crate::types::{ChecksState, CreatePrWatchInput, PrWatch, PrWatchId};
use chrono::{DateTime, Utc};

pub trait PrWatchRepository {
    fn create(&self, input: CreatePrWatchInput) -> Result<PrWatch, WatchError>;
    fn get(&self, id: &PrWatchId) -> Result<Option<PrWatch>, WatchError>;
    fn get_by_session(&self, session_id: &str) -> Result<Option<PrWatch>, WatchError>;
    fn list(&self) -> Result<Vec<PrWatch>, WatchError>;
    fn list_for_task(&self, task_id: &str) -> Result<Vec<PrWatch>, WatchError>;
    /// Moves a searching watch to tracking. Fails with `Conflict` when the
    /// watch already tracks a different pull request.
    fn set_pr_number(
        &self,
        id: &PrWatchId,
        pr_number: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<PrWatch, WatchError>;
    fn record_check(
        &self,
        id: &PrWatchId,
        checked_at: DateTime<Utc>,
        last_comment_at: Option<DateTime<Utc>>,
        last_check_status: ChecksState,
    ) -> Result<PrWatch, WatchError>;
    fn touch(&self, id: &PrWatchId, checked_at: DateTime<Utc>) -> Result<PrWatch, WatchError>;
    fn delete(&self, id: &PrWatchId) -> Result<(), WatchError>;
}
