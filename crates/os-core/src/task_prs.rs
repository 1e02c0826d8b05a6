use crate::error::WatchError;
use crate::types::{TaskPr, UpsertTaskPrInput};

pub trait TaskPrRepository {
    /// Inserts or wholesale-replaces the row keyed by `(task_id, pr_number)`.
    fn upsert(&self, input: UpsertTaskPrInput) -> Result<TaskPr, WatchError>;
    fn get(&self, task_id: &str, pr_number: u64) -> Result<Option<TaskPr>, WatchError>;
    fn list_for_task(&self, task_id: &str) -> Result<Vec<TaskPr>, WatchError>;
}
