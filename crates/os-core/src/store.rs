use crate::OverseerError;
use crate::pr_watches::PrWatchRepository;
use crate::review_watches::{ReviewPrTaskRepository, ReviewWatchRepository};
use crate::task_prs::TaskPrRepository;

pub trait Store {
    type PrWatches<'a>: PrWatchRepository
    where
        Self: 'a;
    type TaskPrs<'a>: TaskPrRepository
    where
        Self: 'a;
    type ReviewWatches<'a>: ReviewWatchRepository
    where
        Self: 'a;
    type ReviewPrTasks<'a>: ReviewPrTaskRepository
    where
        Self: 'a;

    fn pr_watches(&self) -> Self::PrWatches<'_>;
    fn task_prs(&self) -> Self::TaskPrs<'_>;
    fn review_watches(&self) -> Self::ReviewWatches<'_>;
    fn review_pr_tasks(&self) -> Self::ReviewPrTasks<'_>;

    fn with_tx<F, T>(&self, f: F) -> Result<T, OverseerError>
    where
        F: FnOnce(&Self) -> Result<T, OverseerError>;
}
