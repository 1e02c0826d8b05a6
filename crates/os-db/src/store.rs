use os_core::error::{OverseerError, WatchError};
use os_core::store::Store;
use rusqlite::Connection;

use crate::pr_watch_repo::PrWatchRepo;
use crate::review_pr_task_repo::ReviewPrTaskRepo;
use crate::review_watch_repo::ReviewWatchRepo;
use crate::task_pr_repo::TaskPrRepo;

pub struct DbStore {
    conn: Connection,
}

impl DbStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn batch(&self, sql: &str) -> Result<(), OverseerError> {
        self.conn.execute_batch(sql).map_err(|err| {
            OverseerError::Watch(WatchError::Backend {
                reason: err.to_string(),
            })
        })
    }
}

impl Store for DbStore {
    type PrWatches<'a>
        = PrWatchRepo<'a>
    where
        Self: 'a;
    type TaskPrs<'a>
        = TaskPrRepo<'a>
    where
        Self: 'a;
    type ReviewWatches<'a>
        = ReviewWatchRepo<'a>
    where
        Self: 'a;
    type ReviewPrTasks<'a>
        = ReviewPrTaskRepo<'a>
    where
        Self: 'a;

    fn pr_watches(&self) -> Self::PrWatches<'_> {
        PrWatchRepo::new(&self.conn)
    }

    fn task_prs(&self) -> Self::TaskPrs<'_> {
        TaskPrRepo::new(&self.conn)
    }

    fn review_watches(&self) -> Self::ReviewWatches<'_> {
        ReviewWatchRepo::new(&self.conn)
    }

    fn review_pr_tasks(&self) -> Self::ReviewPrTasks<'_> {
        ReviewPrTaskRepo::new(&self.conn)
    }

    fn with_tx<F, T>(&self, f: F) -> Result<T, OverseerError>
    where
        F: FnOnce(&Self) -> Result<T, OverseerError>,
    {
        self.batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.batch("COMMIT")?;
                Ok(value)
            }
            Err(err) => {
                self.batch("ROLLBACK")?;
                Err(err)
            }
        }
    }
}
