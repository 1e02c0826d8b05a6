use crate::util::{from_rfc3339, from_sql_int, sql_err, to_rfc3339, to_sql_int};
use chrono::Utc;
use os_core::error::WatchError;
use os_core::review_watches::ReviewPrTaskRepository;
use os_core::types::{RecordReviewPrTaskInput, ReviewPrTask, ReviewPrTaskId, ReviewWatchId};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str =
    "id, review_watch_id, owner, repo, pr_number, pr_url, task_id, created_at";

pub struct ReviewPrTaskRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ReviewPrTaskRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn find(
        &self,
        review_watch_id: &ReviewWatchId,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Option<ReviewPrTask>, WatchError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM review_pr_tasks WHERE review_watch_id = ?1 AND owner = ?2 AND repo = ?3 AND pr_number = ?4"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let raw = stmt
            .query_row(
                params![review_watch_id.as_str(), owner, repo, to_sql_int(pr_number)?],
                read_row,
            )
            .optional()
            .map_err(sql_err)?;
        raw.map(map_review_pr_task_row).transpose()
    }
}

impl ReviewPrTaskRepository for ReviewPrTaskRepo<'_> {
    fn record(&self, input: RecordReviewPrTaskInput) -> Result<ReviewPrTask, WatchError> {
        if let Some(existing) =
            self.find(&input.review_watch_id, &input.owner, &input.repo, input.pr_number)?
        {
            return Ok(existing);
        }
        let entry = ReviewPrTask {
            id: ReviewPrTaskId::generate(),
            review_watch_id: input.review_watch_id,
            owner: input.owner,
            repo: input.repo,
            pr_number: input.pr_number,
            pr_url: input.pr_url,
            task_id: input.task_id,
            created_at: Utc::now(),
        };
        let sql = format!(
            "INSERT INTO review_pr_tasks ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
        );
        self.conn
            .execute(
                &sql,
                params![
                    entry.id.as_str(),
                    entry.review_watch_id.as_str(),
                    entry.owner,
                    entry.repo,
                    to_sql_int(entry.pr_number)?,
                    entry.pr_url,
                    entry.task_id,
                    to_rfc3339(&entry.created_at),
                ],
            )
            .map_err(sql_err)?;
        Ok(entry)
    }

    fn exists(
        &self,
        review_watch_id: &ReviewWatchId,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<bool, WatchError> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM review_pr_tasks WHERE review_watch_id = ?1 AND owner = ?2 AND repo = ?3 AND pr_number = ?4)",
                params![review_watch_id.as_str(), owner, repo, to_sql_int(pr_number)?],
                |row| row.get(0),
            )
            .map_err(sql_err)
    }

    fn list_for_watch(
        &self,
        review_watch_id: &ReviewWatchId,
    ) -> Result<Vec<ReviewPrTask>, WatchError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM review_pr_tasks WHERE review_watch_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let rows = stmt
            .query_map([review_watch_id.as_str()], read_row)
            .map_err(sql_err)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(map_review_pr_task_row(row.map_err(sql_err)?)?);
        }
        Ok(entries)
    }
}

struct RawReviewPrTask {
    id: String,
    review_watch_id: String,
    owner: String,
    repo: String,
    pr_number: i64,
    pr_url: String,
    task_id: String,
    created_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawReviewPrTask> {
    Ok(RawReviewPrTask {
        id: row.get(0)?,
        review_watch_id: row.get(1)?,
        owner: row.get(2)?,
        repo: row.get(3)?,
        pr_number: row.get(4)?,
        pr_url: row.get(5)?,
        task_id: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn map_review_pr_task_row(raw: RawReviewPrTask) -> Result<ReviewPrTask, WatchError> {
    let backend = |err: os_core::types::IdError| WatchError::Backend {
        reason: err.to_string(),
    };
    Ok(ReviewPrTask {
        id: ReviewPrTaskId::new(raw.id).map_err(backend)?,
        review_watch_id: ReviewWatchId::new(raw.review_watch_id).map_err(backend)?,
        owner: raw.owner,
        repo: raw.repo,
        pr_number: from_sql_int(raw.pr_number)?,
        pr_url: raw.pr_url,
        task_id: raw.task_id,
        created_at: from_rfc3339(&raw.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review_watch_repo::ReviewWatchRepo;
    use crate::schema::with_test_db;
    use os_core::review_watches::ReviewWatchRepository;
    use os_core::types::{CreateReviewWatchInput, ReviewWatch};

    fn watch(conn: &Connection) -> ReviewWatch {
        ReviewWatchRepo::new(conn)
            .create(CreateReviewWatchInput {
                workspace_id: "ws_1".to_string(),
                workflow_id: "wf".to_string(),
                workflow_step_id: "step".to_string(),
                repos: Vec::new(),
                review_scope: None,
                custom_query: None,
                agent_profile_id: None,
                executor_profile_id: None,
                prompt: None,
                enabled: None,
                poll_interval_seconds: None,
            })
            .unwrap()
    }

    fn input(watch: &ReviewWatch, pr_number: u64, task: &str) -> RecordReviewPrTaskInput {
        RecordReviewPrTaskInput {
            review_watch_id: watch.id.clone(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            pr_number,
            pr_url: format!("https://github.com/acme/widgets/pull/{pr_number}"),
            task_id: task.to_string(),
        }
    }

    #[test]
    fn recording_twice_keeps_first_entry() {
        let conn = with_test_db().unwrap();
        let watch = watch(&conn);
        let repo = ReviewPrTaskRepo::new(&conn);

        let first = repo.record(input(&watch, 3, "task_a")).unwrap();
        let second = repo.record(input(&watch, 3, "task_b")).unwrap();

        assert_eq!(second, first);
        assert_eq!(repo.list_for_watch(&watch.id).unwrap().len(), 1);
        assert!(repo.exists(&watch.id, "acme", "widgets", 3).unwrap());
        assert!(!repo.exists(&watch.id, "acme", "widgets", 4).unwrap());
    }

    #[test]
    fn ledger_rows_follow_their_watch() {
        let conn = with_test_db().unwrap();
        let watch = watch(&conn);
        let repo = ReviewPrTaskRepo::new(&conn);
        repo.record(input(&watch, 3, "task_a")).unwrap();

        ReviewWatchRepo::new(&conn).delete(&watch.id).unwrap();
        assert!(repo.list_for_watch(&watch.id).unwrap().is_empty());
    }

    #[test]
    fn unknown_watch_is_rejected() {
        let conn = with_test_db().unwrap();
        let repo = ReviewPrTaskRepo::new(&conn);
        let orphan = RecordReviewPrTaskInput {
            review_watch_id: ReviewWatchId::generate(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            pr_number: 1,
            pr_url: String::new(),
            task_id: "task".to_string(),
        };
        assert!(matches!(
            repo.record(orphan),
            Err(WatchError::NotFound)
        ));
    }

    #[test]
    fn large_pr_numbers_are_matched_exactly() {
        let conn = with_test_db().unwrap();
        let watch = watch(&conn);
        let repo = ReviewPrTaskRepo::new(&conn);
        let big = u64::try_from(i64::MAX).unwrap();

        let entry = repo.record(input(&watch, big, "task_a")).unwrap();
        assert_eq!(entry.pr_number, big);
        assert!(repo.exists(&watch.id, "acme", "widgets", big).unwrap());
        assert!(repo.record(input(&watch, u64::MAX, "task_b")).is_err());
        assert!(repo.exists(&watch.id, "acme", "widgets", u64::MAX).is_err());
    }
}
