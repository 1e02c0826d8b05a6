use crate::util::{
    decode_enum, encode_enum, from_rfc3339, from_sql_int, opt_from_rfc3339, opt_to_rfc3339,
    sql_err, to_rfc3339, to_sql_int,
};
use chrono::Utc;
use os_core::error::WatchError;
use os_core::task_prs::TaskPrRepository;
use os_core::types::{TaskPr, TaskPrId, UpsertTaskPrInput};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, task_id, owner, repo, pr_number, pr_url, title, head_branch, base_branch, author, state, review_state, checks_state, review_count, pending_review_count, comment_count, additions, deletions, merged_at, closed_at, created_at, updated_at";

pub struct TaskPrRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> TaskPrRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl TaskPrRepository for TaskPrRepo<'_> {
    fn upsert(&self, input: UpsertTaskPrInput) -> Result<TaskPr, WatchError> {
        let now = to_rfc3339(&Utc::now());
        // id and created_at belong to the first insert; everything else is replaced.
        let sql = format!(
            "INSERT INTO task_prs ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?21) \
             ON CONFLICT (task_id, pr_number) DO UPDATE SET \
             owner = excluded.owner, repo = excluded.repo, pr_url = excluded.pr_url, title = excluded.title, \
             head_branch = excluded.head_branch, base_branch = excluded.base_branch, author = excluded.author, \
             state = excluded.state, review_state = excluded.review_state, checks_state = excluded.checks_state, \
             review_count = excluded.review_count, pending_review_count = excluded.pending_review_count, \
             comment_count = excluded.comment_count, additions = excluded.additions, deletions = excluded.deletions, \
             merged_at = excluded.merged_at, closed_at = excluded.closed_at, updated_at = excluded.updated_at"
        );
        self.conn
            .execute(
                &sql,
                params![
                    TaskPrId::generate().as_str(),
                    input.task_id,
                    input.owner,
                    input.repo,
                    to_sql_int(input.pr_number)?,
                    input.pr_url,
                    input.title,
                    input.head_branch,
                    input.base_branch,
                    input.author,
                    encode_enum(&input.state)?,
                    encode_enum(&input.review_state)?,
                    encode_enum(&input.checks_state)?,
                    input.review_count,
                    input.pending_review_count,
                    input.comment_count,
                    to_sql_int(input.additions)?,
                    to_sql_int(input.deletions)?,
                    opt_to_rfc3339(input.merged_at.as_ref()),
                    opt_to_rfc3339(input.closed_at.as_ref()),
                    now,
                ],
            )
            .map_err(sql_err)?;
        self.get(&input.task_id, input.pr_number)?
            .ok_or(WatchError::NotFound)
    }

    fn get(&self, task_id: &str, pr_number: u64) -> Result<Option<TaskPr>, WatchError> {
        let sql = format!("SELECT {COLUMNS} FROM task_prs WHERE task_id = ?1 AND pr_number = ?2");
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let raw = stmt
            .query_row(params![task_id, to_sql_int(pr_number)?], read_row)
            .optional()
            .map_err(sql_err)?;
        raw.map(map_task_pr_row).transpose()
    }

    fn list_for_task(&self, task_id: &str) -> Result<Vec<TaskPr>, WatchError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM task_prs WHERE task_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let rows = stmt.query_map([task_id], read_row).map_err(sql_err)?;
        let mut task_prs = Vec::new();
        for row in rows {
            task_prs.push(map_task_pr_row(row.map_err(sql_err)?)?);
        }
        Ok(task_prs)
    }
}

struct RawTaskPr {
    id: String,
    task_id: String,
    owner: String,
    repo: String,
    pr_number: i64,
    pr_url: String,
    title: String,
    head_branch: String,
    base_branch: String,
    author: String,
    state: String,
    review_state: String,
    checks_state: String,
    review_count: u32,
    pending_review_count: u32,
    comment_count: u32,
    additions: i64,
    deletions: i64,
    merged_at: Option<String>,
    closed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawTaskPr> {
    Ok(RawTaskPr {
        id: row.get(0)?,
        task_id: row.get(1)?,
        owner: row.get(2)?,
        repo: row.get(3)?,
        pr_number: row.get(4)?,
        pr_url: row.get(5)?,
        title: row.get(6)?,
        head_branch: row.get(7)?,
        base_branch: row.get(8)?,
        author: row.get(9)?,
        state: row.get(10)?,
        review_state: row.get(11)?,
        checks_state: row.get(12)?,
        review_count: row.get(13)?,
        pending_review_count: row.get(14)?,
        comment_count: row.get(15)?,
        additions: row.get(16)?,
        deletions: row.get(17)?,
        merged_at: row.get(18)?,
        closed_at: row.get(19)?,
        created_at: row.get(20)?,
        updated_at: row.get(21)?,
    })
}

fn map_task_pr_row(raw: RawTaskPr) -> Result<TaskPr, WatchError> {
    let id = TaskPrId::new(raw.id).map_err(|err| WatchError::Backend {
        reason: err.to_string(),
    })?;
    Ok(TaskPr {
        id,
        task_id: raw.task_id,
        owner: raw.owner,
        repo: raw.repo,
        pr_number: from_sql_int(raw.pr_number)?,
        pr_url: raw.pr_url,
        title: raw.title,
        head_branch: raw.head_branch,
        base_branch: raw.base_branch,
        author: raw.author,
        state: decode_enum(&raw.state)?,
        review_state: decode_enum(&raw.review_state)?,
        checks_state: decode_enum(&raw.checks_state)?,
        review_count: raw.review_count,
        pending_review_count: raw.pending_review_count,
        comment_count: raw.comment_count,
        additions: from_sql_int(raw.additions)?,
        deletions: from_sql_int(raw.deletions)?,
        merged_at: opt_from_rfc3339(raw.merged_at)?,
        closed_at: opt_from_rfc3339(raw.closed_at)?,
        created_at: from_rfc3339(&raw.created_at)?,
        updated_at: from_rfc3339(&raw.updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use os_core::types::{ChecksState, PrState, ReviewSummary};

    fn input(task: &str, pr_number: u64) -> UpsertTaskPrInput {
        UpsertTaskPrInput {
            task_id: task.to_string(),
            owner: "acme".to_string(),
            repo: "widgets".to_string(),
            pr_number,
            pr_url: format!("https://github.com/acme/widgets/pull/{pr_number}"),
            title: "Add widgets".to_string(),
            head_branch: "feature-x".to_string(),
            base_branch: "main".to_string(),
            author: "octocat".to_string(),
            state: PrState::Open,
            review_state: ReviewSummary::None,
            checks_state: ChecksState::None,
            review_count: 0,
            pending_review_count: 0,
            comment_count: 0,
            additions: 10,
            deletions: 2,
            merged_at: None,
            closed_at: None,
        }
    }

    #[test]
    fn upsert_replaces_summary_but_keeps_identity() {
        let conn = with_test_db().unwrap();
        let repo = TaskPrRepo::new(&conn);
        let first = repo.upsert(input("task_1", 7)).unwrap();

        let merged_at = Utc::now();
        let second = repo
            .upsert(UpsertTaskPrInput {
                state: PrState::Merged,
                review_state: ReviewSummary::Approved,
                checks_state: ChecksState::Success,
                review_count: 2,
                comment_count: 5,
                merged_at: Some(merged_at),
                ..input("task_1", 7)
            })
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.state, PrState::Merged);
        assert_eq!(second.review_state, ReviewSummary::Approved);
        assert_eq!(second.checks_state, ChecksState::Success);
        assert_eq!(second.comment_count, 5);
        assert_eq!(second.merged_at, Some(merged_at));
        assert_eq!(repo.list_for_task("task_1").unwrap().len(), 1);
    }

    #[test]
    fn one_row_per_task_and_number() {
        let conn = with_test_db().unwrap();
        let repo = TaskPrRepo::new(&conn);
        repo.upsert(input("task_1", 7)).unwrap();
        repo.upsert(input("task_1", 8)).unwrap();
        repo.upsert(input("task_2", 7)).unwrap();

        let numbers: Vec<u64> = repo
            .list_for_task("task_1")
            .unwrap()
            .iter()
            .map(|task_pr| task_pr.pr_number)
            .collect();
        assert_eq!(numbers, vec![7, 8]);
        assert!(repo.get("task_2", 8).unwrap().is_none());
    }

    #[test]
    fn large_counts_survive_storage() {
        let conn = with_test_db().unwrap();
        let repo = TaskPrRepo::new(&conn);
        let big = u64::try_from(i64::MAX).unwrap();
        repo.upsert(UpsertTaskPrInput {
            additions: big,
            deletions: 4_000_000_000,
            ..input("task_1", big)
        })
        .unwrap();

        let stored = repo.get("task_1", big).unwrap().unwrap();
        assert_eq!(stored.pr_number, big);
        assert_eq!(stored.additions, big);
        assert_eq!(stored.deletions, 4_000_000_000);
    }
}
