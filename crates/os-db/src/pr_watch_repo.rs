use crate::util::{
    decode_enum, encode_enum, from_rfc3339, from_sql_int, opt_from_rfc3339, opt_to_rfc3339,
    sql_err, to_rfc3339, to_sql_int,
};
use chrono::{DateTime, Utc};
use os_core::error::WatchError;
use os_core::pr_watches::PrWatchRepository;
use os_core::types::{ChecksState, CreatePrWatchInput, PrWatch, PrWatchId};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, session_id, task_id, owner, repo, pr_number, branch, last_checked_at, last_comment_at, last_check_status, created_at, updated_at";

pub struct PrWatchRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> PrWatchRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_one(&self, filter: &str, key: &str) -> Result<Option<PrWatch>, WatchError> {
        let sql = format!("SELECT {COLUMNS} FROM pr_watches WHERE {filter} = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let row = stmt
            .query_row([key], read_row)
            .optional()
            .map_err(sql_err)?;
        row.map(map_pr_watch_row).transpose()
    }

    fn query_many(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<PrWatch>, WatchError> {
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let rows = stmt.query_map(params, read_row).map_err(sql_err)?;
        let mut watches = Vec::new();
        for row in rows {
            watches.push(map_pr_watch_row(row.map_err(sql_err)?)?);
        }
        Ok(watches)
    }

    fn require(&self, id: &PrWatchId) -> Result<PrWatch, WatchError> {
        self.get(id)?.ok_or(WatchError::NotFound)
    }
}

impl PrWatchRepository for PrWatchRepo<'_> {
    fn create(&self, input: CreatePrWatchInput) -> Result<PrWatch, WatchError> {
        let now = Utc::now();
        let watch = PrWatch {
            id: PrWatchId::generate(),
            session_id: input.session_id,
            task_id: input.task_id,
            owner: input.owner,
            repo: input.repo,
            pr_number: input.pr_number,
            branch: input.branch,
            last_checked_at: None,
            last_comment_at: None,
            last_check_status: ChecksState::None,
            created_at: now,
            updated_at: now,
        };
        let sql = format!(
            "INSERT INTO pr_watches ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        );
        self.conn
            .execute(
                &sql,
                params![
                    watch.id.as_str(),
                    watch.session_id,
                    watch.task_id,
                    watch.owner,
                    watch.repo,
                    to_sql_int(watch.pr_number)?,
                    watch.branch,
                    Option::<String>::None,
                    Option::<String>::None,
                    encode_enum(&watch.last_check_status)?,
                    to_rfc3339(&watch.created_at),
                    to_rfc3339(&watch.updated_at),
                ],
            )
            .map_err(sql_err)?;
        Ok(watch)
    }

    fn get(&self, id: &PrWatchId) -> Result<Option<PrWatch>, WatchError> {
        self.query_one("id", id.as_str())
    }

    fn get_by_session(&self, session_id: &str) -> Result<Option<PrWatch>, WatchError> {
        self.query_one("session_id", session_id)
    }

    fn list(&self) -> Result<Vec<PrWatch>, WatchError> {
        let sql = format!("SELECT {COLUMNS} FROM pr_watches ORDER BY created_at ASC, rowid ASC");
        self.query_many(&sql, [])
    }

    fn list_for_task(&self, task_id: &str) -> Result<Vec<PrWatch>, WatchError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM pr_watches WHERE task_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        self.query_many(&sql, [task_id])
    }

    fn set_pr_number(
        &self,
        id: &PrWatchId,
        pr_number: u64,
        checked_at: DateTime<Utc>,
    ) -> Result<PrWatch, WatchError> {
        let watch = self.require(id)?;
        if watch.pr_number != 0 && watch.pr_number != pr_number {
            return Err(WatchError::Conflict {
                message: format!("watch {id} already tracks #{}", watch.pr_number),
            });
        }
        self.conn
            .execute(
                "UPDATE pr_watches SET pr_number = ?1, last_checked_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![
                    to_sql_int(pr_number)?,
                    to_rfc3339(&checked_at),
                    to_rfc3339(&Utc::now()),
                    id.as_str()
                ],
            )
            .map_err(sql_err)?;
        self.require(id)
    }

    fn record_check(
        &self,
        id: &PrWatchId,
        checked_at: DateTime<Utc>,
        last_comment_at: Option<DateTime<Utc>>,
        last_check_status: ChecksState,
    ) -> Result<PrWatch, WatchError> {
        let changed = self
            .conn
            .execute(
                "UPDATE pr_watches SET last_checked_at = ?1, last_comment_at = ?2, last_check_status = ?3, updated_at = ?4 WHERE id = ?5",
                params![
                    to_rfc3339(&checked_at),
                    opt_to_rfc3339(last_comment_at.as_ref()),
                    encode_enum(&last_check_status)?,
                    to_rfc3339(&Utc::now()),
                    id.as_str()
                ],
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(WatchError::NotFound);
        }
        self.require(id)
    }

    fn touch(&self, id: &PrWatchId, checked_at: DateTime<Utc>) -> Result<PrWatch, WatchError> {
        let changed = self
            .conn
            .execute(
                "UPDATE pr_watches SET last_checked_at = ?1, updated_at = ?2 WHERE id = ?3",
                params![to_rfc3339(&checked_at), to_rfc3339(&Utc::now()), id.as_str()],
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(WatchError::NotFound);
        }
        self.require(id)
    }

    fn delete(&self, id: &PrWatchId) -> Result<(), WatchError> {
        let changed = self
            .conn
            .execute("DELETE FROM pr_watches WHERE id = ?1", [id.as_str()])
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(WatchError::NotFound);
        }
        Ok(())
    }
}

struct RawPrWatch {
    id: String,
    session_id: String,
    task_id: String,
    owner: String,
    repo: String,
    pr_number: i64,
    branch: String,
    last_checked_at: Option<String>,
    last_comment_at: Option<String>,
    last_check_status: String,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawPrWatch> {
    Ok(RawPrWatch {
        id: row.get(0)?,
        session_id: row.get(1)?,
        task_id: row.get(2)?,
        owner: row.get(3)?,
        repo: row.get(4)?,
        pr_number: row.get(5)?,
        branch: row.get(6)?,
        last_checked_at: row.get(7)?,
        last_comment_at: row.get(8)?,
        last_check_status: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_pr_watch_row(raw: RawPrWatch) -> Result<PrWatch, WatchError> {
    let id = PrWatchId::new(raw.id).map_err(|err| WatchError::Backend {
        reason: err.to_string(),
    })?;
    Ok(PrWatch {
        id,
        session_id: raw.session_id,
        task_id: raw.task_id,
        owner: raw.owner,
        repo: raw.repo,
        pr_number: from_sql_int(raw.pr_number)?,
        branch: raw.branch,
        last_checked_at: opt_from_rfc3339(raw.last_checked_at)?,
        last_comment_at: opt_from_rfc3339(raw.last_comment_at)?,
        last_check_status: decode_enum(&raw.last_check_status)?,
        created_at: from_rfc3339(&raw.created_at)?,
        updated_at: from_rfc3339(&raw.updated_at)?,
    })
}
