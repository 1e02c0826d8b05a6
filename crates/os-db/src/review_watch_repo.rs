use crate::util::{
    decode_enum, decode_json, encode_enum, encode_json, from_rfc3339, opt_from_rfc3339,
    opt_to_rfc3339, sql_err, to_rfc3339,
};
use chrono::{DateTime, Utc};
use os_core::error::WatchError;
use os_core::review_watches::ReviewWatchRepository;
use os_core::types::{CreateReviewWatchInput, ReviewWatch, ReviewWatchId, UpdateReviewWatchInput};
use os_core::validation::clamp_poll_interval;
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "id, workspace_id, workflow_id, workflow_step_id, repos_json, review_scope, custom_query, agent_profile_id, executor_profile_id, prompt, enabled, poll_interval_seconds, last_polled_at, created_at, updated_at";

pub struct ReviewWatchRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ReviewWatchRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_many(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ReviewWatch>, WatchError> {
        let mut stmt = self.conn.prepare(sql).map_err(sql_err)?;
        let rows = stmt.query_map(params, read_row).map_err(sql_err)?;
        let mut watches = Vec::new();
        for row in rows {
            watches.push(map_review_watch_row(row.map_err(sql_err)?)?);
        }
        Ok(watches)
    }
}

impl ReviewWatchRepository for ReviewWatchRepo<'_> {
    fn create(&self, input: CreateReviewWatchInput) -> Result<ReviewWatch, WatchError> {
        let now = Utc::now();
        let watch = ReviewWatch {
            id: ReviewWatchId::generate(),
            workspace_id: input.workspace_id,
            workflow_id: input.workflow_id,
            workflow_step_id: input.workflow_step_id,
            repos: input.repos,
            review_scope: input.review_scope.unwrap_or_default(),
            custom_query: input.custom_query.unwrap_or_default().trim().to_string(),
            agent_profile_id: input.agent_profile_id,
            executor_profile_id: input.executor_profile_id,
            prompt: input.prompt,
            enabled: input.enabled.unwrap_or(true),
            poll_interval_seconds: clamp_poll_interval(input.poll_interval_seconds),
            last_polled_at: None,
            created_at: now,
            updated_at: now,
        };
        let sql = format!(
            "INSERT INTO review_watches ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        );
        self.conn
            .execute(
                &sql,
                params![
                    watch.id.as_str(),
                    watch.workspace_id,
                    watch.workflow_id,
                    watch.workflow_step_id,
                    encode_json(&watch.repos)?,
                    encode_enum(&watch.review_scope)?,
                    watch.custom_query,
                    watch.agent_profile_id,
                    watch.executor_profile_id,
                    watch.prompt,
                    watch.enabled,
                    watch.poll_interval_seconds,
                    Option::<String>::None,
                    to_rfc3339(&watch.created_at),
                    to_rfc3339(&watch.updated_at),
                ],
            )
            .map_err(sql_err)?;
        Ok(watch)
    }

    fn get(&self, id: &ReviewWatchId) -> Result<Option<ReviewWatch>, WatchError> {
        let sql = format!("SELECT {COLUMNS} FROM review_watches WHERE id = ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(sql_err)?;
        let raw = stmt
            .query_row([id.as_str()], read_row)
            .optional()
            .map_err(sql_err)?;
        raw.map(map_review_watch_row).transpose()
    }

    fn list_for_workspace(&self, workspace_id: &str) -> Result<Vec<ReviewWatch>, WatchError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM review_watches WHERE workspace_id = ?1 ORDER BY created_at ASC, rowid ASC"
        );
        self.query_many(&sql, [workspace_id])
    }

    fn list_enabled(&self) -> Result<Vec<ReviewWatch>, WatchError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM review_watches WHERE enabled = 1 ORDER BY created_at ASC, rowid ASC"
        );
        self.query_many(&sql, [])
    }

    fn update(
        &self,
        id: &ReviewWatchId,
        input: UpdateReviewWatchInput,
    ) -> Result<ReviewWatch, WatchError> {
        let mut watch = self.get(id)?.ok_or(WatchError::NotFound)?;
        if let Some(workflow_id) = input.workflow_id {
            watch.workflow_id = workflow_id;
        }
        if let Some(step_id) = input.workflow_step_id {
            watch.workflow_step_id = step_id;
        }
        if let Some(repos) = input.repos {
            watch.repos = repos;
        }
        if let Some(scope) = input.review_scope {
            watch.review_scope = scope;
        }
        if let Some(query) = input.custom_query {
            watch.custom_query = query.trim().to_string();
        }
        if let Some(agent) = input.agent_profile_id {
            watch.agent_profile_id = agent;
        }
        if let Some(executor) = input.executor_profile_id {
            watch.executor_profile_id = executor;
        }
        if let Some(prompt) = input.prompt {
            watch.prompt = prompt;
        }
        if let Some(enabled) = input.enabled {
            watch.enabled = enabled;
        }
        if let Some(secs) = input.poll_interval_seconds {
            watch.poll_interval_seconds = clamp_poll_interval(Some(secs));
        }
        watch.updated_at = Utc::now();

        self.conn
            .execute(
                "UPDATE review_watches SET workflow_id = ?1, workflow_step_id = ?2, repos_json = ?3, review_scope = ?4, custom_query = ?5, agent_profile_id = ?6, executor_profile_id = ?7, prompt = ?8, enabled = ?9, poll_interval_seconds = ?10, updated_at = ?11 WHERE id = ?12",
                params![
                    watch.workflow_id,
                    watch.workflow_step_id,
                    encode_json(&watch.repos)?,
                    encode_enum(&watch.review_scope)?,
                    watch.custom_query,
                    watch.agent_profile_id,
                    watch.executor_profile_id,
                    watch.prompt,
                    watch.enabled,
                    watch.poll_interval_seconds,
                    to_rfc3339(&watch.updated_at),
                    watch.id.as_str(),
                ],
            )
            .map_err(sql_err)?;
        Ok(watch)
    }

    fn set_last_polled(
        &self,
        id: &ReviewWatchId,
        polled_at: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        let changed = self
            .conn
            .execute(
                "UPDATE review_watches SET last_polled_at = ?1 WHERE id = ?2",
                params![opt_to_rfc3339(Some(&polled_at)), id.as_str()],
            )
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(WatchError::NotFound);
        }
        Ok(())
    }

    fn delete(&self, id: &ReviewWatchId) -> Result<(), WatchError> {
        let changed = self
            .conn
            .execute("DELETE FROM review_watches WHERE id = ?1", [id.as_str()])
            .map_err(sql_err)?;
        if changed == 0 {
            return Err(WatchError::NotFound);
        }
        Ok(())
    }
}

struct RawReviewWatch {
    id: String,
    workspace_id: String,
    workflow_id: String,
    workflow_step_id: String,
    repos_json: String,
    review_scope: String,
    custom_query: String,
    agent_profile_id: Option<String>,
    executor_profile_id: Option<String>,
    prompt: Option<String>,
    enabled: bool,
    poll_interval_seconds: u32,
    last_polled_at: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawReviewWatch> {
    Ok(RawReviewWatch {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        workflow_id: row.get(2)?,
        workflow_step_id: row.get(3)?,
        repos_json: row.get(4)?,
        review_scope: row.get(5)?,
        custom_query: row.get(6)?,
        agent_profile_id: row.get(7)?,
        executor_profile_id: row.get(8)?,
        prompt: row.get(9)?,
        enabled: row.get(10)?,
        poll_interval_seconds: row.get(11)?,
        last_polled_at: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn map_review_watch_row(raw: RawReviewWatch) -> Result<ReviewWatch, WatchError> {
    let id = ReviewWatchId::new(raw.id).map_err(|err| WatchError::Backend {
        reason: err.to_string(),
    })?;
    Ok(ReviewWatch {
        id,
        workspace_id: raw.workspace_id,
        workflow_id: raw.workflow_id,
        workflow_step_id: raw.workflow_step_id,
        repos: decode_json(&raw.repos_json)?,
        review_scope: decode_enum(&raw.review_scope)?,
        custom_query: raw.custom_query,
        agent_profile_id: raw.agent_profile_id,
        executor_profile_id: raw.executor_profile_id,
        prompt: raw.prompt,
        enabled: raw.enabled,
        poll_interval_seconds: raw.poll_interval_seconds,
        last_polled_at: opt_from_rfc3339(raw.last_polled_at)?,
        created_at: from_rfc3339(&raw.created_at)?,
        updated_at: from_rfc3339(&raw.updated_at)?,
    })
}
