//! Registration Repository
//!
//! The one place in the system where multi-statement transactions matter:
//! the duplicate-check-then-insert and the bulk status update are each
//! atomic.

use sqlx::{Row, SqlitePool};

use super::{bounded, from_millis, millis};
use crate::domain::{Event, Registration, RegistrationDetail, RegistrationStatus};
use crate::error::{ApiError, Result};

/// Filters for the listing endpoints.
#[derive(Debug, Default, Clone)]
pub struct RegistrationFilter {
    pub event_id: Option<String>,
    pub status: Option<RegistrationStatus>,
    pub limit: i64,
    pub offset: i64,
}

const DETAIL_SELECT: &str = r#"
SELECT r.id, r.event_id, r.user_id, r.status, r.created_at, r.updated_at,
       u.username, e.title AS event_title, e.event_date,
       e.location AS event_location
FROM registrations r
JOIN events e ON e.id = r.event_id
JOIN users u ON u.id = r.user_id
"#;

pub struct RegistrationRepository {
    pool: SqlitePool,
}

impl RegistrationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registrations (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                UNIQUE(event_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS idx_registrations_event ON registrations(event_id, status);
            CREATE INDEX IF NOT EXISTS idx_registrations_user ON registrations(user_id);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a pending registration for `user_id` on `event`.
    ///
    /// Duplicate check and insert run in one transaction. Capacity is not
    /// checked here: a full event still accepts pending registrations, and
    /// the approval-time re-check is the gate that actually binds.
    pub async fn register(&self, event: &Event, user_id: &str) -> Result<Registration> {
        bounded(async {
            let mut tx = self.pool.begin().await?;

            let existing: Option<String> = sqlx::query_scalar(
                "SELECT status FROM registrations WHERE event_id = ? AND user_id = ?",
            )
            .bind(&event.id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(status) = existing {
                return Err(ApiError::conflict(format!(
                    "Already registered for this event (status: {})",
                    status
                )));
            }

            let registration = Registration::new(&event.id, user_id);
            sqlx::query(
                "INSERT INTO registrations (id, event_id, user_id, status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&registration.id)
            .bind(&registration.event_id)
            .bind(&registration.user_id)
            .bind(registration.status.as_str())
            .bind(millis(&registration.created_at))
            .bind(millis(&registration.updated_at))
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(registration)
        })
        .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Registration>> {
        bounded(async {
            let row = sqlx::query("SELECT * FROM registrations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(row_to_registration).transpose()
        })
        .await
    }

    /// Delete only if the row belongs to `user_id`; returns false when the
    /// row is absent or owned by someone else.
    pub async fn delete_owned(&self, id: &str, user_id: &str) -> Result<bool> {
        bounded(async {
            let result = sqlx::query("DELETE FROM registrations WHERE id = ? AND user_id = ?")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    /// Caller's registrations joined with event summary fields.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        filter: &RegistrationFilter,
    ) -> Result<(Vec<RegistrationDetail>, u64)> {
        bounded(async {
            let mut where_clause = String::from(" WHERE r.user_id = ?");
            if filter.status.is_some() {
                where_clause.push_str(" AND r.status = ?");
            }

            let count_sql = format!(
                "SELECT COUNT(*) FROM registrations r{}",
                where_clause
            );
            let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
            if let Some(status) = filter.status {
                count_query = count_query.bind(status.as_str());
            }
            let total = count_query.fetch_one(&self.pool).await?;

            let page_sql = format!(
                "{}{} ORDER BY r.created_at DESC LIMIT ? OFFSET ?",
                DETAIL_SELECT, where_clause
            );
            let mut page_query = sqlx::query(&page_sql).bind(user_id);
            if let Some(status) = filter.status {
                page_query = page_query.bind(status.as_str());
            }
            let rows = page_query
                .bind(filter.limit)
                .bind(filter.offset)
                .fetch_all(&self.pool)
                .await?;

            let details = rows
                .into_iter()
                .map(row_to_detail)
                .collect::<Result<Vec<_>>>()?;
            Ok((details, total as u64))
        })
        .await
    }

    /// Registrations across managed events. `creator` is `None` for admins,
    /// who see everything.
    pub async fn list_managed(
        &self,
        creator: Option<&str>,
        filter: &RegistrationFilter,
    ) -> Result<(Vec<RegistrationDetail>, u64)> {
        bounded(async {
            let mut where_clause = String::from(" WHERE 1=1");
            if creator.is_some() {
                where_clause.push_str(" AND e.created_by = ?");
            }
            if filter.event_id.is_some() {
                where_clause.push_str(" AND r.event_id = ?");
            }
            if filter.status.is_some() {
                where_clause.push_str(" AND r.status = ?");
            }

            let count_sql = format!(
                "SELECT COUNT(*) FROM registrations r JOIN events e ON e.id = r.event_id{}",
                where_clause
            );
            let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
            if let Some(c) = creator {
                count_query = count_query.bind(c);
            }
            if let Some(ref event_id) = filter.event_id {
                count_query = count_query.bind(event_id);
            }
            if let Some(status) = filter.status {
                count_query = count_query.bind(status.as_str());
            }
            let total = count_query.fetch_one(&self.pool).await?;

            let page_sql = format!(
                "{}{} ORDER BY r.created_at DESC LIMIT ? OFFSET ?",
                DETAIL_SELECT, where_clause
            );
            let mut page_query = sqlx::query(&page_sql);
            if let Some(c) = creator {
                page_query = page_query.bind(c);
            }
            if let Some(ref event_id) = filter.event_id {
                page_query = page_query.bind(event_id);
            }
            if let Some(status) = filter.status {
                page_query = page_query.bind(status.as_str());
            }
            let rows = page_query
                .bind(filter.limit)
                .bind(filter.offset)
                .fetch_all(&self.pool)
                .await?;

            let details = rows
                .into_iter()
                .map(row_to_detail)
                .collect::<Result<Vec<_>>>()?;
            Ok((details, total as u64))
        })
        .await
    }

    pub async fn set_status(&self, id: &str, status: RegistrationStatus) -> Result<()> {
        bounded(async {
            sqlx::query("UPDATE registrations SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(millis(&chrono::Utc::now()))
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Owning-event creator for every id in one query, for the bulk
    /// authorization pass. Ids with no matching row are simply absent from
    /// the result.
    pub async fn creators_for(&self, ids: &[String]) -> Result<Vec<(String, String)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        bounded(async {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT r.id, e.created_by FROM registrations r \
                 JOIN events e ON e.id = r.event_id WHERE r.id IN ({})",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in ids {
                query = query.bind(id);
            }
            let rows = query.fetch_all(&self.pool).await?;
            Ok(rows
                .into_iter()
                .map(|row| (row.get("id"), row.get("created_by")))
                .collect())
        })
        .await
    }

    /// Update every row in one transaction and return the updated set.
    /// Rolls back in full on any failure.
    pub async fn bulk_set_status(
        &self,
        ids: &[String],
        status: RegistrationStatus,
    ) -> Result<Vec<Registration>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        bounded(async {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let mut tx = self.pool.begin().await?;

            let update_sql = format!(
                "UPDATE registrations SET status = ?, updated_at = ? WHERE id IN ({})",
                placeholders
            );
            let mut update = sqlx::query(&update_sql)
                .bind(status.as_str())
                .bind(millis(&chrono::Utc::now()));
            for id in ids {
                update = update.bind(id);
            }
            update.execute(&mut *tx).await?;

            let select_sql = format!(
                "SELECT * FROM registrations WHERE id IN ({})",
                placeholders
            );
            let mut select = sqlx::query(&select_sql);
            for id in ids {
                select = select.bind(id);
            }
            let rows = select.fetch_all(&mut *tx).await?;

            tx.commit().await?;
            rows.into_iter().map(row_to_registration).collect()
        })
        .await
    }
}

fn parse_status(s: &str) -> Result<RegistrationStatus> {
    RegistrationStatus::parse(s)
        .ok_or_else(|| ApiError::internal(format!("unknown registration status in store: {}", s)))
}

fn row_to_registration(row: sqlx::sqlite::SqliteRow) -> Result<Registration> {
    let status_str: String = row.get("status");
    Ok(Registration {
        id: row.get("id"),
        event_id: row.get("event_id"),
        user_id: row.get("user_id"),
        status: parse_status(&status_str)?,
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

fn row_to_detail(row: sqlx::sqlite::SqliteRow) -> Result<RegistrationDetail> {
    let status_str: String = row.get("status");
    Ok(RegistrationDetail {
        id: row.get("id"),
        event_id: row.get("event_id"),
        user_id: row.get("user_id"),
        status: parse_status(&status_str)?,
        username: row.get("username"),
        event_title: row.get("event_title"),
        event_date: from_millis(row.get("event_date"))?,
        event_location: row.get("event_location"),
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}
