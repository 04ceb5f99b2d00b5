//! Event Repository
//!
//! Event rows plus the annotated read model (creator username, live
//! approved-attendee count, fullness).

use sqlx::{Row, SqlitePool};

use super::{bounded, from_millis, millis};
use crate::domain::{Event, EventSummary};
use crate::error::Result;

/// Listing filters. `limit`/`offset` are already resolved by the API layer.
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    /// Case-insensitive substring match against title and description.
    pub search: Option<String>,
    pub upcoming_only: bool,
    pub limit: i64,
    pub offset: i64,
}

const SUMMARY_SELECT: &str = r#"
SELECT e.id, e.title, e.description, e.event_date, e.location, e.capacity,
       e.created_by, u.username AS creator_username,
       (SELECT COUNT(*) FROM registrations r
         WHERE r.event_id = e.id AND r.status = 'approved') AS attendee_count,
       e.created_at, e.updated_at
FROM events e
JOIN users u ON u.id = e.created_by
"#;

pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                event_date BIGINT NOT NULL,
                location TEXT,
                capacity INTEGER NOT NULL,
                created_by TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_date ON events(event_date);
            CREATE INDEX IF NOT EXISTS idx_events_creator ON events(created_by);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert(&self, event: &Event) -> Result<()> {
        bounded(async {
            sqlx::query(
                "INSERT INTO events (id, title, description, event_date, location, capacity, \
                 created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&event.id)
            .bind(&event.title)
            .bind(&event.description)
            .bind(millis(&event.date))
            .bind(&event.location)
            .bind(event.capacity)
            .bind(&event.created_by)
            .bind(millis(&event.created_at))
            .bind(millis(&event.updated_at))
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Event>> {
        bounded(async {
            let row = sqlx::query("SELECT * FROM events WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(row_to_event).transpose()
        })
        .await
    }

    /// One event in the annotated listing shape.
    pub async fn find_summary(&self, id: &str) -> Result<Option<EventSummary>> {
        bounded(async {
            let sql = format!("{} WHERE e.id = ?", SUMMARY_SELECT);
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            row.map(row_to_summary).transpose()
        })
        .await
    }

    /// Paginated listing ordered by date ascending, with the total count for
    /// the same filter.
    pub async fn list(&self, filter: &EventFilter) -> Result<(Vec<EventSummary>, u64)> {
        bounded(async {
            let mut where_clause = String::from(" WHERE 1=1");
            if filter.search.is_some() {
                where_clause.push_str(
                    " AND (LOWER(e.title) LIKE ? OR LOWER(COALESCE(e.description, '')) LIKE ?)",
                );
            }
            if filter.upcoming_only {
                where_clause.push_str(" AND e.event_date >= ?");
            }

            let pattern = filter
                .search
                .as_ref()
                .map(|s| format!("%{}%", s.to_lowercase()));
            let now = millis(&chrono::Utc::now());

            let count_sql = format!("SELECT COUNT(*) FROM events e{}", where_clause);
            let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
            if let Some(ref p) = pattern {
                count_query = count_query.bind(p).bind(p);
            }
            if filter.upcoming_only {
                count_query = count_query.bind(now);
            }
            let total = count_query.fetch_one(&self.pool).await?;

            let page_sql = format!(
                "{}{} ORDER BY e.event_date ASC LIMIT ? OFFSET ?",
                SUMMARY_SELECT, where_clause
            );
            let mut page_query = sqlx::query(&page_sql);
            if let Some(ref p) = pattern {
                page_query = page_query.bind(p).bind(p);
            }
            if filter.upcoming_only {
                page_query = page_query.bind(now);
            }
            let rows = page_query
                .bind(filter.limit)
                .bind(filter.offset)
                .fetch_all(&self.pool)
                .await?;

            let summaries = rows
                .into_iter()
                .map(row_to_summary)
                .collect::<Result<Vec<_>>>()?;
            Ok((summaries, total as u64))
        })
        .await
    }

    pub async fn list_by_creator(&self, user_id: &str) -> Result<Vec<EventSummary>> {
        bounded(async {
            let sql = format!(
                "{} WHERE e.created_by = ? ORDER BY e.event_date ASC",
                SUMMARY_SELECT
            );
            let rows = sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?;
            rows.into_iter().map(row_to_summary).collect()
        })
        .await
    }

    /// Full replace of the mutable fields; bumps `updated_at`.
    pub async fn update(&self, event: &Event) -> Result<()> {
        bounded(async {
            sqlx::query(
                "UPDATE events SET title = ?, description = ?, event_date = ?, location = ?, \
                 capacity = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&event.title)
            .bind(&event.description)
            .bind(millis(&event.date))
            .bind(&event.location)
            .bind(event.capacity)
            .bind(millis(&chrono::Utc::now()))
            .bind(&event.id)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    /// Registrations go with the event via the FK cascade.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        bounded(async {
            let result = sqlx::query("DELETE FROM events WHERE id = ?")
                .bind(id)
                .execute(&self.pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    /// Live count of approved registrations, the only number checked against
    /// capacity.
    pub async fn approved_count(&self, event_id: &str) -> Result<i64> {
        bounded(async {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM registrations WHERE event_id = ? AND status = 'approved'",
            )
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;
            Ok(count)
        })
        .await
    }
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<Event> {
    Ok(Event {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        date: from_millis(row.get("event_date"))?,
        location: row.get("location"),
        capacity: row.get("capacity"),
        created_by: row.get("created_by"),
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

fn row_to_summary(row: sqlx::sqlite::SqliteRow) -> Result<EventSummary> {
    let capacity: i64 = row.get("capacity");
    let attendee_count: i64 = row.get("attendee_count");

    Ok(EventSummary {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        date: from_millis(row.get("event_date"))?,
        location: row.get("location"),
        capacity,
        created_by: row.get("created_by"),
        creator_username: row.get("creator_username"),
        attendee_count,
        is_full: attendee_count >= capacity,
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}
