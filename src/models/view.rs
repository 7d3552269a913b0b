use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

/// Counter kinds. Blog posts and landing pages share the same table,
/// keyed by (content_type, content_key).
pub const CONTENT_TYPE_POST: &str = "post";
pub const CONTENT_TYPE_PAGE: &str = "page";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ViewCounter {
    pub id: i64,
    pub content_type: String,
    pub content_key: String,
    pub views: i64,
    pub last_daily_increment: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct CountEntry {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct OverviewStats {
    pub posts_total: i64,
    pub posts_published: i64,
    pub posts_draft: i64,
    pub courses_total: i64,
    pub courses_active: i64,
    pub testimonials_total: i64,
    pub testimonials_pending: i64,
    pub total_views: i64,
    pub counters_tracked: i64,
    pub viewed_today: i64,
}

impl ViewCounter {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ViewCounter {
            id: row.get("id")?,
            content_type: row.get("content_type")?,
            content_key: row.get("content_key")?,
            views: row.get("views")?,
            last_daily_increment: row.get("last_daily_increment")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn get(pool: &DbPool, content_type: &str, content_key: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM view_counters WHERE content_type = ?1 AND content_key = ?2",
            params![content_type, content_key],
            Self::from_row,
        )
        .ok()
    }

    /// Record a view for a content item. The counter is bumped at most once
    /// per calendar day: if `last_daily_increment` already equals `today`,
    /// the row is left untouched. Returns the current view count.
    ///
    /// Concurrent requests on a day boundary can double-count; there is no
    /// row lock here and the counters are not a correctness-critical path.
    pub fn record(pool: &DbPool, content_type: &str, content_key: &str) -> Result<i64, String> {
        Self::record_on(pool, content_type, content_key, Local::now().date_naive())
    }

    /// Same as `record`, with the reference date passed in.
    pub fn record_on(
        pool: &DbPool,
        content_type: &str,
        content_key: &str,
        today: NaiveDate,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        conn.execute(
            "INSERT OR IGNORE INTO view_counters (content_type, content_key, views, last_daily_increment)
             VALUES (?1, ?2, 0, NULL)",
            params![content_type, content_key],
        )
        .map_err(|e| e.to_string())?;

        let (views, last): (i64, Option<NaiveDate>) = conn
            .query_row(
                "SELECT views, last_daily_increment FROM view_counters
                 WHERE content_type = ?1 AND content_key = ?2",
                params![content_type, content_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| e.to_string())?;

        if last == Some(today) {
            return Ok(views);
        }

        conn.execute(
            "UPDATE view_counters SET views = views + 1, last_daily_increment = ?3,
             updated_at = CURRENT_TIMESTAMP
             WHERE content_type = ?1 AND content_key = ?2",
            params![content_type, content_key, today],
        )
        .map_err(|e| e.to_string())?;

        Ok(views + 1)
    }

    pub fn list(pool: &DbPool, content_type: Option<&str>, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match content_type {
            Some(t) => (
                "SELECT * FROM view_counters WHERE content_type = ?1 ORDER BY views DESC LIMIT ?2 OFFSET ?3"
                    .to_string(),
                vec![Box::new(t.to_string()), Box::new(limit), Box::new(offset)],
            ),
            None => (
                "SELECT * FROM view_counters ORDER BY views DESC LIMIT ?1 OFFSET ?2".to_string(),
                vec![Box::new(limit), Box::new(offset)],
            ),
        };

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        stmt.query_map(params_refs.as_slice(), Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Most-viewed items across both posts and landing pages.
    pub fn top_viewed(pool: &DbPool, limit: i64) -> Vec<CountEntry> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let mut stmt = match conn.prepare(
            "SELECT content_type || ':' || content_key AS label, views
             FROM view_counters ORDER BY views DESC LIMIT ?1",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        stmt.query_map(params![limit], |row| {
            Ok(CountEntry {
                label: row.get(0)?,
                count: row.get(1)?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn total_views(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COALESCE(SUM(views), 0) FROM view_counters",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    /// Dashboard aggregation: content counts plus view totals.
    pub fn overview(pool: &DbPool) -> OverviewStats {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => {
                return OverviewStats {
                    posts_total: 0,
                    posts_published: 0,
                    posts_draft: 0,
                    courses_total: 0,
                    courses_active: 0,
                    testimonials_total: 0,
                    testimonials_pending: 0,
                    total_views: 0,
                    counters_tracked: 0,
                    viewed_today: 0,
                }
            }
        };

        let count = |sql: &str| -> i64 {
            conn.query_row(sql, [], |row| row.get(0)).unwrap_or(0)
        };

        let today = Local::now().date_naive();
        let viewed_today: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM view_counters WHERE last_daily_increment = ?1",
                params![today],
                |row| row.get(0),
            )
            .unwrap_or(0);

        OverviewStats {
            posts_total: count("SELECT COUNT(*) FROM posts"),
            posts_published: count("SELECT COUNT(*) FROM posts WHERE status = 'published'"),
            posts_draft: count("SELECT COUNT(*) FROM posts WHERE status = 'draft'"),
            courses_total: count("SELECT COUNT(*) FROM courses"),
            courses_active: count("SELECT COUNT(*) FROM courses WHERE status = 'active'"),
            testimonials_total: count("SELECT COUNT(*) FROM testimonials"),
            testimonials_pending: count(
                "SELECT COUNT(*) FROM testimonials WHERE status = 'pending'",
            ),
            total_views: count("SELECT COALESCE(SUM(views), 0) FROM view_counters"),
            counters_tracked: count("SELECT COUNT(*) FROM view_counters"),
            viewed_today,
        }
    }
}
