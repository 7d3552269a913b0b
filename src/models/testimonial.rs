use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const TESTIMONIAL_STATUSES: &[&str] = &["pending", "approved", "hidden"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Testimonial {
    pub id: i64,
    pub author_name: String,
    pub author_role: Option<String>,
    pub quote: String,
    pub avatar: Option<String>,
    pub rating: i64,
    pub status: String,
    pub sort_order: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct TestimonialForm {
    pub author_name: String,
    pub author_role: Option<String>,
    pub quote: String,
    pub avatar: Option<String>,
    pub rating: i64,
    pub status: String,
    pub sort_order: Option<i64>,
}

impl TestimonialForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.author_name.trim().is_empty() {
            return Err("Author name is required".to_string());
        }
        if self.quote.trim().is_empty() {
            return Err("Quote is required".to_string());
        }
        if !(1..=5).contains(&self.rating) {
            return Err("Rating must be between 1 and 5".to_string());
        }
        if !TESTIMONIAL_STATUSES.contains(&self.status.as_str()) {
            return Err(format!("Unknown testimonial status '{}'", self.status));
        }
        Ok(())
    }
}

impl Testimonial {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Testimonial {
            id: row.get("id")?,
            author_name: row.get("author_name")?,
            author_role: row.get("author_role")?,
            quote: row.get("quote")?,
            avatar: row.get("avatar")?,
            rating: row.get("rating")?,
            status: row.get("status")?,
            sort_order: row.get("sort_order")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM testimonials WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool, status: Option<&str>, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status {
            Some(s) => (
                "SELECT * FROM testimonials WHERE status = ?1 ORDER BY sort_order ASC, id ASC LIMIT ?2 OFFSET ?3"
                    .to_string(),
                vec![
                    Box::new(s.to_string()),
                    Box::new(limit),
                    Box::new(offset),
                ],
            ),
            None => (
                "SELECT * FROM testimonials ORDER BY sort_order ASC, id ASC LIMIT ?1 OFFSET ?2"
                    .to_string(),
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

    pub fn count(pool: &DbPool, status: Option<&str>) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };

        match status {
            Some(s) => conn
                .query_row(
                    "SELECT COUNT(*) FROM testimonials WHERE status = ?1",
                    params![s],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM testimonials", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }

    /// Approved testimonials in display order, for the public site.
    pub fn approved(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM testimonials WHERE status = 'approved' ORDER BY sort_order ASC, id ASC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn create(pool: &DbPool, form: &TestimonialForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO testimonials (author_name, author_role, quote, avatar, rating, status, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                form.author_name,
                form.author_role,
                form.quote,
                form.avatar,
                form.rating,
                form.status,
                form.sort_order.unwrap_or(0),
            ],
        )
        .map_err(|e| e.to_string())?;

        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &TestimonialForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE testimonials SET author_name=?1, author_role=?2, quote=?3, avatar=?4,
             rating=?5, status=?6, sort_order=?7, updated_at=CURRENT_TIMESTAMP WHERE id=?8",
            params![
                form.author_name,
                form.author_role,
                form.quote,
                form.avatar,
                form.rating,
                form.status,
                form.sort_order.unwrap_or(0),
                id,
            ],
        )
        .map_err(|e| e.to_string())?;

        Ok(())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        if !TESTIMONIAL_STATUSES.contains(&status) {
            return Err(format!("Unknown testimonial status '{}'", status));
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE testimonials SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM testimonials WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
