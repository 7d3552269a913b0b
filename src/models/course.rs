use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const COURSE_STATUSES: &[&str] = &["draft", "active", "archived"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub description_markdown: String,
    pub description_html: String,
    pub price_cents: i64,
    pub currency: String,
    pub level: Option<String>,
    pub duration_weeks: Option<i64>,
    pub checkout_url: Option<String>,
    pub featured_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub status: String,
    pub sort_order: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CourseForm {
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub description_markdown: String,
    pub description_html: String,
    pub price_cents: i64,
    pub currency: String,
    pub level: Option<String>,
    pub duration_weeks: Option<i64>,
    pub checkout_url: Option<String>,
    pub featured_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub status: String,
    pub sort_order: Option<i64>,
}

impl CourseForm {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title is required".to_string());
        }
        if self.slug.is_empty() || self.slug.len() > 100 {
            return Err("Slug must be 1-100 characters".to_string());
        }
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err("Slug may only contain lowercase letters, digits, and hyphens".to_string());
        }
        if self.price_cents < 0 {
            return Err("Price cannot be negative".to_string());
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err("Currency must be a 3-letter code like USD".to_string());
        }
        if let Some(ref checkout) = self.checkout_url {
            if !checkout.is_empty() && url::Url::parse(checkout).is_err() {
                return Err("Checkout URL must be an absolute URL".to_string());
            }
        }
        if let Some(weeks) = self.duration_weeks {
            if weeks <= 0 {
                return Err("Duration must be a positive number of weeks".to_string());
            }
        }
        if !COURSE_STATUSES.contains(&self.status.as_str()) {
            return Err(format!("Unknown course status '{}'", self.status));
        }
        Ok(())
    }
}

impl Course {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Course {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            summary: row.get("summary")?,
            description_markdown: row.get("description_markdown")?,
            description_html: row.get("description_html")?,
            price_cents: row.get("price_cents")?,
            currency: row.get("currency")?,
            level: row.get("level")?,
            duration_weeks: row.get("duration_weeks")?,
            checkout_url: row.get("checkout_url")?,
            featured_image: row.get("featured_image")?,
            meta_title: row.get("meta_title")?,
            meta_description: row.get("meta_description")?,
            status: row.get("status")?,
            sort_order: row.get("sort_order")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM courses WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_by_slug(pool: &DbPool, slug: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM courses WHERE slug = ?1",
            params![slug],
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
                "SELECT * FROM courses WHERE status = ?1 ORDER BY sort_order ASC, id ASC LIMIT ?2 OFFSET ?3"
                    .to_string(),
                vec![
                    Box::new(s.to_string()),
                    Box::new(limit),
                    Box::new(offset),
                ],
            ),
            None => (
                "SELECT * FROM courses ORDER BY sort_order ASC, id ASC LIMIT ?1 OFFSET ?2"
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
                    "SELECT COUNT(*) FROM courses WHERE status = ?1",
                    params![s],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }

    /// The public catalog: active courses in display order.
    pub fn active(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM courses WHERE status = 'active' ORDER BY sort_order ASC, id ASC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn create(pool: &DbPool, form: &CourseForm) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO courses (title, slug, summary, description_markdown, description_html,
             price_cents, currency, level, duration_weeks, checkout_url, featured_image,
             meta_title, meta_description, status, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                form.title,
                form.slug,
                form.summary,
                form.description_markdown,
                form.description_html,
                form.price_cents,
                form.currency,
                form.level,
                form.duration_weeks,
                form.checkout_url,
                form.featured_image,
                form.meta_title,
                form.meta_description,
                form.status,
                form.sort_order.unwrap_or(0),
            ],
        )
        .map_err(|e| e.to_string())?;

        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &CourseForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE courses SET title=?1, slug=?2, summary=?3, description_markdown=?4,
             description_html=?5, price_cents=?6, currency=?7, level=?8, duration_weeks=?9,
             checkout_url=?10, featured_image=?11, meta_title=?12, meta_description=?13,
             status=?14, sort_order=?15, updated_at=CURRENT_TIMESTAMP WHERE id=?16",
            params![
                form.title,
                form.slug,
                form.summary,
                form.description_markdown,
                form.description_html,
                form.price_cents,
                form.currency,
                form.level,
                form.duration_weeks,
                form.checkout_url,
                form.featured_image,
                form.meta_title,
                form.meta_description,
                form.status,
                form.sort_order.unwrap_or(0),
                id,
            ],
        )
        .map_err(|e| e.to_string())?;

        Ok(())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        if !COURSE_STATUSES.contains(&status) {
            return Err(format!("Unknown course status '{}'", status));
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE courses SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM courses WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}
