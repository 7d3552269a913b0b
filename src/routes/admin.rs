use std::collections::HashMap;

use chrono::Utc;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{api_error, ApiError};
use crate::auth::AdminUser;
use crate::db::DbPool;
use crate::models::course::{Course, CourseForm};
use crate::models::post::{Post, PostForm};
use crate::models::settings::Setting;
use crate::models::testimonial::{Testimonial, TestimonialForm};
use crate::models::view::ViewCounter;
use crate::render;

const PER_PAGE: i64 = 20;

fn page_offset(page: Option<i64>) -> (i64, i64) {
    let current = page.unwrap_or(1).max(1);
    (current, (current - 1) * PER_PAGE)
}

fn save_error(e: String) -> ApiError {
    if e.contains("UNIQUE constraint failed") {
        api_error(Status::Conflict, "Slug already in use")
    } else {
        api_error(Status::InternalServerError, &e)
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

// ── Posts ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub slug: Option<String>,
    pub body_markdown: String,
    pub excerpt: Option<String>,
    pub featured_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub status: Option<String>,
    pub published_at: Option<String>,
}

impl PostInput {
    fn into_form(self) -> PostForm {
        let status = self.status.unwrap_or_else(|| "draft".to_string());
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => slug::slugify(&self.title),
        };
        let published_at = if status == "published" {
            self.published_at
                .filter(|s| !s.is_empty())
                .or_else(|| Some(Utc::now().format("%Y-%m-%dT%H:%M").to_string()))
        } else {
            self.published_at.filter(|s| !s.is_empty())
        };

        PostForm {
            title: self.title,
            slug,
            body_html: render::markdown_to_html(&self.body_markdown),
            body_markdown: self.body_markdown,
            excerpt: self.excerpt,
            featured_image: self.featured_image,
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            status,
            published_at,
        }
    }
}

#[get("/posts?<status>&<page>")]
pub fn posts_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    status: Option<String>,
    page: Option<i64>,
) -> Json<Value> {
    let (current_page, offset) = page_offset(page);
    let posts = Post::list(pool, status.as_deref(), PER_PAGE, offset);
    let total = Post::count(pool, status.as_deref());
    let total_pages = (total as f64 / PER_PAGE as f64).ceil() as i64;

    Json(json!({
        "posts": posts,
        "page": current_page,
        "total_pages": total_pages,
        "total": total,
        "count_all": Post::count(pool, None),
        "count_published": Post::count(pool, Some("published")),
        "count_draft": Post::count(pool, Some("draft")),
        "count_archived": Post::count(pool, Some("archived")),
    }))
}

#[get("/posts/<id>")]
pub fn post_get(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Option<Json<Post>> {
    Post::find_by_id(pool, id).map(Json)
}

#[post("/posts", format = "json", data = "<body>")]
pub fn post_create(
    _admin: AdminUser,
    pool: &State<DbPool>,
    body: Json<PostInput>,
) -> Result<Json<Value>, ApiError> {
    let form = body.into_inner().into_form();
    form.validate()
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;

    let id = Post::create(pool, &form).map_err(save_error)?;
    log::info!("Created post #{} '{}'", id, form.title);
    Ok(Json(json!({"success": true, "id": id})))
}

#[put("/posts/<id>", format = "json", data = "<body>")]
pub fn post_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    body: Json<PostInput>,
) -> Result<Json<Value>, ApiError> {
    if Post::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Post not found"));
    }

    let form = body.into_inner().into_form();
    form.validate()
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;

    Post::update(pool, id, &form).map_err(save_error)?;
    Ok(Json(json!({"success": true})))
}

#[post("/posts/<id>/status", format = "json", data = "<body>")]
pub fn post_set_status(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    body: Json<StatusBody>,
) -> Result<Json<Value>, ApiError> {
    if Post::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Post not found"));
    }
    Post::update_status(pool, id, &body.status)
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;
    Ok(Json(json!({"success": true})))
}

#[delete("/posts/<id>")]
pub fn post_delete(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    let post = Post::find_by_id(pool, id)
        .ok_or_else(|| api_error(Status::NotFound, "Post not found"))?;
    Post::delete(pool, id).map_err(|e| api_error(Status::InternalServerError, &e))?;
    log::info!("Deleted post #{} '{}'", id, post.title);
    Ok(Json(json!({"success": true})))
}

// ── Courses ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CourseInput {
    pub title: String,
    pub slug: Option<String>,
    pub summary: Option<String>,
    pub description_markdown: String,
    pub price_cents: i64,
    pub currency: Option<String>,
    pub level: Option<String>,
    pub duration_weeks: Option<i64>,
    pub checkout_url: Option<String>,
    pub featured_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub status: Option<String>,
    pub sort_order: Option<i64>,
}

impl CourseInput {
    fn into_form(self, default_currency: String) -> CourseForm {
        let slug = match self.slug.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => slug::slugify(&self.title),
        };

        CourseForm {
            title: self.title,
            slug,
            summary: self.summary,
            description_html: render::markdown_to_html(&self.description_markdown),
            description_markdown: self.description_markdown,
            price_cents: self.price_cents,
            currency: self.currency.unwrap_or(default_currency),
            level: self.level,
            duration_weeks: self.duration_weeks,
            checkout_url: self.checkout_url,
            featured_image: self.featured_image,
            meta_title: self.meta_title,
            meta_description: self.meta_description,
            status: self.status.unwrap_or_else(|| "draft".to_string()),
            sort_order: self.sort_order,
        }
    }
}

#[get("/courses?<status>&<page>")]
pub fn courses_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    status: Option<String>,
    page: Option<i64>,
) -> Json<Value> {
    let (current_page, offset) = page_offset(page);
    let courses = Course::list(pool, status.as_deref(), PER_PAGE, offset);
    let total = Course::count(pool, status.as_deref());
    let total_pages = (total as f64 / PER_PAGE as f64).ceil() as i64;

    Json(json!({
        "courses": courses,
        "page": current_page,
        "total_pages": total_pages,
        "total": total,
        "count_all": Course::count(pool, None),
        "count_active": Course::count(pool, Some("active")),
        "count_draft": Course::count(pool, Some("draft")),
        "count_archived": Course::count(pool, Some("archived")),
    }))
}

#[get("/courses/<id>")]
pub fn course_get(_admin: AdminUser, pool: &State<DbPool>, id: i64) -> Option<Json<Course>> {
    Course::find_by_id(pool, id).map(Json)
}

#[post("/courses", format = "json", data = "<body>")]
pub fn course_create(
    _admin: AdminUser,
    pool: &State<DbPool>,
    body: Json<CourseInput>,
) -> Result<Json<Value>, ApiError> {
    let default_currency = Setting::get_or(pool, "catalog_currency", "USD");
    let form = body.into_inner().into_form(default_currency);
    form.validate()
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;

    let id = Course::create(pool, &form).map_err(save_error)?;
    log::info!("Created course #{} '{}'", id, form.title);
    Ok(Json(json!({"success": true, "id": id})))
}

#[put("/courses/<id>", format = "json", data = "<body>")]
pub fn course_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    body: Json<CourseInput>,
) -> Result<Json<Value>, ApiError> {
    if Course::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Course not found"));
    }

    let default_currency = Setting::get_or(pool, "catalog_currency", "USD");
    let form = body.into_inner().into_form(default_currency);
    form.validate()
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;

    Course::update(pool, id, &form).map_err(save_error)?;
    Ok(Json(json!({"success": true})))
}

#[post("/courses/<id>/status", format = "json", data = "<body>")]
pub fn course_set_status(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    body: Json<StatusBody>,
) -> Result<Json<Value>, ApiError> {
    if Course::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Course not found"));
    }
    Course::update_status(pool, id, &body.status)
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;
    Ok(Json(json!({"success": true})))
}

#[delete("/courses/<id>")]
pub fn course_delete(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    let course = Course::find_by_id(pool, id)
        .ok_or_else(|| api_error(Status::NotFound, "Course not found"))?;
    Course::delete(pool, id).map_err(|e| api_error(Status::InternalServerError, &e))?;
    log::info!("Deleted course #{} '{}'", id, course.title);
    Ok(Json(json!({"success": true})))
}

// ── Testimonials ────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TestimonialInput {
    pub author_name: String,
    pub author_role: Option<String>,
    pub quote: String,
    pub avatar: Option<String>,
    pub rating: Option<i64>,
    pub status: Option<String>,
    pub sort_order: Option<i64>,
}

impl TestimonialInput {
    fn into_form(self) -> TestimonialForm {
        TestimonialForm {
            author_name: self.author_name,
            author_role: self.author_role,
            quote: self.quote,
            avatar: self.avatar,
            rating: self.rating.unwrap_or(5),
            status: self.status.unwrap_or_else(|| "pending".to_string()),
            sort_order: self.sort_order,
        }
    }
}

#[get("/testimonials?<status>&<page>")]
pub fn testimonials_list(
    _admin: AdminUser,
    pool: &State<DbPool>,
    status: Option<String>,
    page: Option<i64>,
) -> Json<Value> {
    let (current_page, offset) = page_offset(page);
    let testimonials = Testimonial::list(pool, status.as_deref(), PER_PAGE, offset);
    let total = Testimonial::count(pool, status.as_deref());
    let total_pages = (total as f64 / PER_PAGE as f64).ceil() as i64;

    Json(json!({
        "testimonials": testimonials,
        "page": current_page,
        "total_pages": total_pages,
        "total": total,
        "count_all": Testimonial::count(pool, None),
        "count_pending": Testimonial::count(pool, Some("pending")),
        "count_approved": Testimonial::count(pool, Some("approved")),
        "count_hidden": Testimonial::count(pool, Some("hidden")),
    }))
}

#[get("/testimonials/<id>")]
pub fn testimonial_get(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Option<Json<Testimonial>> {
    Testimonial::find_by_id(pool, id).map(Json)
}

#[post("/testimonials", format = "json", data = "<body>")]
pub fn testimonial_create(
    _admin: AdminUser,
    pool: &State<DbPool>,
    body: Json<TestimonialInput>,
) -> Result<Json<Value>, ApiError> {
    let form = body.into_inner().into_form();
    form.validate()
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;

    let id = Testimonial::create(pool, &form)
        .map_err(|e| api_error(Status::InternalServerError, &e))?;
    Ok(Json(json!({"success": true, "id": id})))
}

#[put("/testimonials/<id>", format = "json", data = "<body>")]
pub fn testimonial_update(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
    body: Json<TestimonialInput>,
) -> Result<Json<Value>, ApiError> {
    if Testimonial::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Testimonial not found"));
    }

    let form = body.into_inner().into_form();
    form.validate()
        .map_err(|e| api_error(Status::UnprocessableEntity, &e))?;

    Testimonial::update(pool, id, &form)
        .map_err(|e| api_error(Status::InternalServerError, &e))?;
    Ok(Json(json!({"success": true})))
}

#[post("/testimonials/<id>/approve")]
pub fn testimonial_approve(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    if Testimonial::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Testimonial not found"));
    }
    Testimonial::update_status(pool, id, "approved")
        .map_err(|e| api_error(Status::InternalServerError, &e))?;
    Ok(Json(json!({"success": true})))
}

#[post("/testimonials/<id>/hide")]
pub fn testimonial_hide(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    if Testimonial::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Testimonial not found"));
    }
    Testimonial::update_status(pool, id, "hidden")
        .map_err(|e| api_error(Status::InternalServerError, &e))?;
    Ok(Json(json!({"success": true})))
}

#[delete("/testimonials/<id>")]
pub fn testimonial_delete(
    _admin: AdminUser,
    pool: &State<DbPool>,
    id: i64,
) -> Result<Json<Value>, ApiError> {
    if Testimonial::find_by_id(pool, id).is_none() {
        return Err(api_error(Status::NotFound, "Testimonial not found"));
    }
    Testimonial::delete(pool, id).map_err(|e| api_error(Status::InternalServerError, &e))?;
    Ok(Json(json!({"success": true})))
}

// ── Settings ────────────────────────────────────────────

#[get("/settings")]
pub fn settings_get(_admin: AdminUser, pool: &State<DbPool>) -> Json<HashMap<String, String>> {
    Json(Setting::all(pool))
}

#[put("/settings", format = "json", data = "<body>")]
pub fn settings_put(
    _admin: AdminUser,
    pool: &State<DbPool>,
    body: Json<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    Setting::set_many(pool, &body)
        .map_err(|e| api_error(Status::InternalServerError, &e))?;
    Ok(Json(json!({"success": true, "updated": body.len()})))
}

// ── Stats ───────────────────────────────────────────────

#[get("/stats/overview")]
pub fn stats_overview(_admin: AdminUser, pool: &State<DbPool>) -> Json<Value> {
    let stats = ViewCounter::overview(pool);
    Json(serde_json::to_value(stats).unwrap_or_default())
}

#[get("/stats/views?<content_type>&<limit>&<page>")]
pub fn stats_views(
    _admin: AdminUser,
    pool: &State<DbPool>,
    content_type: Option<String>,
    limit: Option<i64>,
    page: Option<i64>,
) -> Json<Value> {
    let limit = limit.unwrap_or(PER_PAGE).clamp(1, 100);
    let current_page = page.unwrap_or(1).max(1);
    let offset = (current_page - 1) * limit;

    let counters = ViewCounter::list(pool, content_type.as_deref(), limit, offset);
    let top = ViewCounter::top_viewed(pool, 10);

    Json(json!({
        "counters": counters,
        "top": top,
        "total_views": ViewCounter::total_views(pool),
        "page": current_page,
    }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        posts_list,
        post_get,
        post_create,
        post_update,
        post_set_status,
        post_delete,
        courses_list,
        course_get,
        course_create,
        course_update,
        course_set_status,
        course_delete,
        testimonials_list,
        testimonial_get,
        testimonial_create,
        testimonial_update,
        testimonial_approve,
        testimonial_hide,
        testimonial_delete,
        settings_get,
        settings_put,
        stats_overview,
        stats_views,
    ]
}
