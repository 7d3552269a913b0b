use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};

use super::{api_error, ApiError};
use crate::db::DbPool;
use crate::models::course::Course;
use crate::models::post::Post;
use crate::models::settings::Setting;
use crate::models::testimonial::Testimonial;
use crate::models::view::{ViewCounter, CONTENT_TYPE_PAGE, CONTENT_TYPE_POST};

/// Settings keys exposed to the public site.
const PUBLIC_SETTINGS: &[&str] = &[
    "site_name",
    "site_tagline",
    "site_url",
    "contact_email",
    "catalog_currency",
    "catalog_show_prices",
    "blog_show_excerpts",
    "social_instagram",
    "social_twitter",
    "social_youtube",
    "social_linkedin",
];

fn post_summary(post: &Post) -> Value {
    json!({
        "id": post.id,
        "title": post.title,
        "slug": post.slug,
        "excerpt": post.excerpt,
        "featured_image": post.featured_image,
        "published_at": post.published_at,
    })
}

fn post_detail(post: &Post, views: i64) -> Value {
    json!({
        "id": post.id,
        "title": post.title,
        "slug": post.slug,
        "body_html": post.body_html,
        "excerpt": post.excerpt,
        "featured_image": post.featured_image,
        "meta_title": post.meta_title,
        "meta_description": post.meta_description,
        "published_at": post.published_at,
        "views": views,
    })
}

// ── Blog ───────────────────────────────────────────────

#[get("/posts?<page>")]
pub fn posts_index(pool: &State<DbPool>, page: Option<i64>) -> Json<Value> {
    let per_page = Setting::get_i64(pool, "posts_per_page").max(1);
    let current_page = page.unwrap_or(1).max(1);
    let offset = (current_page - 1) * per_page;

    let posts = Post::published(pool, per_page, offset);
    let total = Post::count(pool, Some("published"));
    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Json(json!({
        "posts": posts.iter().map(post_summary).collect::<Vec<_>>(),
        "page": current_page,
        "total_pages": total_pages,
        "total": total,
    }))
}

/// Published post by slug. Each qualifying read bumps the post's view
/// counter, at most once per day.
#[get("/posts/<slug>")]
pub fn post_show(pool: &State<DbPool>, slug: &str) -> Option<Json<Value>> {
    let post = Post::find_by_slug(pool, slug).filter(Post::is_published)?;

    let views = match ViewCounter::record(pool, CONTENT_TYPE_POST, &post.slug) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Failed to record view for post '{}': {}", post.slug, e);
            ViewCounter::get(pool, CONTENT_TYPE_POST, &post.slug)
                .map(|c| c.views)
                .unwrap_or(0)
        }
    };

    Some(Json(post_detail(&post, views)))
}

// ── Course catalog ─────────────────────────────────────

#[get("/courses")]
pub fn courses_index(pool: &State<DbPool>) -> Json<Value> {
    let courses = Course::active(pool);
    Json(json!({ "courses": courses }))
}

#[get("/courses/<slug>")]
pub fn course_show(pool: &State<DbPool>, slug: &str) -> Option<Json<Course>> {
    Course::find_by_slug(pool, slug)
        .filter(|c| c.status == "active")
        .map(Json)
}

// ── Testimonials ───────────────────────────────────────

#[get("/testimonials")]
pub fn testimonials_index(pool: &State<DbPool>) -> Json<Value> {
    let testimonials = Testimonial::approved(pool);
    Json(json!({ "testimonials": testimonials }))
}

// ── Site metadata ──────────────────────────────────────

#[get("/site")]
pub fn site_info(pool: &State<DbPool>) -> Json<Value> {
    let all = Setting::all(pool);
    let mut out = serde_json::Map::new();
    for key in PUBLIC_SETTINGS {
        if let Some(value) = all.get(*key) {
            out.insert(key.to_string(), Value::String(value.clone()));
        }
    }
    Json(Value::Object(out))
}

// ── Landing page views ─────────────────────────────────

fn valid_page_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 100
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Record a landing-page view. Same daily-increment rule as posts; landing
/// pages have no content row, so the slug is taken as-is after validation.
#[post("/views/<slug>")]
pub fn record_page_view(pool: &State<DbPool>, slug: &str) -> Result<Json<Value>, ApiError> {
    if !valid_page_slug(slug) {
        return Err(api_error(
            Status::UnprocessableEntity,
            "Slug may only contain lowercase letters, digits, and hyphens",
        ));
    }

    let views = ViewCounter::record(pool, CONTENT_TYPE_PAGE, slug).map_err(|e| {
        log::warn!("Failed to record view for page '{}': {}", slug, e);
        api_error(Status::InternalServerError, "Failed to record view")
    })?;

    Ok(Json(json!({"success": true, "views": views})))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        posts_index,
        post_show,
        courses_index,
        course_show,
        testimonials_index,
        site_info,
        record_page_view,
    ]
}
