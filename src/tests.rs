#![cfg(test)]

use chrono::{Duration, Local, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::Client;
use std::collections::HashMap;

use crate::auth;
use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::models::course::{Course, CourseForm};
use crate::models::post::{Post, PostForm};
use crate::models::settings::Setting;
use crate::models::testimonial::{Testimonial, TestimonialForm};
use crate::models::user::User;
use crate::models::view::ViewCounter;
use crate::rate_limit::RateLimiter;
use crate::render;

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Create a fresh in-memory SQLite pool with all migrations + seed defaults applied.
/// Uses a named shared-cache in-memory DB so multiple connections see the same data
/// (needed because session_get_user holds one conn while calling User::get_by_id).
/// Pre-seeds the admin user with a fast bcrypt hash to keep the expensive
/// DEFAULT_COST hash in seed_defaults out of the test path.
fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri);
    let pool = Pool::builder()
        .max_size(2)
        .build(manager)
        .expect("Failed to create test pool");
    {
        let conn = pool.get().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    }
    run_migrations(&pool).expect("Failed to run migrations");
    // Pre-insert the admin user so seed_defaults skips the slow bcrypt call
    {
        let conn = pool.get().unwrap();
        let fast = bcrypt::hash("admin", 4).unwrap();
        conn.execute(
            "INSERT INTO users (email, password_hash, display_name, status)
             VALUES ('admin@example.com', ?1, 'Admin', 'active')",
            rusqlite::params![fast],
        )
        .unwrap();
    }
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST=12).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let pool = test_pool();
    Setting::set(&pool, "test_key", "hello").unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("hello".to_string()));
}

#[test]
fn settings_get_or_default() {
    let pool = test_pool();
    assert_eq!(Setting::get_or(&pool, "nonexistent", "fallback"), "fallback");
    Setting::set(&pool, "exists", "val").unwrap();
    assert_eq!(Setting::get_or(&pool, "exists", "fallback"), "val");
}

#[test]
fn settings_get_bool() {
    let pool = test_pool();
    Setting::set(&pool, "flag_true", "true").unwrap();
    Setting::set(&pool, "flag_one", "1").unwrap();
    Setting::set(&pool, "flag_false", "false").unwrap();
    assert!(Setting::get_bool(&pool, "flag_true"));
    assert!(Setting::get_bool(&pool, "flag_one"));
    assert!(!Setting::get_bool(&pool, "flag_false"));
    assert!(!Setting::get_bool(&pool, "missing_flag"));
}

#[test]
fn settings_get_i64() {
    let pool = test_pool();
    Setting::set(&pool, "num", "42").unwrap();
    assert_eq!(Setting::get_i64(&pool, "num"), 42);
    assert_eq!(Setting::get_i64(&pool, "missing"), 0);
}

#[test]
fn settings_set_many() {
    let pool = test_pool();
    let mut map = HashMap::new();
    map.insert("k1".to_string(), "v1".to_string());
    map.insert("k2".to_string(), "v2".to_string());
    Setting::set_many(&pool, &map).unwrap();
    assert_eq!(Setting::get(&pool, "k1"), Some("v1".to_string()));
    assert_eq!(Setting::get(&pool, "k2"), Some("v2".to_string()));
}

#[test]
fn settings_upsert() {
    let pool = test_pool();
    Setting::set(&pool, "key", "first").unwrap();
    Setting::set(&pool, "key", "second").unwrap();
    assert_eq!(Setting::get(&pool, "key"), Some("second".to_string()));
}

#[test]
fn settings_seeded() {
    let pool = test_pool();
    assert_eq!(Setting::get_or(&pool, "site_name", ""), "CourseCraft");
    assert_eq!(Setting::get_i64(&pool, "session_expiry_hours"), 24);
    assert!(Setting::all(&pool).len() > 5);
}

// ═══════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════

#[test]
fn user_create_and_find() {
    let pool = test_pool();
    let id = User::create(&pool, "test@example.com", &fast_hash("pw"), "Test User").unwrap();
    assert!(id > 0);

    let user = User::get_by_id(&pool, id).expect("user not found by id");
    assert_eq!(user.email, "test@example.com");
    assert_eq!(user.display_name, "Test User");
    assert!(user.is_active());

    let user2 = User::get_by_email(&pool, "test@example.com").expect("user not found by email");
    assert_eq!(user2.id, id);

    // Seeded admin plus the one just created
    assert_eq!(User::count(&pool), 2);
}

#[test]
fn user_duplicate_email_rejected() {
    let pool = test_pool();
    User::create(&pool, "dup@example.com", &fast_hash("pw"), "First").unwrap();
    let err = User::create(&pool, "dup@example.com", &fast_hash("pw"), "Second").unwrap_err();
    assert_eq!(err, "duplicate email");
}

#[test]
fn user_update_password() {
    let pool = test_pool();
    let id = User::create(&pool, "pw@example.com", &fast_hash("old"), "P").unwrap();
    User::update_password(&pool, id, &fast_hash("new")).unwrap();
    let user = User::get_by_id(&pool, id).unwrap();
    assert!(auth::verify_password("new", &user.password_hash));
    assert!(!auth::verify_password("old", &user.password_hash));
}

#[test]
fn user_lock_unlock() {
    let pool = test_pool();
    let id = User::create(&pool, "lock@example.com", &fast_hash("pw"), "L").unwrap();
    let token = auth::create_session(&pool, id, None, None).unwrap();

    User::lock(&pool, id).unwrap();
    let user = User::get_by_id(&pool, id).unwrap();
    assert_eq!(user.status, "locked");
    // Locking revokes sessions
    assert!(auth::session_get_user(&pool, &token).is_none());

    User::unlock(&pool, id).unwrap();
    assert!(User::get_by_id(&pool, id).unwrap().is_active());
}

#[test]
fn user_safe_json_hides_hash() {
    let pool = test_pool();
    let user = User::get_by_email(&pool, "admin@example.com").unwrap();
    let safe = user.safe_json();
    assert!(safe.get("password_hash").is_none());
    assert_eq!(safe["email"], "admin@example.com");
}

// ═══════════════════════════════════════════════════════════
// Posts
// ═══════════════════════════════════════════════════════════

fn make_post_form(title: &str, slug: &str, status: &str) -> PostForm {
    PostForm {
        title: title.to_string(),
        slug: slug.to_string(),
        body_markdown: "# Hello".to_string(),
        body_html: "<h1>Hello</h1>".to_string(),
        excerpt: Some("excerpt".to_string()),
        featured_image: None,
        meta_title: None,
        meta_description: None,
        status: status.to_string(),
        published_at: None,
    }
}

#[test]
fn post_crud() {
    let pool = test_pool();

    let id = Post::create(&pool, &make_post_form("Hello", "hello", "draft")).unwrap();
    assert!(id > 0);

    let post = Post::find_by_id(&pool, id).unwrap();
    assert_eq!(post.title, "Hello");
    assert_eq!(post.slug, "hello");
    assert_eq!(post.status, "draft");

    let post2 = Post::find_by_slug(&pool, "hello").unwrap();
    assert_eq!(post2.id, id);

    let mut form = make_post_form("Updated", "hello", "published");
    form.published_at = Some("2026-01-01T12:00".to_string());
    Post::update(&pool, id, &form).unwrap();
    let updated = Post::find_by_id(&pool, id).unwrap();
    assert_eq!(updated.title, "Updated");
    assert_eq!(updated.status, "published");
    assert!(updated.published_at.is_some());

    assert_eq!(Post::count(&pool, None), 1);
    assert_eq!(Post::count(&pool, Some("published")), 1);
    assert_eq!(Post::count(&pool, Some("draft")), 0);

    Post::delete(&pool, id).unwrap();
    assert!(Post::find_by_id(&pool, id).is_none());
    assert_eq!(Post::count(&pool, None), 0);
}

#[test]
fn post_duplicate_slug_rejected() {
    let pool = test_pool();
    Post::create(&pool, &make_post_form("One", "same-slug", "draft")).unwrap();
    let err = Post::create(&pool, &make_post_form("Two", "same-slug", "draft")).unwrap_err();
    assert!(err.contains("UNIQUE constraint failed"));
}

#[test]
fn post_published_excludes_drafts() {
    let pool = test_pool();
    let mut published = make_post_form("Live", "live", "published");
    published.published_at = Some("2026-01-01T12:00".to_string());
    Post::create(&pool, &published).unwrap();
    Post::create(&pool, &make_post_form("Hidden", "hidden", "draft")).unwrap();

    let listed = Post::published(&pool, 10, 0);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].slug, "live");
}

#[test]
fn post_update_status() {
    let pool = test_pool();
    let id = Post::create(&pool, &make_post_form("S", "s", "draft")).unwrap();
    Post::update_status(&pool, id, "archived").unwrap();
    assert_eq!(Post::find_by_id(&pool, id).unwrap().status, "archived");

    assert!(Post::update_status(&pool, id, "bogus").is_err());
}

#[test]
fn post_form_validation() {
    let empty_title = make_post_form("   ", "slug", "draft");
    assert!(empty_title.validate().is_err());

    let bad_slug = make_post_form("T", "Bad Slug!", "draft");
    assert!(bad_slug.validate().is_err());

    let bad_status = make_post_form("T", "t", "bogus");
    assert!(bad_status.validate().is_err());

    let ok = make_post_form("T", "t-1", "draft");
    assert!(ok.validate().is_ok());
}

// ═══════════════════════════════════════════════════════════
// Courses
// ═══════════════════════════════════════════════════════════

fn make_course_form(title: &str, slug: &str, status: &str) -> CourseForm {
    CourseForm {
        title: title.to_string(),
        slug: slug.to_string(),
        summary: Some("A course".to_string()),
        description_markdown: "Learn things".to_string(),
        description_html: "<p>Learn things</p>".to_string(),
        price_cents: 19900,
        currency: "USD".to_string(),
        level: Some("beginner".to_string()),
        duration_weeks: Some(6),
        checkout_url: Some("https://pay.example.com/checkout/1".to_string()),
        featured_image: None,
        meta_title: None,
        meta_description: None,
        status: status.to_string(),
        sort_order: Some(0),
    }
}

#[test]
fn course_crud() {
    let pool = test_pool();

    let id = Course::create(&pool, &make_course_form("Email Marketing", "email-marketing", "draft"))
        .unwrap();
    assert!(id > 0);

    let course = Course::find_by_id(&pool, id).unwrap();
    assert_eq!(course.title, "Email Marketing");
    assert_eq!(course.price_cents, 19900);
    assert_eq!(course.currency, "USD");

    let course2 = Course::find_by_slug(&pool, "email-marketing").unwrap();
    assert_eq!(course2.id, id);

    let mut form = make_course_form("Email Marketing Pro", "email-marketing", "active");
    form.price_cents = 24900;
    Course::update(&pool, id, &form).unwrap();
    let updated = Course::find_by_id(&pool, id).unwrap();
    assert_eq!(updated.title, "Email Marketing Pro");
    assert_eq!(updated.price_cents, 24900);
    assert_eq!(updated.status, "active");

    assert_eq!(Course::count(&pool, None), 1);
    assert_eq!(Course::count(&pool, Some("active")), 1);

    Course::delete(&pool, id).unwrap();
    assert!(Course::find_by_id(&pool, id).is_none());
}

#[test]
fn course_active_respects_sort_order() {
    let pool = test_pool();
    let mut second = make_course_form("Second", "second", "active");
    second.sort_order = Some(2);
    let mut first = make_course_form("First", "first", "active");
    first.sort_order = Some(1);
    let draft = make_course_form("Draft", "draft-course", "draft");

    Course::create(&pool, &second).unwrap();
    Course::create(&pool, &first).unwrap();
    Course::create(&pool, &draft).unwrap();

    let active = Course::active(&pool);
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].slug, "first");
    assert_eq!(active[1].slug, "second");
}

#[test]
fn course_form_validation() {
    let mut form = make_course_form("T", "t", "draft");
    assert!(form.validate().is_ok());

    form.price_cents = -1;
    assert!(form.validate().is_err());
    form.price_cents = 0;

    form.currency = "usd".to_string();
    assert!(form.validate().is_err());
    form.currency = "EUR".to_string();

    form.checkout_url = Some("not a url".to_string());
    assert!(form.validate().is_err());
    form.checkout_url = Some("https://example.com/buy".to_string());

    form.duration_weeks = Some(0);
    assert!(form.validate().is_err());
    form.duration_weeks = None;

    form.status = "bogus".to_string();
    assert!(form.validate().is_err());
    form.status = "active".to_string();

    assert!(form.validate().is_ok());
}

// ═══════════════════════════════════════════════════════════
// Testimonials
// ═══════════════════════════════════════════════════════════

fn make_testimonial_form(name: &str, status: &str, sort_order: i64) -> TestimonialForm {
    TestimonialForm {
        author_name: name.to_string(),
        author_role: Some("Founder".to_string()),
        quote: "Changed my business.".to_string(),
        avatar: None,
        rating: 5,
        status: status.to_string(),
        sort_order: Some(sort_order),
    }
}

#[test]
fn testimonial_crud() {
    let pool = test_pool();

    let id = Testimonial::create(&pool, &make_testimonial_form("Alice", "pending", 0)).unwrap();
    assert!(id > 0);

    let t = Testimonial::find_by_id(&pool, id).unwrap();
    assert_eq!(t.author_name, "Alice");
    assert_eq!(t.status, "pending");

    let mut form = make_testimonial_form("Alice B.", "approved", 1);
    form.rating = 4;
    Testimonial::update(&pool, id, &form).unwrap();
    let updated = Testimonial::find_by_id(&pool, id).unwrap();
    assert_eq!(updated.author_name, "Alice B.");
    assert_eq!(updated.rating, 4);
    assert_eq!(updated.status, "approved");

    assert_eq!(Testimonial::count(&pool, None), 1);
    assert_eq!(Testimonial::count(&pool, Some("approved")), 1);

    Testimonial::delete(&pool, id).unwrap();
    assert!(Testimonial::find_by_id(&pool, id).is_none());
}

#[test]
fn testimonial_approved_listing() {
    let pool = test_pool();
    Testimonial::create(&pool, &make_testimonial_form("Pending", "pending", 0)).unwrap();
    Testimonial::create(&pool, &make_testimonial_form("Later", "approved", 5)).unwrap();
    Testimonial::create(&pool, &make_testimonial_form("Sooner", "approved", 1)).unwrap();

    let approved = Testimonial::approved(&pool);
    assert_eq!(approved.len(), 2);
    assert_eq!(approved[0].author_name, "Sooner");
    assert_eq!(approved[1].author_name, "Later");
}

#[test]
fn testimonial_status_transitions() {
    let pool = test_pool();
    let id = Testimonial::create(&pool, &make_testimonial_form("T", "pending", 0)).unwrap();

    Testimonial::update_status(&pool, id, "approved").unwrap();
    assert_eq!(Testimonial::find_by_id(&pool, id).unwrap().status, "approved");

    Testimonial::update_status(&pool, id, "hidden").unwrap();
    assert_eq!(Testimonial::find_by_id(&pool, id).unwrap().status, "hidden");

    assert!(Testimonial::update_status(&pool, id, "bogus").is_err());
}

#[test]
fn testimonial_rating_validation() {
    let mut form = make_testimonial_form("R", "pending", 0);
    form.rating = 0;
    assert!(form.validate().is_err());
    form.rating = 6;
    assert!(form.validate().is_err());
    form.rating = 3;
    assert!(form.validate().is_ok());
}

// ═══════════════════════════════════════════════════════════
// View counters
// ═══════════════════════════════════════════════════════════

#[test]
fn view_counter_first_record_increments() {
    let pool = test_pool();
    let today = Local::now().date_naive();

    let views = ViewCounter::record_on(&pool, "post", "intro", today).unwrap();
    assert_eq!(views, 1);

    let counter = ViewCounter::get(&pool, "post", "intro").unwrap();
    assert_eq!(counter.views, 1);
    assert_eq!(counter.last_daily_increment, Some(today));
}

#[test]
fn view_counter_same_day_does_not_increment() {
    let pool = test_pool();
    let today = Local::now().date_naive();

    assert_eq!(ViewCounter::record_on(&pool, "post", "p", today).unwrap(), 1);
    assert_eq!(ViewCounter::record_on(&pool, "post", "p", today).unwrap(), 1);
    assert_eq!(ViewCounter::record_on(&pool, "post", "p", today).unwrap(), 1);

    let counter = ViewCounter::get(&pool, "post", "p").unwrap();
    assert_eq!(counter.views, 1);
}

#[test]
fn view_counter_next_day_increments_once() {
    let pool = test_pool();
    let yesterday = Local::now().date_naive() - Duration::days(1);
    let today = Local::now().date_naive();

    assert_eq!(ViewCounter::record_on(&pool, "page", "pricing", yesterday).unwrap(), 1);
    assert_eq!(ViewCounter::record_on(&pool, "page", "pricing", today).unwrap(), 2);
    // Repeat on the same day is a no-op
    assert_eq!(ViewCounter::record_on(&pool, "page", "pricing", today).unwrap(), 2);

    let counter = ViewCounter::get(&pool, "page", "pricing").unwrap();
    assert_eq!(counter.views, 2);
    assert_eq!(counter.last_daily_increment, Some(today));
}

#[test]
fn view_counter_keys_are_independent() {
    let pool = test_pool();
    let today = Local::now().date_naive();

    ViewCounter::record_on(&pool, "post", "a", today).unwrap();
    ViewCounter::record_on(&pool, "post", "b", today).unwrap();
    // Same slug under a different content type is a separate counter
    ViewCounter::record_on(&pool, "page", "a", today).unwrap();

    assert_eq!(ViewCounter::get(&pool, "post", "a").unwrap().views, 1);
    assert_eq!(ViewCounter::get(&pool, "post", "b").unwrap().views, 1);
    assert_eq!(ViewCounter::get(&pool, "page", "a").unwrap().views, 1);
    assert_eq!(ViewCounter::total_views(&pool), 3);
}

#[test]
fn view_counter_get_missing_is_none() {
    let pool = test_pool();
    assert!(ViewCounter::get(&pool, "post", "never-seen").is_none());
}

#[test]
fn view_counter_top_viewed() {
    let pool = test_pool();
    let start = Local::now().date_naive() - Duration::days(10);

    // "busy" viewed on three days, "quiet" on one
    for offset in 0..3 {
        ViewCounter::record_on(&pool, "post", "busy", start + Duration::days(offset)).unwrap();
    }
    ViewCounter::record_on(&pool, "page", "quiet", start).unwrap();

    let top = ViewCounter::top_viewed(&pool, 10);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].label, "post:busy");
    assert_eq!(top[0].count, 3);
    assert_eq!(top[1].count, 1);
}

#[test]
fn view_counter_list_filters_by_type() {
    let pool = test_pool();
    let today = Local::now().date_naive();
    ViewCounter::record_on(&pool, "post", "one", today).unwrap();
    ViewCounter::record_on(&pool, "page", "two", today).unwrap();

    let posts_only = ViewCounter::list(&pool, Some("post"), 10, 0);
    assert_eq!(posts_only.len(), 1);
    assert_eq!(posts_only[0].content_key, "one");

    let all = ViewCounter::list(&pool, None, 10, 0);
    assert_eq!(all.len(), 2);
}

#[test]
fn overview_stats_aggregate() {
    let pool = test_pool();
    let mut live = make_post_form("Live", "live", "published");
    live.published_at = Some("2026-01-01T12:00".to_string());
    Post::create(&pool, &live).unwrap();
    Post::create(&pool, &make_post_form("Draft", "draft-post", "draft")).unwrap();
    Course::create(&pool, &make_course_form("C", "c", "active")).unwrap();
    Testimonial::create(&pool, &make_testimonial_form("T", "pending", 0)).unwrap();

    let today = Local::now().date_naive();
    ViewCounter::record_on(&pool, "post", "live", today).unwrap();
    ViewCounter::record_on(&pool, "page", "home", today - Duration::days(1)).unwrap();

    let stats = ViewCounter::overview(&pool);
    assert_eq!(stats.posts_total, 2);
    assert_eq!(stats.posts_published, 1);
    assert_eq!(stats.posts_draft, 1);
    assert_eq!(stats.courses_total, 1);
    assert_eq!(stats.courses_active, 1);
    assert_eq!(stats.testimonials_pending, 1);
    assert_eq!(stats.total_views, 2);
    assert_eq!(stats.counters_tracked, 2);
    assert_eq!(stats.viewed_today, 1);
}

// ═══════════════════════════════════════════════════════════
// Auth
// ═══════════════════════════════════════════════════════════

#[test]
fn password_hash_roundtrip() {
    let hash = fast_hash("hunter42");
    assert!(auth::verify_password("hunter42", &hash));
    assert!(!auth::verify_password("wrong", &hash));
}

#[test]
fn session_lifecycle() {
    let pool = test_pool();
    let user = User::get_by_email(&pool, "admin@example.com").unwrap();

    let token = auth::create_session(&pool, user.id, Some("127.0.0.1"), None).unwrap();
    assert!(!token.is_empty());

    let resolved = auth::session_get_user(&pool, &token).expect("session should resolve");
    assert_eq!(resolved.id, user.id);

    auth::destroy_session(&pool, &token).unwrap();
    assert!(auth::session_get_user(&pool, &token).is_none());
}

#[test]
fn session_expired_is_rejected() {
    let pool = test_pool();
    let user = User::get_by_email(&pool, "admin@example.com").unwrap();

    let past = (Utc::now().naive_utc() - Duration::hours(1))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO sessions (token, user_id, created_at, expires_at)
             VALUES ('stale-token', ?1, ?2, ?2)",
            rusqlite::params![user.id, past],
        )
        .unwrap();
    }

    assert!(auth::session_get_user(&pool, "stale-token").is_none());

    auth::cleanup_expired_sessions(&pool);
    let conn = pool.get().unwrap();
    let remaining: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sessions WHERE token = 'stale-token'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn password_change_revokes_other_sessions() {
    let pool = test_pool();
    let user = User::get_by_email(&pool, "admin@example.com").unwrap();

    let keep = auth::create_session(&pool, user.id, None, None).unwrap();
    let other = auth::create_session(&pool, user.id, None, None).unwrap();

    auth::destroy_other_sessions(&pool, user.id, &keep).unwrap();

    assert!(auth::session_get_user(&pool, &keep).is_some());
    assert!(auth::session_get_user(&pool, &other).is_none());
}

#[test]
fn identity_hash_is_stable() {
    let a = auth::hash_identity("admin@example.com|1.2.3.4");
    let b = auth::hash_identity("admin@example.com|1.2.3.4");
    let c = auth::hash_identity("admin@example.com|5.6.7.8");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64);
}

// ═══════════════════════════════════════════════════════════
// Rate limiter
// ═══════════════════════════════════════════════════════════

#[test]
fn rate_limiter_blocks_over_limit() {
    let limiter = RateLimiter::new();
    let window = std::time::Duration::from_secs(60);

    for _ in 0..3 {
        assert!(limiter.check_and_record("login:abc", 3, window));
    }
    assert!(!limiter.check_and_record("login:abc", 3, window));

    // Other keys are unaffected
    assert!(limiter.check_and_record("login:xyz", 3, window));
}

// ═══════════════════════════════════════════════════════════
// Markdown rendering
// ═══════════════════════════════════════════════════════════

#[test]
fn markdown_renders_basics() {
    let html = render::markdown_to_html("# Title\n\nSome **bold** text.");
    assert!(html.contains("<h1>Title</h1>"));
    assert!(html.contains("<strong>bold</strong>"));
}

#[test]
fn markdown_renders_tables() {
    let html = render::markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |");
    assert!(html.contains("<table>"));
}

// ═══════════════════════════════════════════════════════════
// HTTP surface
// ═══════════════════════════════════════════════════════════

fn test_client() -> Client {
    Client::tracked(crate::build_rocket(test_pool())).expect("valid rocket instance")
}

fn login_token(client: &Client) -> String {
    let response = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "admin@example.com", "password": "admin"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value = response.into_json().unwrap();
    body["token"].as_str().unwrap().to_string()
}

fn bearer(token: &str) -> Header<'static> {
    Header::new("Authorization", format!("Bearer {}", token))
}

#[test]
fn admin_endpoint_requires_token() {
    let client = test_client();

    let response = client.get("/api/admin/stats/overview").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
    let body: serde_json::Value = response.into_json().unwrap();
    assert_eq!(body["success"], false);
}

#[test]
fn admin_endpoint_rejects_bogus_token() {
    let client = test_client();

    let response = client
        .get("/api/admin/posts")
        .header(bearer("not-a-real-token"))
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn login_with_wrong_password_fails() {
    let client = test_client();

    let response = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "admin@example.com", "password": "wrong"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
    let body: serde_json::Value = response.into_json().unwrap();
    assert!(body.get("token").is_none());
}

#[test]
fn login_with_unknown_email_fails() {
    let client = test_client();

    let response = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "nobody@example.com", "password": "admin"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn login_returns_usable_token() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .get("/api/admin/stats/overview")
        .header(bearer(&token))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value = response.into_json().unwrap();
    assert!(body["posts_total"].is_number());
}

#[test]
fn logout_invalidates_token() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .post("/api/auth/logout")
        .header(bearer(&token))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = client
        .get("/api/admin/stats/overview")
        .header(bearer(&token))
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn password_change_flow() {
    let client = test_client();
    let token = login_token(&client);

    // Wrong current password
    let response = client
        .post("/api/auth/password")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"current_password": "wrong", "new_password": "longenough"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    // Too-short new password
    let response = client
        .post("/api/auth/password")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"current_password": "admin", "new_password": "short"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);

    // Valid change
    let response = client
        .post("/api/auth/password")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"current_password": "admin", "new_password": "longenough"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    // Old password no longer works
    let response = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "admin@example.com", "password": "admin"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    // New password does
    let response = client
        .post("/api/auth/login")
        .header(ContentType::JSON)
        .body(r#"{"email": "admin@example.com", "password": "longenough"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn post_create_and_fetch_via_api() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .post("/api/admin/posts")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(
            r##"{
                "title": "Launch Week",
                "body_markdown": "# Big news\n\nWe launched.",
                "excerpt": "We launched.",
                "status": "published"
            }"##,
        )
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value = response.into_json().unwrap();
    let id = body["id"].as_i64().unwrap();

    // Slug was derived from the title, markdown was rendered
    let response = client
        .get(format!("/api/admin/posts/{}", id))
        .header(bearer(&token))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let post: serde_json::Value = response.into_json().unwrap();
    assert_eq!(post["slug"], "launch-week");
    assert!(post["body_html"].as_str().unwrap().contains("<h1>Big news</h1>"));

    // Publicly visible
    let response = client.get("/api/posts/launch-week").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let public: serde_json::Value = response.into_json().unwrap();
    assert_eq!(public["title"], "Launch Week");
    assert_eq!(public["views"], 1);
}

#[test]
fn post_validation_failure_is_422() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .post("/api/admin/posts")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"title": "Bad", "body_markdown": "", "status": "bogus"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[test]
fn draft_post_is_not_public() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .post("/api/admin/posts")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"title": "Secret", "slug": "secret", "body_markdown": "x", "status": "draft"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = client.get("/api/posts/secret").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn public_post_view_counts_once_per_day() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .post("/api/admin/posts")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"title": "Counted", "slug": "counted", "body_markdown": "x", "status": "published"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let first: serde_json::Value = client
        .get("/api/posts/counted")
        .dispatch()
        .into_json()
        .unwrap();
    let second: serde_json::Value = client
        .get("/api/posts/counted")
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(first["views"], 1);
    assert_eq!(second["views"], 1);
}

#[test]
fn landing_page_view_recording() {
    let client = test_client();

    let response = client.post("/api/views/spring-sale").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value = response.into_json().unwrap();
    assert_eq!(body["views"], 1);

    // Same day: unchanged
    let body: serde_json::Value = client
        .post("/api/views/spring-sale")
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(body["views"], 1);

    // Bad slug rejected
    let response = client.post("/api/views/Bad%20Slug").dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[test]
fn duplicate_slug_is_conflict() {
    let client = test_client();
    let token = login_token(&client);

    for expected in [Status::Ok, Status::Conflict] {
        let response = client
            .post("/api/admin/posts")
            .header(ContentType::JSON)
            .header(bearer(&token))
            .body(r#"{"title": "Same", "slug": "same", "body_markdown": "x", "status": "draft"}"#)
            .dispatch();
        assert_eq!(response.status(), expected);
    }
}

#[test]
fn course_catalog_public_listing() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .post("/api/admin/courses")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(
            r#"{
                "title": "Store Foundations",
                "description_markdown": "Build your first store.",
                "price_cents": 49900,
                "status": "active",
                "checkout_url": "https://pay.example.com/store-foundations"
            }"#,
        )
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = client.get("/api/courses").dispatch().into_json().unwrap();
    let courses = body["courses"].as_array().unwrap();
    assert_eq!(courses.len(), 1);
    assert_eq!(courses[0]["slug"], "store-foundations");
    // Currency fell back to the catalog default
    assert_eq!(courses[0]["currency"], "USD");

    let response = client.get("/api/courses/store-foundations").dispatch();
    assert_eq!(response.status(), Status::Ok);
}

#[test]
fn testimonial_moderation_via_api() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .post("/api/admin/testimonials")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"author_name": "Dana", "quote": "Five stars. Brilliant.", "rating": 5}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body: serde_json::Value = response.into_json().unwrap();
    let id = body["id"].as_i64().unwrap();

    // Pending testimonials are not public
    let body: serde_json::Value = client
        .get("/api/testimonials")
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(body["testimonials"].as_array().unwrap().len(), 0);

    let response = client
        .post(format!("/api/admin/testimonials/{}/approve", id))
        .header(bearer(&token))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = client
        .get("/api/testimonials")
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(body["testimonials"].as_array().unwrap().len(), 1);
}

#[test]
fn settings_roundtrip_via_api() {
    let client = test_client();
    let token = login_token(&client);

    let response = client
        .put("/api/admin/settings")
        .header(ContentType::JSON)
        .header(bearer(&token))
        .body(r#"{"site_tagline": "New tagline"}"#)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let body: serde_json::Value = client
        .get("/api/admin/settings")
        .header(bearer(&token))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(body["site_tagline"], "New tagline");

    // Public site info reflects the change and omits private keys
    let body: serde_json::Value = client.get("/api/site").dispatch().into_json().unwrap();
    assert_eq!(body["site_tagline"], "New tagline");
    assert!(body.get("session_expiry_hours").is_none());
}

#[test]
fn stats_views_endpoint() {
    let client = test_client();
    let token = login_token(&client);

    client.post("/api/views/home").dispatch();
    client.post("/api/views/pricing").dispatch();

    let body: serde_json::Value = client
        .get("/api/admin/stats/views?content_type=page")
        .header(bearer(&token))
        .dispatch()
        .into_json()
        .unwrap();
    assert_eq!(body["counters"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_views"], 2);
}
