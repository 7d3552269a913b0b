use log::warn;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

pub const DEFAULT_DB_PATH: &str = "data/db/coursecraft.db";

/// Resolve the database file path. `COURSECRAFT_DB` overrides the default
/// so deployments can point at a mounted volume.
pub fn db_path() -> String {
    std::env::var("COURSECRAFT_DB").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string())
}

pub fn init_pool() -> Result<DbPool, Box<dyn std::error::Error>> {
    let manager = SqliteConnectionManager::file(db_path());
    let pool = Pool::builder().max_size(10).build(manager)?;

    // Enable WAL mode for better concurrent read performance
    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Blog posts
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            body_markdown TEXT NOT NULL DEFAULT '',
            body_html TEXT NOT NULL DEFAULT '',
            excerpt TEXT,
            featured_image TEXT,
            meta_title TEXT,
            meta_description TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            published_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Course catalog
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            summary TEXT,
            description_markdown TEXT NOT NULL DEFAULT '',
            description_html TEXT NOT NULL DEFAULT '',
            price_cents INTEGER NOT NULL DEFAULT 0,
            currency TEXT NOT NULL DEFAULT 'USD',
            level TEXT,
            duration_weeks INTEGER,
            checkout_url TEXT,
            featured_image TEXT,
            meta_title TEXT,
            meta_description TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Testimonials
        CREATE TABLE IF NOT EXISTS testimonials (
            id INTEGER PRIMARY KEY,
            author_name TEXT NOT NULL,
            author_role TEXT,
            quote TEXT NOT NULL,
            avatar TEXT,
            rating INTEGER NOT NULL DEFAULT 5,
            status TEXT NOT NULL DEFAULT 'pending',
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        -- Admin users
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            display_name TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'active',
            last_login_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Admin sessions (bearer tokens)
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        -- Per-item view counters, one increment per calendar day
        CREATE TABLE IF NOT EXISTS view_counters (
            id INTEGER PRIMARY KEY,
            content_type TEXT NOT NULL,
            content_key TEXT NOT NULL,
            views INTEGER NOT NULL DEFAULT 0,
            last_daily_increment DATE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(content_type, content_key)
        );

        CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status);
        CREATE INDEX IF NOT EXISTS idx_courses_status ON courses(status);
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_counters_views ON view_counters(views);
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        // Site identity
        ("site_name", "CourseCraft"),
        ("site_tagline", "Learn the craft. Build the business."),
        ("site_url", "http://localhost:8000"),
        ("contact_email", ""),
        // Blog
        ("posts_per_page", "10"),
        ("blog_show_excerpts", "true"),
        // Catalog
        ("catalog_currency", "USD"),
        ("catalog_show_prices", "true"),
        // Testimonials
        ("testimonials_require_approval", "true"),
        // Security
        ("session_expiry_hours", "24"),
        ("login_rate_limit", "5"),
        // Social links
        ("social_instagram", ""),
        ("social_twitter", ""),
        ("social_youtube", ""),
        ("social_linkedin", ""),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    // Seed the first admin account if no users exist.
    // Default password: "admin" — user MUST change it on first login.
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

    if user_count == 0 {
        let hash = bcrypt::hash("admin", bcrypt::DEFAULT_COST)?;
        conn.execute(
            "INSERT INTO users (email, password_hash, display_name, status)
             VALUES ('admin@example.com', ?1, 'Admin', 'active')",
            params![hash],
        )?;
        warn!("Seeded default admin account admin@example.com with password 'admin' — change it now");
    }

    Ok(())
}
