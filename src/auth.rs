use chrono::{Duration, Utc};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use rusqlite::params;
use sha2::{Digest, Sha256};

use crate::db::DbPool;
use crate::models::settings::Setting;
use crate::models::user::User;

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Client IP request guard ──

/// Extracts the real client IP from the request.
/// Checks headers in priority order:
///   1. CF-Connecting-IP (Cloudflare)
///   2. X-Real-IP (nginx proxy_set_header)
///   3. X-Forwarded-For (first IP in the chain = original client)
///   4. Rocket's client_ip() (socket peer address)
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        for header in ["CF-Connecting-IP", "X-Real-IP"] {
            if let Some(ip) = headers.get_one(header) {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Outcome::Success(ClientIp(ip.to_string()));
                }
            }
        }

        // X-Forwarded-For: client, proxy1, proxy2 — take the first (leftmost)
        if let Some(forwarded) = headers.get_one("X-Forwarded-For") {
            if let Some(ip) = forwarded.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Outcome::Success(ClientIp(ip.to_string()));
                }
            }
        }

        let ip = request
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

// ── Admin request guard (bearer token) ──

/// Guard: a request carrying `Authorization: Bearer <token>` that resolves
/// to an unexpired session of an active user. Failure surfaces as 401
/// through the JSON catcher.
pub struct AdminUser {
    pub user: User,
    pub token: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pool = match request.guard::<&State<DbPool>>().await.succeeded() {
            Some(p) => p,
            None => return Outcome::Error((Status::Unauthorized, ())),
        };

        let token = match bearer_token(request) {
            Some(t) => t,
            None => return Outcome::Error((Status::Unauthorized, ())),
        };

        match session_get_user(pool, &token) {
            Some(user) if user.is_active() => Outcome::Success(AdminUser { user, token }),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

fn bearer_token(request: &Request<'_>) -> Option<String> {
    let header = request.headers().get_one("Authorization")?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

// ── Password utilities ──

pub fn hash_password(password: &str) -> Result<String, String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// ── Session management ──

/// Create a session row and return the opaque token the client must present
/// on subsequent admin calls. Expiry comes from the `session_expiry_hours`
/// setting.
pub fn create_session(
    pool: &DbPool,
    user_id: i64,
    ip: Option<&str>,
    ua: Option<&str>,
) -> Result<String, String> {
    let expiry_hours = Setting::get_i64(pool, "session_expiry_hours").max(1);
    let token = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();
    let expires = now + Duration::hours(expiry_hours);

    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            token,
            user_id,
            now.format(DATETIME_FMT).to_string(),
            expires.format(DATETIME_FMT).to_string(),
            ip,
            ua,
        ],
    )
    .map_err(|e| e.to_string())?;

    Ok(token)
}

/// Resolve an unexpired session token to its user.
pub fn session_get_user(pool: &DbPool, token: &str) -> Option<User> {
    let conn = pool.get().ok()?;
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let user_id: i64 = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > ?2",
            params![token, now],
            |row| row.get(0),
        )
        .ok()?;
    User::get_by_id(pool, user_id)
}

pub fn destroy_session(pool: &DbPool, token: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Revoke every session of a user except the one presented. Used after a
/// password change so stolen tokens die with the old password.
pub fn destroy_other_sessions(pool: &DbPool, user_id: i64, keep_token: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND token != ?2",
        params![user_id, keep_token],
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

pub fn cleanup_expired_sessions(pool: &DbPool) {
    if let Ok(conn) = pool.get() {
        let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
        let _ = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now]);
    }
}

// ── Rate limiting identity ──

pub fn hash_identity(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}
