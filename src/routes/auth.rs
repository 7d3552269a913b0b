use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{api_error, ApiError};
use crate::auth::{self, AdminUser, ClientIp};
use crate::db::DbPool;
use crate::models::settings::Setting;
use crate::models::user::User;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

#[post("/login", format = "json", data = "<body>")]
pub fn login(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    client_ip: ClientIp,
    body: Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let identity = auth::hash_identity(&format!("{}|{}", body.email, client_ip.0));
    let rate_key = format!("login:{}", identity);
    let max_attempts = Setting::get_i64(pool, "login_rate_limit").max(1) as u64;
    let window = std::time::Duration::from_secs(15 * 60);

    if !limiter.check_and_record(&rate_key, max_attempts, window) {
        return Err(api_error(
            Status::TooManyRequests,
            "Too many login attempts. Please try again in 15 minutes.",
        ));
    }

    let user = match User::get_by_email(pool, body.email.trim()) {
        Some(u) if u.is_active() => u,
        _ => {
            log::warn!("Rejected login for {}", body.email);
            return Err(api_error(Status::Unauthorized, "Invalid credentials"));
        }
    };

    if !auth::verify_password(&body.password, &user.password_hash) {
        log::warn!("Rejected login for {}", body.email);
        return Err(api_error(Status::Unauthorized, "Invalid credentials"));
    }

    // Opportunistic sweep — expired rows are also rejected at guard time.
    auth::cleanup_expired_sessions(pool);

    let token = auth::create_session(pool, user.id, Some(&client_ip.0), None)
        .map_err(|_| api_error(Status::InternalServerError, "Session creation failed"))?;
    let _ = User::touch_last_login(pool, user.id);

    Ok(Json(json!({
        "success": true,
        "token": token,
        "user": user.safe_json(),
    })))
}

#[post("/logout")]
pub fn logout(admin: AdminUser, pool: &State<DbPool>) -> Json<Value> {
    let _ = auth::destroy_session(pool, &admin.token);
    Json(json!({"success": true}))
}

#[post("/password", format = "json", data = "<body>")]
pub fn change_password(
    admin: AdminUser,
    pool: &State<DbPool>,
    body: Json<PasswordChangeRequest>,
) -> Result<Json<Value>, ApiError> {
    if !auth::verify_password(&body.current_password, &admin.user.password_hash) {
        return Err(api_error(Status::Unauthorized, "Current password is incorrect"));
    }
    if body.new_password.len() < 8 {
        return Err(api_error(
            Status::UnprocessableEntity,
            "Password must be at least 8 characters",
        ));
    }

    let hash = auth::hash_password(&body.new_password)
        .map_err(|_| api_error(Status::InternalServerError, "Failed to hash password"))?;
    User::update_password(pool, admin.user.id, &hash)
        .map_err(|e| api_error(Status::InternalServerError, &e))?;

    // Stolen tokens die with the old password; the caller stays signed in.
    let _ = auth::destroy_other_sessions(pool, admin.user.id, &admin.token);

    Ok(Json(json!({"success": true})))
}

#[get("/me")]
pub fn me(admin: AdminUser) -> Json<Value> {
    Json(admin.user.safe_json())
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login, logout, change_password, me]
}
