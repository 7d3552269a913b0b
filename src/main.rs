#[macro_use]
extern crate rocket;

use rocket::serde::json::Json;
use serde_json::{json, Value};

mod auth;
mod boot;
mod db;
mod models;
mod rate_limit;
mod render;
mod routes;

#[cfg(test)]
mod tests;

use rate_limit::RateLimiter;

#[catch(400)]
fn bad_request() -> Json<Value> {
    Json(json!({"success": false, "error": "Bad request"}))
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    Json(json!({"success": false, "error": "Authentication required"}))
}

#[catch(404)]
fn not_found() -> Json<Value> {
    Json(json!({"success": false, "error": "Not found"}))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    Json(json!({"success": false, "error": "Invalid request body"}))
}

#[catch(500)]
fn server_error() -> Json<Value> {
    Json(json!({"success": false, "error": "Internal server error"}))
}

/// Assemble the Rocket instance around an initialized pool. Shared with the
/// test harness, which supplies an in-memory pool.
pub fn build_rocket(pool: db::DbPool) -> rocket::Rocket<rocket::Build> {
    rocket::build()
        .manage(pool)
        .manage(RateLimiter::new())
        .mount("/api", routes::public::routes())
        .mount("/api/auth", routes::auth::routes())
        .mount("/api/admin", routes::admin::routes())
        .register(
            "/",
            catchers![bad_request, unauthorized, not_found, unprocessable, server_error],
        )
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    // Boot check — verify/create data directories before touching the DB
    boot::run();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed defaults");

    build_rocket(pool)
}
