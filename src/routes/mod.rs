use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use serde_json::{json, Value};

pub mod admin;
pub mod auth;
pub mod public;

pub type ApiError = status::Custom<Json<Value>>;

/// Build a JSON error response with the given status code.
pub fn api_error(code: Status, message: &str) -> ApiError {
    status::Custom(code, Json(json!({"success": false, "error": message})))
}
