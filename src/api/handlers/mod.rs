pub mod behavioral;
pub mod security;

use actix_web::HttpRequest;

/// Demo identity: the monitored user comes from the X-User-Id header,
/// falling back to the seeded demo account
pub fn user_id(req: &HttpRequest) -> String {
    req.headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("demo-user")
        .to_string()
}
