use crate::{AppState, handlers::users};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token. Each one validates its body
/// through `ValidJson` before the handler runs.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and container orchestration.
        .route("/health", get(|| async { "ok" }))
        // POST /users/register
        // Creates an unverified account and sends the verification email.
        .route("/users/register", post(users::register_user))
        // GET /users/verify/{verification_token}
        // One-time confirmation link from the verification email.
        .route(
            "/users/verify/{verification_token}",
            get(users::verify_email),
        )
        // POST /users/verify
        // Resends the verification email for a still-unverified account.
        .route("/users/verify", post(users::resend_verification))
        // POST /users/login
        // Issues an 8-hour bearer token and stores it as the single active session.
        .route("/users/login", post(users::login_user))
}
