use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod avatar;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod repository;
pub mod services;
pub mod storage;
pub mod validation;

// Module for routing segregation (Public, Authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::TokenIssuer;
pub use config::AppConfig;
pub use mailer::{LogMailer, MailerState, MailgunMailer, MockMailer};
pub use repository::{JsonFileRepository, PostgresRepository, RepositoryState};
pub use storage::{LocalStorage, MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Auto-generated OpenAPI document for every route, served at
/// `/api-docs/openapi.json` and browsable through the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::users::register_user, handlers::users::verify_email,
        handlers::users::resend_verification, handlers::users::login_user,
        handlers::users::logout_user, handlers::users::current_user,
        handlers::users::change_subscription, handlers::users::change_avatar,
        handlers::contacts::get_all_contacts, handlers::contacts::get_one_contact,
        handlers::contacts::create_contact, handlers::contacts::update_contact,
        handlers::contacts::update_status_contact, handlers::contacts::delete_contact,
    ),
    components(
        schemas(
            models::Contact, models::ContactPage, models::CreateContactRequest,
            models::UpdateContactRequest, models::FavoriteRequest, models::RegisterRequest,
            models::LoginRequest, models::EmailRequest, models::SubscriptionRequest,
            models::Subscription, models::UserSummary, models::RegisterResponse,
            models::LoginResponse, models::MessageResponse, models::SubscriptionResponse,
            models::AvatarResponse, error::ErrorBody,
        )
    ),
    tags(
        (name = "contacts-api", description = "Personal contacts API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe container holding every service and the
/// configuration, shared across all incoming requests.
#[derive(Clone)]
pub struct AppState {
    /// Credential Store: users and contacts.
    pub repo: RepositoryState,
    /// Public file area for processed avatars.
    pub storage: StorageState,
    /// Outbound transactional email.
    pub mailer: MailerState,
    /// Bearer token signing and verification.
    pub tokens: TokenIssuer,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state, deriving the token issuer from the configured secret.
    pub fn new(
        repo: RepositoryState,
        storage: StorageState,
        mailer: MailerState,
        config: AppConfig,
    ) -> Self {
        Self {
            repo,
            storage,
            mailer,
            tokens: TokenIssuer::new(&config.jwt_secret),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let handlers and extractors pull only the component they need from AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenIssuer {
    fn from_ref(app_state: &AppState) -> TokenIssuer {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the application's entire routing structure, applies global and scoped middleware,
/// and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let avatars = ServeDir::new(state.config.avatars_dir());

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: validation only.
        .merge(public::public_routes())
        // Authenticated Routes: the token is checked before any body is read.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_auth,
            )),
        )
        // Processed avatars written by the local file store.
        .nest_service("/avatars", avatars)
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `http_request` span for `TraceLayer`, carrying method, URI and
/// the `x-request-id` so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
