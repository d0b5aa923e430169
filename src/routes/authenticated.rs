use crate::{
    AppState,
    handlers::{contacts, users},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

/// Largest accepted avatar upload.
const AVATAR_UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

/// Authenticated Router Module
///
/// Every route here sits behind the `require_auth` layer added in
/// `create_router`, so handlers always receive a loaded `AuthUser` and scope
/// their work to that user's id.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Session & Profile ---
        // POST /users/logout
        // Clears the stored session token; the presented token stops working.
        .route("/users/logout", post(users::logout_user))
        // POST /users/current
        // Returns the requester's email and subscription.
        .route("/users/current", post(users::current_user))
        // PATCH /users
        // Changes the subscription tier.
        .route("/users", patch(users::change_subscription))
        // PATCH /users/avatars
        // Multipart upload, resized to 250x250 and published under /avatars.
        .route(
            "/users/avatars",
            patch(users::change_avatar).layer(DefaultBodyLimit::max(AVATAR_UPLOAD_LIMIT)),
        )
        // --- Contacts (owner-scoped) ---
        // GET/POST /contacts
        .route(
            "/contacts",
            get(contacts::get_all_contacts).post(contacts::create_contact),
        )
        // GET/PUT/DELETE /contacts/{id}
        // A contact owned by someone else answers 404, same as a missing one.
        .route(
            "/contacts/{id}",
            get(contacts::get_one_contact)
                .put(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        // PATCH /contacts/{id}/favorite
        .route(
            "/contacts/{id}/favorite",
            patch(contacts::update_status_contact),
        )
}
