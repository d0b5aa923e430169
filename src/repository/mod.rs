use crate::models::{
    Contact, ContactFilter, CreateContactRequest, NewUser, Subscription, UpdateContactRequest, User,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

mod json_file;
mod postgres;

pub use json_file::JsonFileRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Failures of the Credential Store. `Conflict` is the store's own uniqueness
/// rejection (duplicate email) and is surfaced to clients as 409.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub(crate) const EMAIL_IN_USE: &str = "Email in use";

/// Repository Trait
///
/// The contract every Credential Store implementation fulfils. Each method is a
/// single atomic document operation.
///
/// Contact access is keyed by `(id, owner)` everywhere: a contact owned by
/// somebody else is indistinguishable from one that does not exist, and there is
/// deliberately no unscoped lookup.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Persists an unverified user. Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    /// Marks the holder of `verification_token` verified and clears the token.
    /// `None` when no user carries that token.
    async fn verify_email(&self, verification_token: &str) -> Result<Option<User>, RepositoryError>;
    /// Stores (or with `None`, clears) the active session token.
    async fn set_session_token(
        &self,
        id: Uuid,
        token: Option<String>,
    ) -> Result<Option<User>, RepositoryError>;
    async fn set_subscription(
        &self,
        id: Uuid,
        subscription: Subscription,
    ) -> Result<Option<User>, RepositoryError>;
    async fn set_avatar_url(&self, id: Uuid, avatar_url: &str) -> Result<Option<User>, RepositoryError>;

    // --- Contacts (owner-scoped) ---
    /// One page of the owner's contacts plus the total number matching the filter.
    async fn list_contacts(
        &self,
        owner: Uuid,
        filter: ContactFilter,
    ) -> Result<(Vec<Contact>, i64), RepositoryError>;
    async fn find_owned_contact(&self, id: Uuid, owner: Uuid) -> Result<Option<Contact>, RepositoryError>;
    async fn create_contact(
        &self,
        owner: Uuid,
        req: CreateContactRequest,
    ) -> Result<Contact, RepositoryError>;
    async fn update_owned_contact(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: UpdateContactRequest,
    ) -> Result<Option<Contact>, RepositoryError>;
    async fn set_owned_favorite(
        &self,
        id: Uuid,
        owner: Uuid,
        favorite: bool,
    ) -> Result<Option<Contact>, RepositoryError>;
    /// Removes the contact and returns its prior state.
    async fn delete_owned_contact(&self, id: Uuid, owner: Uuid) -> Result<Option<Contact>, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
