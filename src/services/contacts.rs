use axum::extract::FromRef;
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    models::{Contact, ContactPage, ContactQuery, CreateContactRequest, UpdateContactRequest},
    repository::RepositoryState,
};

/// ContactsService
///
/// Owner-scoped CRUD over the contact collection. Every call takes the
/// requester's id; a contact owned by anyone else answers exactly like a
/// missing one.
#[derive(Clone)]
pub struct ContactsService {
    repo: RepositoryState,
}

impl FromRef<AppState> for ContactsService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.repo.clone())
    }
}

impl ContactsService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn list(&self, owner: Uuid, query: ContactQuery) -> Result<ContactPage, AppError> {
        let (filter, page, limit) = query.into_filter()?;
        let (contacts, total) = self.repo.list_contacts(owner, filter).await?;

        Ok(ContactPage {
            total,
            per_page: limit,
            current_page: page,
            contacts,
        })
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<Contact, AppError> {
        self.repo
            .find_owned_contact(id, owner)
            .await?
            .ok_or_else(AppError::not_found)
    }

    /// The owner always comes from the requester, never from the body.
    pub async fn create(&self, owner: Uuid, req: CreateContactRequest) -> Result<Contact, AppError> {
        let contact = self.repo.create_contact(owner, req).await?;
        tracing::debug!(contact_id = %contact.id, owner = %owner, "contact created");
        Ok(contact)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: UpdateContactRequest,
    ) -> Result<Contact, AppError> {
        if changes.is_empty() {
            return Err(AppError::BadRequest(
                "Body must have at least one field".to_string(),
            ));
        }

        self.repo
            .update_owned_contact(id, owner, changes)
            .await?
            .ok_or_else(AppError::not_found)
    }

    pub async fn set_favorite(&self, owner: Uuid, id: Uuid, favorite: bool) -> Result<Contact, AppError> {
        self.repo
            .set_owned_favorite(id, owner, favorite)
            .await?
            .ok_or_else(AppError::not_found)
    }

    /// Returns the record as it was before removal.
    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Contact, AppError> {
        let removed = self
            .repo
            .delete_owned_contact(id, owner)
            .await?
            .ok_or_else(AppError::not_found)?;
        tracing::debug!(contact_id = %removed.id, owner = %owner, "contact deleted");
        Ok(removed)
    }
}
