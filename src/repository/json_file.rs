use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{EMAIL_IN_USE, Repository, RepositoryError};
use crate::models::{
    Contact, ContactFilter, CreateContactRequest, NewUser, Subscription, UpdateContactRequest, User,
};

/// The whole store as it sits on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Documents {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    contacts: Vec<Contact>,
}

impl Documents {
    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn owned_contact_mut(&mut self, id: Uuid, owner: Uuid) -> Option<&mut Contact> {
        self.contacts
            .iter_mut()
            .find(|c| c.id == id && c.owner == owner)
    }
}

/// JsonFileRepository
///
/// File-backed `Repository`. The document set lives in memory behind a single
/// async mutex, which makes each operation atomic, and is rewritten to disk
/// (temp file + rename) after every mutation. A mutation is applied to a
/// staged copy and only replaces the in-memory set once the write succeeded.
/// Vector order is insertion order.
///
/// [`JsonFileRepository::in_memory`] skips the file entirely.
pub struct JsonFileRepository {
    path: Option<PathBuf>,
    docs: Mutex<Documents>,
}

impl JsonFileRepository {
    /// A store with no backing file. Everything is lost when it is dropped.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            docs: Mutex::new(Documents::default()),
        }
    }

    /// Opens (or starts) the store at `path`, loading existing documents.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref().to_path_buf();

        let docs = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            path = %path.display(),
            users = docs.users.len(),
            contacts = docs.contacts.len(),
            "json store opened"
        );

        Ok(Self {
            path: Some(path),
            docs: Mutex::new(docs),
        })
    }

    async fn persist(&self, docs: &Documents) -> Result<(), RepositoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(docs)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }

    /// Runs `change` against a copy of the documents. `Ok(None)` means nothing
    /// changed and skips the write; `Ok(Some(_))` persists the copy and commits it.
    async fn mutate<R, F>(&self, change: F) -> Result<Option<R>, RepositoryError>
    where
        F: FnOnce(&mut Documents) -> Result<Option<R>, RepositoryError> + Send,
        R: Send,
    {
        let mut docs = self.docs.lock().await;
        let mut staged = docs.clone();
        let Some(result) = change(&mut staged)? else {
            return Ok(None);
        };
        self.persist(&staged).await?;
        *docs = staged;
        Ok(Some(result))
    }

    async fn update_user<F>(&self, id: Uuid, apply: F) -> Result<Option<User>, RepositoryError>
    where
        F: FnOnce(&mut User) + Send,
    {
        self.mutate(|docs| {
            Ok(docs.user_mut(id).map(|user| {
                apply(user);
                user.clone()
            }))
        })
        .await
    }

    async fn update_contact<F>(
        &self,
        id: Uuid,
        owner: Uuid,
        apply: F,
    ) -> Result<Option<Contact>, RepositoryError>
    where
        F: FnOnce(&mut Contact) + Send,
    {
        self.mutate(|docs| {
            Ok(docs.owned_contact_mut(id, owner).map(|contact| {
                apply(contact);
                contact.updated_at = Utc::now();
                contact.clone()
            }))
        })
        .await
    }
}

#[async_trait]
impl Repository for JsonFileRepository {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let docs = self.docs.lock().await;
        Ok(docs.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let docs = self.docs.lock().await;
        Ok(docs.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            password: user.password_hash,
            subscription: user.subscription,
            token: None,
            avatar_url: user.avatar_url,
            verify: false,
            verification_token: Some(user.verification_token),
            created_at: Utc::now(),
        };

        self.mutate(|docs| {
            if docs.users.iter().any(|u| u.email == created.email) {
                return Err(RepositoryError::Conflict(EMAIL_IN_USE.to_string()));
            }
            docs.users.push(created.clone());
            Ok(Some(()))
        })
        .await?;
        Ok(created)
    }

    async fn verify_email(&self, verification_token: &str) -> Result<Option<User>, RepositoryError> {
        self.mutate(|docs| {
            Ok(docs
                .users
                .iter_mut()
                .find(|u| u.verification_token.as_deref() == Some(verification_token))
                .map(|user| {
                    user.verify = true;
                    user.verification_token = None;
                    user.clone()
                }))
        })
        .await
    }

    async fn set_session_token(
        &self,
        id: Uuid,
        token: Option<String>,
    ) -> Result<Option<User>, RepositoryError> {
        self.update_user(id, |user| user.token = token).await
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        subscription: Subscription,
    ) -> Result<Option<User>, RepositoryError> {
        self.update_user(id, |user| user.subscription = subscription)
            .await
    }

    async fn set_avatar_url(&self, id: Uuid, avatar_url: &str) -> Result<Option<User>, RepositoryError> {
        let avatar_url = avatar_url.to_string();
        self.update_user(id, |user| user.avatar_url = avatar_url)
            .await
    }

    async fn list_contacts(
        &self,
        owner: Uuid,
        filter: ContactFilter,
    ) -> Result<(Vec<Contact>, i64), RepositoryError> {
        let docs = self.docs.lock().await;
        let matching: Vec<&Contact> = docs
            .contacts
            .iter()
            .filter(|c| c.owner == owner)
            .filter(|c| filter.favorite.is_none_or(|favorite| c.favorite == favorite))
            .collect();

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let skip = usize::try_from(filter.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);

        let page = matching
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn find_owned_contact(&self, id: Uuid, owner: Uuid) -> Result<Option<Contact>, RepositoryError> {
        let docs = self.docs.lock().await;
        Ok(docs
            .contacts
            .iter()
            .find(|c| c.id == id && c.owner == owner)
            .cloned())
    }

    async fn create_contact(
        &self,
        owner: Uuid,
        req: CreateContactRequest,
    ) -> Result<Contact, RepositoryError> {
        let now = Utc::now();
        let contact = Contact {
            id: Uuid::new_v4(),
            name: req.name,
            email: req.email,
            phone: req.phone,
            favorite: req.favorite.unwrap_or(false),
            owner,
            created_at: now,
            updated_at: now,
        };

        self.mutate(|docs| {
            docs.contacts.push(contact.clone());
            Ok(Some(()))
        })
        .await?;
        Ok(contact)
    }

    async fn update_owned_contact(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: UpdateContactRequest,
    ) -> Result<Option<Contact>, RepositoryError> {
        self.update_contact(id, owner, |contact| {
            if let Some(name) = changes.name {
                contact.name = name;
            }
            if let Some(email) = changes.email {
                contact.email = email;
            }
            if let Some(phone) = changes.phone {
                contact.phone = phone;
            }
            if let Some(favorite) = changes.favorite {
                contact.favorite = favorite;
            }
        })
        .await
    }

    async fn set_owned_favorite(
        &self,
        id: Uuid,
        owner: Uuid,
        favorite: bool,
    ) -> Result<Option<Contact>, RepositoryError> {
        self.update_contact(id, owner, |contact| contact.favorite = favorite)
            .await
    }

    async fn delete_owned_contact(&self, id: Uuid, owner: Uuid) -> Result<Option<Contact>, RepositoryError> {
        self.mutate(|docs| {
            Ok(docs
                .contacts
                .iter()
                .position(|c| c.id == id && c.owner == owner)
                .map(|index| docs.contacts.remove(index)))
        })
        .await
    }
}
