use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use uuid::Uuid;

use super::{EMAIL_IN_USE, Repository, RepositoryError};
use crate::models::{
    Contact, ContactFilter, CreateContactRequest, NewUser, Subscription, UpdateContactRequest, User,
};

const USER_COLUMNS: &str = "id, email, password, subscription, token, avatar_url, verify, \
                            verification_token, created_at";
const CONTACT_COLUMNS: &str = "id, name, email, phone, favorite, owner, created_at, updated_at";

/// Idempotent schema. The unique index on `email` is what settles concurrent
/// registrations with the same address.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        password TEXT NOT NULL,
        subscription TEXT NOT NULL DEFAULT 'starter'
            CHECK (subscription IN ('starter', 'pro', 'business')),
        token TEXT,
        avatar_url TEXT NOT NULL,
        verify BOOLEAN NOT NULL DEFAULT FALSE,
        verification_token TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (email)",
    "CREATE INDEX IF NOT EXISTS users_verification_token_idx ON users (verification_token)",
    r#"CREATE TABLE IF NOT EXISTS contacts (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        favorite BOOLEAN NOT NULL DEFAULT FALSE,
        owner UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS contacts_owner_idx ON contacts (owner, created_at)",
];

/// PostgresRepository
///
/// `Repository` backed by a Postgres pool. Ownership is part of every contact
/// query's `WHERE` clause, never checked after the fact.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates tables and indexes if they are missing. Safe to call on every start.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("database schema ready");
        Ok(())
    }

    async fn update_user(
        &self,
        assignment: &str,
        id: Uuid,
        value: Option<String>,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!("UPDATE users SET {assignment} = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// Appends the owner-scoped `WHERE` clause shared by the list and count queries.
fn push_contact_scope(builder: &mut QueryBuilder<'_, Postgres>, owner: Uuid, filter: &ContactFilter) {
    builder.push(" WHERE owner = ");
    builder.push_bind(owner);
    if let Some(favorite) = filter.favorite {
        builder.push(" AND favorite = ");
        builder.push_bind(favorite);
    }
}

fn map_unique_violation(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(EMAIL_IN_USE.to_string());
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (id, email, password, subscription, avatar_url, verify, verification_token, created_at) \
             VALUES ($1, $2, $3, $4, $5, false, $6, NOW()) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.subscription.as_str())
            .bind(&user.avatar_url)
            .bind(&user.verification_token)
            .fetch_one(&self.pool)
            .await
            .map_err(map_unique_violation)
    }

    async fn verify_email(&self, verification_token: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!(
            "UPDATE users SET verify = true, verification_token = NULL \
             WHERE verification_token = $1 RETURNING {USER_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(verification_token)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_session_token(
        &self,
        id: Uuid,
        token: Option<String>,
    ) -> Result<Option<User>, RepositoryError> {
        self.update_user("token", id, token).await
    }

    async fn set_subscription(
        &self,
        id: Uuid,
        subscription: Subscription,
    ) -> Result<Option<User>, RepositoryError> {
        self.update_user("subscription", id, Some(subscription.as_str().to_string()))
            .await
    }

    async fn set_avatar_url(&self, id: Uuid, avatar_url: &str) -> Result<Option<User>, RepositoryError> {
        self.update_user("avatar_url", id, Some(avatar_url.to_string()))
            .await
    }

    async fn list_contacts(
        &self,
        owner: Uuid,
        filter: ContactFilter,
    ) -> Result<(Vec<Contact>, i64), RepositoryError> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM contacts");
        push_contact_scope(&mut count, owner, &filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut page: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {CONTACT_COLUMNS} FROM contacts"));
        push_contact_scope(&mut page, owner, &filter);
        page.push(" ORDER BY created_at, id LIMIT ");
        page.push_bind(filter.limit);
        page.push(" OFFSET ");
        page.push_bind(filter.skip);

        let contacts = page
            .build_query_as::<Contact>()
            .fetch_all(&self.pool)
            .await?;
        Ok((contacts, total))
    }

    async fn find_owned_contact(&self, id: Uuid, owner: Uuid) -> Result<Option<Contact>, RepositoryError> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND owner = $2");
        Ok(sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_contact(
        &self,
        owner: Uuid,
        req: CreateContactRequest,
    ) -> Result<Contact, RepositoryError> {
        let sql = format!(
            "INSERT INTO contacts (id, name, email, phone, favorite, owner, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW()) RETURNING {CONTACT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Contact>(&sql)
            .bind(Uuid::new_v4())
            .bind(req.name)
            .bind(req.email)
            .bind(req.phone)
            .bind(req.favorite.unwrap_or(false))
            .bind(owner)
            .fetch_one(&self.pool)
            .await?)
    }

    /// Uses `COALESCE` so only the fields present in `changes` are written.
    async fn update_owned_contact(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: UpdateContactRequest,
    ) -> Result<Option<Contact>, RepositoryError> {
        let sql = format!(
            "UPDATE contacts \
             SET name = COALESCE($3, name), \
                 email = COALESCE($4, email), \
                 phone = COALESCE($5, phone), \
                 favorite = COALESCE($6, favorite), \
                 updated_at = NOW() \
             WHERE id = $1 AND owner = $2 \
             RETURNING {CONTACT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .bind(owner)
            .bind(changes.name)
            .bind(changes.email)
            .bind(changes.phone)
            .bind(changes.favorite)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn set_owned_favorite(
        &self,
        id: Uuid,
        owner: Uuid,
        favorite: bool,
    ) -> Result<Option<Contact>, RepositoryError> {
        let sql = format!(
            "UPDATE contacts SET favorite = $3, updated_at = NOW() \
             WHERE id = $1 AND owner = $2 RETURNING {CONTACT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .bind(owner)
            .bind(favorite)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_owned_contact(&self, id: Uuid, owner: Uuid) -> Result<Option<Contact>, RepositoryError> {
        let sql = format!("DELETE FROM contacts WHERE id = $1 AND owner = $2 RETURNING {CONTACT_COLUMNS}");
        Ok(sqlx::query_as::<_, Contact>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?)
    }
}
