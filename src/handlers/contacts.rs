use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};

use crate::{
    auth::AuthUser,
    error::{AppError, ErrorBody},
    models::{
        Contact, ContactPage, ContactQuery, CreateContactRequest, FavoriteRequest,
        UpdateContactRequest,
    },
    services::ContactsService,
    validation::{ValidJson, parse_id},
};

/// get_all_contacts
///
/// [Authenticated Route] One page of the requester's contacts, optionally
/// restricted to favorites (or non-favorites).
#[utoipa::path(
    get,
    path = "/contacts",
    params(ContactQuery),
    responses(
        (status = 200, description = "Page of own contacts", body = ContactPage),
        (status = 400, description = "Invalid page or limit", body = ErrorBody),
        (status = 401, description = "Not authorized", body = ErrorBody)
    )
)]
pub async fn get_all_contacts(
    AuthUser(user): AuthUser,
    State(contacts): State<ContactsService>,
    query: Result<Query<ContactQuery>, QueryRejection>,
) -> Result<Json<ContactPage>, AppError> {
    let Query(query) = query?;
    let page = contacts.list(user.id, query).await?;
    Ok(Json(page))
}

/// get_one_contact
///
/// [Authenticated Route] A contact that belongs to somebody else is reported
/// exactly like one that does not exist.
#[utoipa::path(
    get,
    path = "/contacts/{id}",
    params(("id" = String, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Found", body = Contact),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_one_contact(
    AuthUser(user): AuthUser,
    State(contacts): State<ContactsService>,
    Path(id): Path<String>,
) -> Result<Json<Contact>, AppError> {
    let contact = contacts.get(user.id, parse_id(&id)?).await?;
    Ok(Json(contact))
}

/// create_contact
///
/// [Authenticated Route] The new contact is always owned by the requester.
#[utoipa::path(
    post,
    path = "/contacts",
    request_body = CreateContactRequest,
    responses(
        (status = 201, description = "Created", body = Contact),
        (status = 400, description = "Validation failed", body = ErrorBody)
    )
)]
pub async fn create_contact(
    AuthUser(user): AuthUser,
    State(contacts): State<ContactsService>,
    ValidJson(payload): ValidJson<CreateContactRequest>,
) -> Result<(StatusCode, Json<Contact>), AppError> {
    let contact = contacts.create(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

#[utoipa::path(
    put,
    path = "/contacts/{id}",
    params(("id" = String, Path, description = "Contact ID")),
    request_body = UpdateContactRequest,
    responses(
        (status = 200, description = "Updated", body = Contact),
        (status = 400, description = "Empty or invalid body", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_contact(
    AuthUser(user): AuthUser,
    State(contacts): State<ContactsService>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateContactRequest>,
) -> Result<Json<Contact>, AppError> {
    let contact = contacts.update(user.id, parse_id(&id)?, payload).await?;
    Ok(Json(contact))
}

#[utoipa::path(
    patch,
    path = "/contacts/{id}/favorite",
    params(("id" = String, Path, description = "Contact ID")),
    request_body = FavoriteRequest,
    responses(
        (status = 200, description = "Updated", body = Contact),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_status_contact(
    AuthUser(user): AuthUser,
    State(contacts): State<ContactsService>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<FavoriteRequest>,
) -> Result<Json<Contact>, AppError> {
    let contact = contacts
        .set_favorite(user.id, parse_id(&id)?, payload.favorite)
        .await?;
    Ok(Json(contact))
}

/// delete_contact
///
/// [Authenticated Route] Responds with the removed record.
#[utoipa::path(
    delete,
    path = "/contacts/{id}",
    params(("id" = String, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Deleted", body = Contact),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_contact(
    AuthUser(user): AuthUser,
    State(contacts): State<ContactsService>,
    Path(id): Path<String>,
) -> Result<Json<Contact>, AppError> {
    let contact = contacts.delete(user.id, parse_id(&id)?).await?;
    Ok(Json(contact))
}
