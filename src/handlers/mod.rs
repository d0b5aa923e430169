//! HTTP handlers.
//!
//! Thin adapters: extract and validate the request, call the matching service,
//! shape the response. Authorization is never decided here, it comes in through
//! the [`AuthUser`](crate::auth::AuthUser) extractor.

pub mod contacts;
pub mod users;
