//! Controllers' business logic, one service per resource.
//!
//! Services receive already-validated input and the authenticated user, talk to
//! the repository and the external collaborators, and report failures as
//! [`AppError`](crate::error::AppError).

pub mod contacts;
pub mod users;

pub use contacts::ContactsService;
pub use users::UsersService;
