/// Router Module Index
///
/// Organizes the routing into access-segregated modules. Access control is
/// applied once per module via an Axum layer, so a route cannot accidentally be
/// exposed without authentication by forgetting a check in its handler.

/// Routes reachable without a session: registration, verification and login.
pub mod public;

/// Routes behind the bearer-token authentication layer.
pub mod authenticated;
