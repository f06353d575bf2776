//! Routers grouped by the authentication state their pages require. `create_router` puts the
//! matching session guard on each group.

/// Open to everyone; no guard runs.
pub mod public;

/// Login and sign-up. Callers who already have a session are redirected away.
pub mod anonymous;

/// Pages that need a signed-in caller.
pub mod authenticated;

/// Admin pages, nested under `/admin` inside the authenticated group. Handlers check the role.
pub mod admin;
