/// Middleware for the API server
///
/// - `guard`: adapters running [`AuthGuard`](stockroom_shared::auth::guard::AuthGuard)
///   checks in front of route groups
/// - `security`: security response headers

pub mod guard;
pub mod security;
