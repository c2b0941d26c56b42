/// Request middleware
///
/// - `auth`: bearer token authentication and the admin role gate

pub mod auth;
