/// Credentials, session tokens and access control.
///
/// - [`password`]: Argon2id hashing with tunable cost
/// - [`jwt`]: HS256 session tokens with a single generic failure
/// - [`tokens`]: single-use verification / reset tokens, stored as digests
/// - [`authentication`]: bearer token to [`authentication::AuthContext`]
/// - [`authorization`]: role allow-lists and ownership scoping

pub mod authentication;
pub mod authorization;
pub mod jwt;
pub mod password;
pub mod tokens;
