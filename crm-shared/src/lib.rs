//! # CRM Shared Library
//!
//! Domain layer of the CRM backend, shared by the HTTP server and its tests.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, session tokens, authentication and authorization
//! - `db`: connection pool and embedded migrations
//! - `models`: users, contacts, leads and tasks
//! - `query`: filtered, sorted, paginated and fuzzy-searched listings

pub mod auth;
pub mod db;
pub mod models;
pub mod query;

/// Current version of the CRM shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
