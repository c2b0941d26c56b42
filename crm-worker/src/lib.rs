//! # CRM Worker Library
//!
//! Work that runs off the request path. Today that is outbound email: account
//! verification and password reset messages, delivered best-effort in the
//! background with timeouts and retries.
//!
//! ## Modules
//!
//! - `notification`: what to send and how it renders
//! - `mailer`: SMTP and logging transports behind the `Mailer` trait
//! - `dispatcher`: bounded queue, delivery worker, retry policy

pub mod dispatcher;
pub mod mailer;
pub mod notification;

pub use dispatcher::{DispatcherConfig, NotificationDispatcher};
pub use mailer::{LogMailer, Mailer, SmtpMailer, SmtpSettings};
pub use notification::{LinkBuilder, Notification, OutgoingEmail};
