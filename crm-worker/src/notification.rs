/// Account notifications and their rendered email form.

use std::fmt;

/// An email queued for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Sent after registration; the link consumes the verification token.
    Verification { to: String, token: String },
    /// Sent on a forgotten-password request.
    PasswordReset { to: String, token: String },
}

impl Notification {
    pub fn recipient(&self) -> &str {
        match self {
            Notification::Verification { to, .. } | Notification::PasswordReset { to, .. } => to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Verification { .. } => "verification",
            Notification::PasswordReset { .. } => "password_reset",
        }
    }

    /// Renders the message, embedding the token in a callback link.
    pub fn render(&self, links: &LinkBuilder) -> OutgoingEmail {
        match self {
            Notification::Verification { to, token } => OutgoingEmail {
                to: to.clone(),
                subject: "Verify your email".to_string(),
                body: format!(
                    "Welcome!\n\nConfirm your email address by opening this link:\n{}\n\n\
                     If you did not create an account you can ignore this message.\n",
                    links.verification(token)
                ),
            },
            Notification::PasswordReset { to, token } => OutgoingEmail {
                to: to.clone(),
                subject: "Reset your password".to_string(),
                body: format!(
                    "A password reset was requested for your account.\n\n\
                     Choose a new password here:\n{}\n\n\
                     The link can be used once. If you did not ask for a reset, ignore this message.\n",
                    links.password_reset(token)
                ),
            },
        }
    }
}

/// Builds callback URLs under the public base URL.
///
/// Tokens are alphanumeric, so they are embedded without escaping.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn verification(&self, token: &str) -> String {
        format!("{}/auth/verify-email?token={}", self.base_url, token)
    }

    pub fn password_reset(&self, token: &str) -> String {
        format!("{}/auth/reset-password?token={}", self.base_url, token)
    }
}

/// A plain-text message ready for a [`crate::mailer::Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl fmt::Display for OutgoingEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "to={} subject={:?}", self.to, self.subject)
    }
}
