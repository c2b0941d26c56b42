/// Outbound mail transports.
///
/// [`SmtpMailer`] relays through an SMTP server with STARTTLS. [`LogMailer`]
/// only logs and records what it would have sent; the server falls back to it
/// when no SMTP host is configured, and tests use it to read delivered links.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::notification::OutgoingEmail;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Transport error: {message}")]
    Transport { message: String, permanent: bool },

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}

impl MailError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MailError::InvalidAddress { .. } | MailError::Build(_) => false,
            MailError::Transport { permanent, .. } => !permanent,
            MailError::Timeout(_) => true,
        }
    }
}

/// Delivers one message.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// SMTP relay settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

/// STARTTLS SMTP relay. The connection pool inside the transport is reused
/// across messages.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from: Mailbox = settings.from.parse().map_err(|e| MailError::InvalidAddress {
            address: settings.from.clone(),
            reason: format!("{e}"),
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| MailError::Transport {
                message: e.to_string(),
                permanent: true,
            })?
            .port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let to: Mailbox = email.to.parse().map_err(|e| MailError::InvalidAddress {
            address: email.to.clone(),
            reason: format!("{e}"),
        })?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Transport {
                permanent: e.is_permanent(),
                message: e.to_string(),
            })
    }
}

/// Logs messages instead of sending them and keeps a copy.
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    sent: Arc<RwLock<Vec<OutgoingEmail>>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything "sent" so far, oldest first.
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email not sent (no SMTP configured)");
        tracing::debug!(body = %email.body, "Email body");
        self.sent.write().await.push(email.clone());
        Ok(())
    }
}
