use async_trait::async_trait;

use alsat_shared::clients::email::{EmailClient, EmailError};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error(transparent)]
    Provider(#[from] EmailError),

    #[error("mail rejected: {0}")]
    Rejected(String),
}

/// Outbound mail capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// Writes the message to the log instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        tracing::info!(to = %to, subject = %subject, body_len = html.len(), "mail not sent (log mode)");
        tracing::debug!(to = %to, body = %html, "mail body");
        Ok(())
    }
}

/// Sends through the Resend API.
#[derive(Clone)]
pub struct ResendMailer {
    client: EmailClient,
}

impl ResendMailer {
    pub fn new(client: EmailClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        self.client.send_email(to, subject, html).await?;
        Ok(())
    }
}
