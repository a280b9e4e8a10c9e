//! Failure alert delivery via SMTP.
//!
//! [`EmailDelivery`] wraps the `lettre` async SMTP transport to send
//! plain-text failure alerts. Configuration is loaded from environment
//! variables; if `SMTP_HOST` or `EMAIL_TO` is not set,
//! [`EmailConfig::from_env`] returns `None` and alerts should go to the
//! log instead.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::alert::{AlertError, AlertSink, FailureAlert};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (implicit TLS).
const DEFAULT_SMTP_PORT: u16 = 465;

/// Port on which the server expects TLS from the first byte.
const IMPLICIT_TLS_PORT: u16 = 465;

/// Default sender address when `EMAIL_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@robodispatch.local";

/// Configuration for the SMTP alert channel.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 465).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Operator mailbox receiving alerts.
    pub to_address: String,
    /// SMTP login; defaults to the sender address.
    pub smtp_user: Option<String>,
    /// SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable         | Required | Default                       |
    /// |------------------|----------|-------------------------------|
    /// | `SMTP_HOST`      | yes      | --                            |
    /// | `EMAIL_TO`       | yes      | --                            |
    /// | `SMTP_PORT`      | no       | `465`                         |
    /// | `EMAIL_FROM`     | no       | `noreply@robodispatch.local`  |
    /// | `SMTP_USER`      | no       | value of `EMAIL_FROM`         |
    /// | `EMAIL_PASSWORD` | no       | --                            |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        let to_address = std::env::var("EMAIL_TO").ok()?;
        let from_address =
            std::env::var("EMAIL_FROM").unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string());
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            smtp_user: std::env::var("SMTP_USER")
                .ok()
                .or_else(|| Some(from_address.clone())),
            smtp_password: std::env::var("EMAIL_PASSWORD").ok(),
            from_address,
            to_address,
        })
    }
}

// ---------------------------------------------------------------------------
// EmailDelivery
// ---------------------------------------------------------------------------

/// Sends failure alerts by email.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Assemble the alert email without sending it.
    pub fn build_message(&self, alert: &FailureAlert) -> Result<Message, EmailError> {
        let body = format!(
            "Hello,\n\n\
             The robot dispatcher on worker '{}' reported a failure:\n\n\
             {}\n\n\
             Time: {}\n\n\
             Please check the dispatcher log on that machine for details.\n",
            alert.worker,
            alert.message,
            chrono::Local::now().format("%d/%m/%Y %H:%M:%S"),
        );

        Message::builder()
            .from(self.config.from_address.parse()?)
            .to(self.config.to_address.parse()?)
            .subject(alert.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| EmailError::Build(e.to_string()))
    }

    /// Build and send one alert email.
    pub async fn deliver(&self, alert: &FailureAlert) -> Result<(), EmailError> {
        let email = self.build_message(alert)?;

        let mut transport_builder = if self.config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
        }
        .port(self.config.smtp_port);

        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let mailer = transport_builder.build();
        mailer.send(email).await?;

        tracing::info!(to = %self.config.to_address, subject = %alert.subject(), "Alert email sent");
        Ok(())
    }
}

#[async_trait]
impl AlertSink for EmailDelivery {
    async fn send(&self, alert: &FailureAlert) -> Result<(), AlertError> {
        tracing::info!(worker = %alert.worker, "Sending failure alert email");
        self.deliver(alert).await.map_err(AlertError::from)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
