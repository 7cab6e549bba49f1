use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;

/// MailerError
///
/// Error type for transactional email failures. Failures are logged by the
/// caller and never retried.
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// Simulated failure from the mock implementation.
    #[error("Mock mailer error: {0}")]
    Mock(String),
}

/// EmailMeta
///
/// The templated payload of a transactional email: a short description and
/// the call-to-action link rendered as a button.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMeta {
    pub description: String,
    pub link: String,
}

/// Mailer
///
/// Abstract contract for outbound transactional email, so handlers can be
/// tested against the in-memory mock instead of a live SMTP relay.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends a templated HTML email. The subject is prefixed with the
    /// application name.
    async fn send(&self, to: &str, subject: &str, meta: EmailMeta) -> Result<(), MailerError>;
}

/// MailerState
///
/// The concrete type used to share the mailer across the application state.
pub type MailerState = Arc<dyn Mailer>;

/// Renders the small inline-styled HTML body used by all transactional
/// emails.
fn render_html(subject: &str, meta: &EmailMeta) -> String {
    format!(
        r#"<!DOCTYPE html>
<html dir="ltr" lang="en">
  <body style="background-color:#f3f4f6;font-family:ui-sans-serif,system-ui,sans-serif;padding:40px 0">
    <div style="max-width:500px;margin:20px auto;padding:20px;border:1px solid #ddd;border-radius:6px;background:#fff">
      <h1 style="font-size:20px;color:#333">{subject}</h1>
      <p style="font-size:16px">{description}</p>
      <a href="{link}" style="display:inline-block;margin-top:15px;padding:10px 15px;background:#007bff;color:#fff;text-decoration:none;border-radius:4px">Click here</a>
      <p style="color:#6b7280;font-size:13px;margin-top:24px">This link expires in 24 hours for security</p>
    </div>
  </body>
</html>"#,
        subject = subject,
        description = meta.description,
        link = meta.link,
    )
}

/// SmtpMailer
///
/// The real implementation backed by lettre's async SMTP transport
/// (STARTTLS on the submission port, optional credentials).
pub struct SmtpMailer {
    host: String,
    port: u16,
    from: String,
    credentials: Option<Credentials>,
}

impl SmtpMailer {
    /// Constructs the mailer from the loaded configuration.
    ///
    /// # Panics
    /// Panics if `smtp_host` is not set; the caller decides between this
    /// and [`LogMailer`] based on configuration.
    pub fn new(config: &AppConfig) -> Self {
        let host = config
            .smtp_host
            .clone()
            .expect("SmtpMailer requires SMTP_HOST");
        let credentials = match (&config.smtp_user, &config.smtp_password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.clone(), pass.clone())),
            _ => None,
        };
        Self {
            host,
            port: config.smtp_port,
            from: config.smtp_from.clone(),
            credentials,
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, meta: EmailMeta) -> Result<(), MailerError> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(format!("Linkboard - {}", subject))
            .header(ContentType::TEXT_HTML)
            .body(render_html(subject, &meta))
            .map_err(|e| MailerError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?.port(self.port);
        if let Some(creds) = &self.credentials {
            transport_builder = transport_builder.credentials(creds.clone());
        }

        transport_builder.build().send(email).await?;
        tracing::info!(to = to, subject = subject, "Transactional email sent");
        Ok(())
    }
}

/// LogMailer
///
/// Used when SMTP is not configured: records the would-be email in the log
/// stream so local development still shows verification links.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, meta: EmailMeta) -> Result<(), MailerError> {
        tracing::info!(
            to = to,
            subject = subject,
            link = %meta.link,
            "SMTP not configured; email logged instead of sent"
        );
        Ok(())
    }
}

/// SentEmail
///
/// A captured email from the mock, asserted on by tests.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub meta: EmailMeta,
}

/// MockMailer
///
/// In-memory implementation for tests: captures every send, or simulates a
/// transport failure when constructed with `new_failing`.
#[derive(Default)]
pub struct MockMailer {
    pub should_fail: bool,
    sent: Mutex<Vec<SentEmail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, to: &str, subject: &str, meta: EmailMeta) -> Result<(), MailerError> {
        if self.should_fail {
            return Err(MailerError::Mock("Simulation requested".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            meta,
        });
        Ok(())
    }
}
