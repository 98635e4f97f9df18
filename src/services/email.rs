//! Outbound email
//!
//! Account emails are rendered from tera templates and delivered by a single
//! background worker fed through a bounded channel. Callers only enqueue;
//! delivery failures are logged and never retried.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::error::Error as _;
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{MailConfig, MailDriver};

pub const STUDENT_ACCOUNT_TEMPLATE: &str = "new_student_account_confirmation.html";
pub const LECTURER_ACCOUNT_TEMPLATE: &str = "new_lecturer_account_confirmation.html";

const STUDENT_ACCOUNT_BODY: &str = r#"<!DOCTYPE html>
<html>
<body>
  <p>Hello {{ full_name }},</p>
  <p>A student account has been created for you at {{ site_name }}.</p>
  <p>Your login credentials:</p>
  <ul>
    <li>Student ID: <strong>{{ username }}</strong></li>
    <li>Password: <strong>{{ password }}</strong></li>
  </ul>
  <p>Please confirm your email address before signing in:</p>
  <p><a href="{{ activation_link | safe }}">{{ activation_link | safe }}</a></p>
  <p>Change your password after your first login.</p>
</body>
</html>
"#;

const LECTURER_ACCOUNT_BODY: &str = r#"<!DOCTYPE html>
<html>
<body>
  <p>Hello {{ full_name }},</p>
  <p>A lecturer account has been created for you at {{ site_name }}.</p>
  <p>Your login credentials:</p>
  <ul>
    <li>Lecturer ID: <strong>{{ username }}</strong></li>
    <li>Password: <strong>{{ password }}</strong></li>
  </ul>
  <p>Please confirm your email address before signing in:</p>
  <p><a href="{{ activation_link | safe }}">{{ activation_link | safe }}</a></p>
</body>
</html>
"#;

/// Built-in email templates
pub struct EmailTemplates {
    tera: Tera,
}

impl EmailTemplates {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (STUDENT_ACCOUNT_TEMPLATE, STUDENT_ACCOUNT_BODY),
            (LECTURER_ACCOUNT_TEMPLATE, LECTURER_ACCOUNT_BODY),
        ])
        .context("Failed to load email templates")?;
        Ok(Self { tera })
    }

    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            let mut msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            anyhow!(msg)
        })
    }
}

/// An email waiting in the outbox
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub template: &'static str,
    pub context: TeraContext,
}

impl OutgoingEmail {
    pub fn new<C: Serialize>(
        to: impl Into<String>,
        subject: impl Into<String>,
        template: &'static str,
        context: &C,
    ) -> Result<Self> {
        let context =
            TeraContext::from_serialize(context).context("Failed to build email context")?;
        Ok(Self {
            to: to.into(),
            subject: subject.into(),
            template,
            context,
        })
    }
}

/// Delivery backend
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        if config.smtp_host.is_empty() {
            return Err(anyhow!("SMTP host not configured"));
        }
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from: format!("{} <{}>", config.from_name, config.from_address),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Writes emails to the log instead of sending them
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        tracing::info!(to, subject, bytes = html.len(), "Email (log driver)");
        tracing::debug!("{}", html);
        Ok(())
    }
}

pub fn create_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    match config.driver {
        MailDriver::Log => Ok(Arc::new(LogMailer)),
        MailDriver::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
    }
}

/// Handle for queueing emails to the background worker
#[derive(Clone)]
pub struct EmailOutbox {
    sender: mpsc::Sender<OutgoingEmail>,
}

impl EmailOutbox {
    /// Spawn the delivery worker. It stops once every outbox handle is dropped.
    pub fn start(
        mailer: Arc<dyn Mailer>,
        templates: EmailTemplates,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<OutgoingEmail>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(email) = receiver.recv().await {
                let html = match templates.render(email.template, &email.context) {
                    Ok(html) => html,
                    Err(e) => {
                        tracing::error!("Dropping email to {}: {}", email.to, e);
                        continue;
                    }
                };
                match mailer.send(&email.to, &email.subject, &html).await {
                    Ok(()) => tracing::info!("Email '{}' sent to {}", email.subject, email.to),
                    Err(e) => tracing::warn!("Failed to send email to {}: {}", email.to, e),
                }
            }
            tracing::debug!("Email worker stopped");
        });

        (Self { sender }, worker)
    }

    /// Queue an email, waiting for room when the queue is full
    pub async fn enqueue(&self, email: OutgoingEmail) {
        let to = email.to.clone();
        if self.sender.send(email).await.is_err() {
            tracing::warn!("Email worker is gone, email to {} not queued", to);
        }
    }
}
