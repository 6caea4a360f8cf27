use std::sync::Mutex;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {0:?}")]
    Address(String),
    #[error("build message: {0}")]
    Build(String),
    #[error("smtp: {0}")]
    Transport(String),
}

/// Outbound mail. Implementations do not retry.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

pub fn confirmation_email(link: &str) -> (&'static str, String) {
    (
        "Email Confirmation",
        format!("Please confirm your email: {}", link),
    )
}

pub fn reset_email(link: &str) -> (&'static str, String) {
    (
        "Password Reset Request",
        format!("Reset your password here: {}", link),
    )
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let from = cfg
            .sender
            .as_deref()
            .or(cfg.username.as_deref())
            .unwrap_or("no-reply@localhost");
        let sender: Mailbox = from
            .parse()
            .map_err(|_| MailError::Address(from.to_string()))?;

        let mut builder = if cfg.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&cfg.server)
        };
        builder = builder
            .port(cfg.port)
            .timeout(Some(std::time::Duration::from_secs(10)));
        if let (Some(user), Some(pass)) = (&cfg.username, &cfg.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(server = %cfg.server, port = cfg.port, tls = cfg.use_tls, "smtp mailer configured");
        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let recipient: Mailbox = to.parse().map_err(|_| MailError::Address(to.to_string()))?;
        let message = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        debug!(to, subject, "mail sent");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every message in memory instead of delivering it.
#[derive(Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<SentMail>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every send fails; nothing is recorded.
    pub fn failing() -> Self {
        Self {
            outbox: Mutex::default(),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn last_to(&self, to: &str) -> Option<SentMail> {
        self.sent().into_iter().rev().find(|m| m.to == to)
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError::Transport("connection refused".into()));
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| MailError::Transport("outbox poisoned".into()))?;
        outbox.push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
