use std::{fmt, future::Future, pin::Pin};

use anyhow::{anyhow, ensure};
use lettre::{
    message::{header, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Deserialize;
use spdlog::prelude::*;

use crate::config::{self, Secret};

const SMTPS_PORT: u16 = 465;

pub type SendFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

pub trait Client: Send + Sync {
    fn send<'a>(
        &'a self,
        to: &'a [String],
        subject: &'a str,
        content_type: ContentType,
        body: &'a str,
    ) -> SendFuture<'a>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum ContentType {
    #[default]
    #[serde(rename = "text/plain")]
    Plain,
    #[serde(rename = "text/html")]
    Html,
}

impl ContentType {
    fn header(self) -> header::ContentType {
        match self {
            Self::Plain => header::ContentType::TEXT_PLAIN,
            Self::Html => header::ContentType::TEXT_HTML,
        }
    }
}

fn default_port() -> u16 {
    SMTPS_PORT
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConfigSmtp {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: Secret,
}

impl config::Validator for ConfigSmtp {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.host.is_empty(), "smtp host is empty");
        ensure!(!self.user.is_empty(), "smtp user is empty");
        self.user
            .parse::<Mailbox>()
            .map_err(|err| anyhow!("smtp user '{}' is not a mailbox: {err}", self.user))?;
        self.password.validate()
    }
}

impl fmt::Display for ConfigSmtp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Sends every mail through one SMTP relay, authenticated as the sender.
pub struct SmtpClient {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpClient {
    pub fn new(config: &ConfigSmtp) -> anyhow::Result<Self> {
        let from = config
            .user
            .parse::<Mailbox>()
            .map_err(|err| anyhow!("invalid sender '{}': {err}", config.user))?;
        let credentials = Credentials::new(config.user.clone(), config.password.get_str()?.into());

        // Implicit TLS on the SMTPS port, STARTTLS elsewhere
        let builder = if config.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|err| anyhow!("failed to create smtp transport for '{config}': {err}"))?;

        Ok(Self {
            from,
            transport: builder.port(config.port).credentials(credentials).build(),
        })
    }

    fn message(
        &self,
        to: &[String],
        subject: &str,
        content_type: ContentType,
        body: &str,
    ) -> anyhow::Result<Message> {
        ensure!(!to.is_empty(), "no recipient specified");

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(subject)
            .header(content_type.header());
        for recipient in to {
            builder = builder.to(recipient
                .parse()
                .map_err(|err| anyhow!("invalid recipient '{recipient}': {err}"))?);
        }
        builder
            .body(body.to_owned())
            .map_err(|err| anyhow!("failed to build mail: {err}"))
    }

    async fn send_impl(
        &self,
        to: &[String],
        subject: &str,
        content_type: ContentType,
        body: &str,
    ) -> anyhow::Result<()> {
        let message = self.message(to, subject, content_type, body)?;
        let resp = self
            .transport
            .send(message)
            .await
            .map_err(|err| anyhow!("failed to send mail: {err}"))?;
        debug!("mail '{subject}' sent to {to:?}, smtp reply code {}", resp.code());
        Ok(())
    }
}

impl Client for SmtpClient {
    fn send<'a>(
        &'a self,
        to: &'a [String],
        subject: &'a str,
        content_type: ContentType,
        body: &'a str,
    ) -> SendFuture<'a> {
        Box::pin(self.send_impl(to, subject, content_type, body))
    }
}
