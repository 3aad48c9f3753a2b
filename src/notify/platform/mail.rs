use std::fmt;

use anyhow::{anyhow, ensure};
use serde::Deserialize;
use spdlog::prelude::*;

use crate::{
    config,
    mail::{self, ContentType, SmtpClient},
    notify::{with_string_notifiers, Notifier, NotifyFuture, StringNotifier},
};

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConfigParams {
    pub smtp: mail::ConfigSmtp,
    pub to: Vec<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content_type: ContentType,
}

impl config::Validator for ConfigParams {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.to.is_empty(), "no recipient specified");
        config::Validator::validate(&self.smtp)
    }
}

impl fmt::Display for ConfigParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mail:{}", self.to.join(","))
    }
}

/// Mails every message to a fixed list of recipients.
pub struct MailNotifier {
    params: ConfigParams,
    client: Box<dyn mail::Client>,
}

impl MailNotifier {
    pub fn new(params: ConfigParams) -> anyhow::Result<Self> {
        let client = SmtpClient::new(&params.smtp)?;
        Ok(Self::with_client(params, client))
    }

    pub fn with_client(params: ConfigParams, client: impl mail::Client + 'static) -> Self {
        Self {
            params,
            client: Box::new(client),
        }
    }

    async fn notify_impl(&self, message: &str) -> anyhow::Result<()> {
        info!("notifying to '{}'", self.params);

        self.client
            .send(
                &self.params.to,
                &self.params.subject,
                self.params.content_type,
                message,
            )
            .await
    }
}

impl StringNotifier for MailNotifier {
    fn notify<'a>(&'a self, message: &'a str) -> NotifyFuture<'a> {
        Box::pin(self.notify_impl(message))
    }
}

pub fn with_mails(params: Vec<ConfigParams>) -> anyhow::Result<Box<dyn Notifier>> {
    let notifiers = params
        .into_iter()
        .map(|params| {
            MailNotifier::new(params)
                .map(|notifier| Box::new(notifier) as Box<dyn StringNotifier>)
                .map_err(|err| anyhow!("failed to create mail notifier: {err}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(with_string_notifiers(notifiers))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::bail;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        config::{Secret, Validator},
        notify::{combine, is_notification_failure, IntoNotifier, Payload},
    };

    #[derive(Debug, PartialEq)]
    struct Sent {
        to: Vec<String>,
        subject: String,
        content_type: ContentType,
        body: String,
    }

    #[derive(Clone, Default)]
    struct MockClient {
        sent: Arc<Mutex<Vec<Sent>>>,
        fail_on: Option<usize>,
    }

    impl MockClient {
        async fn send_impl(
            &self,
            to: &[String],
            subject: &str,
            content_type: ContentType,
            body: &str,
        ) -> anyhow::Result<()> {
            let mut sent = self.sent.lock();
            sent.push(Sent {
                to: to.to_vec(),
                subject: subject.into(),
                content_type,
                body: body.into(),
            });
            if self.fail_on == Some(sent.len()) {
                bail!("sendError");
            }
            Ok(())
        }
    }

    impl mail::Client for MockClient {
        fn send<'a>(
            &'a self,
            to: &'a [String],
            subject: &'a str,
            content_type: ContentType,
            body: &'a str,
        ) -> mail::SendFuture<'a> {
            Box::pin(self.send_impl(to, subject, content_type, body))
        }
    }

    fn params(to: &[&str], subject: &str) -> ConfigParams {
        ConfigParams {
            smtp: mail::ConfigSmtp {
                host: "smtp.example.com".into(),
                port: 465,
                user: "bot@example.com".into(),
                password: Secret::with_raw("p4ss"),
            },
            to: to.iter().map(|to| to.to_string()).collect(),
            subject: subject.into(),
            content_type: ContentType::Plain,
        }
    }

    #[test]
    fn deser() {
        let params: ConfigParams = toml::from_str(
            r#"
smtp = { host = "smtp.example.com", port = 587, user = "bot@example.com", password = { env = "SMTP_PASSWORD" } }
to = ["oncall@example.com"]
subject = "Alert"
content_type = "text/html"
            "#,
        )
        .unwrap();

        assert_eq!(params.smtp.port, 587);
        assert_eq!(params.smtp.password, Secret::with_env("SMTP_PASSWORD"));
        assert_eq!(params.content_type, ContentType::Html);
        assert_eq!(params.to_string(), "mail:oncall@example.com");
    }

    #[test]
    fn no_recipient_is_invalid() {
        assert!(params(&["a@example.com"], "s").validate().is_ok());
        assert_eq!(
            params(&[], "s").validate().unwrap_err().to_string(),
            "no recipient specified"
        );
    }

    #[tokio::test]
    async fn sends_through_client() {
        let client = MockClient::default();
        let notifier = combine(vec![
            MailNotifier::with_client(params(&["a@example.com"], "s1"), client.clone())
                .into_notifier(),
            MailNotifier::with_client(
                params(&["b@example.com", "c@example.com"], "s2"),
                client.clone(),
            )
            .into_notifier(),
        ]);

        notifier.notify(&Payload::from("disk full")).await.unwrap();

        assert_eq!(
            *client.sent.lock(),
            vec![
                Sent {
                    to: vec!["a@example.com".into()],
                    subject: "s1".into(),
                    content_type: ContentType::Plain,
                    body: "disk full".into(),
                },
                Sent {
                    to: vec!["b@example.com".into(), "c@example.com".into()],
                    subject: "s2".into(),
                    content_type: ContentType::Plain,
                    body: "disk full".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn send_failure_is_aggregated() {
        let client = MockClient {
            fail_on: Some(2),
            ..Default::default()
        };
        let notifier = combine(
            ["s1", "s2", "s3"]
                .into_iter()
                .map(|subject| {
                    MailNotifier::with_client(params(&["a@example.com"], subject), client.clone())
                        .into_notifier()
                })
                .collect(),
        );

        let err = notifier.notify(&Payload::from(1)).await.unwrap_err();
        assert!(is_notification_failure(&err));
        assert!(err.to_string().contains("sendError"));
        // Later mails are still sent
        assert_eq!(client.sent.lock().len(), 3);
    }

    #[test]
    fn build_from_config() {
        assert!(with_mails(vec![params(&["a@example.com"], "s")]).is_ok());
        assert!(with_mails(vec![]).is_ok());
    }
}
