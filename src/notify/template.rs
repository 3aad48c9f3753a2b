use anyhow::anyhow;
use minijinja::{Environment, UndefinedBehavior};
use spdlog::prelude::*;

use super::{combine, Notifier, NotifyFuture, Payload};

const TEMPLATE_NAME: &str = "notification";

/// A compiled message template. The payload is the template context, so map
/// payloads expose their keys as variables.
pub struct Template {
    env: Environment<'static>,
}

impl Template {
    pub fn new(source: impl Into<String>) -> anyhow::Result<Self> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_template_owned(TEMPLATE_NAME, source.into())
            .map_err(|err| anyhow!("failed to parse template: {err}"))?;
        Ok(Self { env })
    }

    pub fn render(&self, payload: &Payload) -> anyhow::Result<String> {
        self.env
            .get_template(TEMPLATE_NAME)?
            .render(payload)
            .map_err(|err| anyhow::Error::from(err).context("failed to render template"))
    }
}

/// Renders the payload through a template before delegating, or forwards it
/// untouched if there is no template.
pub struct TemplateNotifier {
    notifier: Box<dyn Notifier>,
    template: Option<Template>,
}

impl TemplateNotifier {
    pub fn new(template: Option<Template>, notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            notifier: combine(notifiers),
            template,
        }
    }

    async fn notify_impl(&self, payload: &Payload) -> anyhow::Result<()> {
        match &self.template {
            Some(template) => {
                let message = Payload::Str(template.render(payload)?);
                trace!("rendered notification: '{message}'");
                self.notifier.notify(&message).await
            }
            None => self.notifier.notify(payload).await,
        }
    }
}

impl Notifier for TemplateNotifier {
    fn notify<'a>(&'a self, payload: &'a Payload) -> NotifyFuture<'a> {
        Box::pin(self.notify_impl(payload))
    }
}

pub fn with_template(
    template: Option<Template>,
    notifiers: Vec<Box<dyn Notifier>>,
) -> Box<dyn Notifier> {
    Box::new(TemplateNotifier::new(template, notifiers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{
        is_notification_failure,
        tests::{boxed, payloads, Recorder},
    };

    #[test]
    fn parse_error() {
        let err = Template::new("t1 {{ Data ").err().unwrap();
        assert!(err.to_string().starts_with("failed to parse template"));
    }

    #[tokio::test]
    async fn renders_before_delegating() {
        let (n11, n12, n13) = (Recorder::new(), Recorder::new(), Recorder::new());
        let (n21, n22, n23) = (Recorder::new(), Recorder::new(), Recorder::new());

        let t1 = Template::new("t1 {{ Data }}").unwrap();
        let t2 = Template::new("t2 {{ Data }}").unwrap();

        let notifier = combine(vec![
            combine(vec![
                with_template(
                    Some(Template::new("t1 {{ Data }}").unwrap()),
                    vec![boxed(&n11), boxed(&n12)],
                ),
                boxed(&n13),
            ]),
            combine(vec![
                with_template(
                    Some(Template::new("t2 {{ Data }}").unwrap()),
                    vec![boxed(&n21)],
                ),
                boxed(&n22),
                boxed(&n23),
            ]),
        ]);

        for data in payloads() {
            let data = Payload::map([("Data", data)]);
            let m1 = Payload::Str(t1.render(&data).unwrap());
            let m2 = Payload::Str(t2.render(&data).unwrap());

            notifier.notify(&data).await.unwrap();

            assert_eq!(n11.take(), vec![m1.clone()]);
            assert_eq!(n12.take(), vec![m1]);
            assert_eq!(n21.take(), vec![m2]);
            for untouched in [&n13, &n22, &n23] {
                assert_eq!(untouched.take(), vec![data.clone()]);
            }
        }
    }

    #[tokio::test]
    async fn string_data() {
        let inner = Recorder::new();
        let notifier = with_template(
            Some(Template::new("t1 {{ Data }}").unwrap()),
            vec![boxed(&inner)],
        );

        notifier
            .notify(&Payload::map([("Data", "str")]))
            .await
            .unwrap();
        assert_eq!(inner.take(), vec![Payload::from("t1 str")]);
    }

    #[tokio::test]
    async fn without_template() {
        let inner = Recorder::new();
        let notifier = with_template(None, vec![boxed(&inner)]);

        let data = Payload::map([("Data", "str")]);
        notifier.notify(&data).await.unwrap();
        assert_eq!(inner.take(), vec![data]);
    }

    #[tokio::test]
    async fn render_failure_skips_children() {
        let inner = Recorder::new();
        let notifier = with_template(
            Some(Template::new("t1 {{ Data }}").unwrap()),
            vec![boxed(&inner)],
        );

        let err = notifier.notify(&"".into()).await.unwrap_err();
        assert!(!is_notification_failure(&err));
        assert_eq!(err.to_string(), "failed to render template");
        assert!(err.chain().any(|cause| cause.is::<minijinja::Error>()));
        let render_err = err.downcast_ref::<minijinja::Error>().unwrap();
        assert_eq!(render_err.kind(), minijinja::ErrorKind::UndefinedError);
        assert_eq!(inner.count(), 0);

        // Inside a fanout the render failure is reported like any other
        let err = combine(vec![notifier, boxed(&Recorder::new())])
            .notify(&"".into())
            .await
            .unwrap_err();
        assert!(is_notification_failure(&err));
    }
}
