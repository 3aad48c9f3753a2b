mod secret;
mod validator;

use std::collections::HashMap;

use anyhow::{anyhow, ensure};
pub use secret::*;
use serde::Deserialize;
pub use validator::*;

use crate::notify::{self, IntoNotifier, Notifier, Template};

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    #[serde(rename = "notify", default)]
    notify_map: Accessor<NotifyMap>,
    pipeline: Accessor<Pipeline>,
}

impl Config {
    pub fn init(input: impl AsRef<str>) -> anyhow::Result<Self> {
        let config = toml::from_str::<Self>(input.as_ref())
            .map_err(|err| anyhow!("failed to parse configuration: {err}"))?;
        config
            .validate()
            .map_err(|err| anyhow!("invalid configuration: {err}"))?;
        Ok(config)
    }

    pub fn notify_map(&self) -> &Accessor<NotifyMap> {
        &self.notify_map
    }

    pub fn pipeline(&self) -> &Accessor<Pipeline> {
        &self.pipeline
    }

    /// Wires the pipeline: duplicate filter on the raw payload, then the
    /// template, then every referenced backend.
    pub fn build_notifier(&self) -> anyhow::Result<Box<dyn Notifier>> {
        let backends = self
            .pipeline
            .notify_ref
            .iter()
            .map(|name| {
                let config = self.notify_map.get_by_ref(name)?;
                notify::platform::notifier(config)
                    .map(IntoNotifier::into_notifier)
                    .map_err(|err| anyhow!("failed to build notifier '{name}': {err}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let template = self.pipeline.template()?;
        let notifier = notify::with_template(template, backends);

        Ok(match self.pipeline.duplicate_filter {
            Some(params) => notify::with_duplicate_filter(params, vec![notifier]),
            None => notifier,
        })
    }
}

impl Validator for Config {
    fn validate(&self) -> anyhow::Result<()> {
        // Validate notify_map
        self.notify_map.validate()?;

        // Validate pipeline
        self.pipeline.validate()?;

        // Validate notify ref
        self.pipeline
            .notify_ref
            .iter()
            .try_for_each(|notify_ref| self.notify_map.get_by_ref(notify_ref).map(|_| ()))?;

        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Deserialize)]
pub struct NotifyMap(#[serde(default)] HashMap<String, Accessor<notify::platform::Config>>);

impl Validator for NotifyMap {
    fn validate(&self) -> anyhow::Result<()> {
        self.0.values().try_for_each(|notify| notify.validate())
    }
}

impl NotifyMap {
    pub fn get_by_ref(&self, notify_ref: &str) -> anyhow::Result<&notify::platform::Config> {
        self.0
            .get(notify_ref)
            .map(|config| &**config)
            .ok_or_else(|| anyhow!("reference of notify not found '{notify_ref}'"))
    }
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Pipeline {
    #[serde(rename = "notify")]
    notify_ref: Vec<String>,
    template: Option<String>,
    pub duplicate_filter: Option<notify::DuplicateFilterParams>,
}

impl Pipeline {
    pub fn notify_ref(&self) -> &[String] {
        &self.notify_ref
    }

    pub fn template(&self) -> anyhow::Result<Option<Template>> {
        self.template.as_deref().map(Template::new).transpose()
    }
}

impl Validator for Pipeline {
    fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.notify_ref.is_empty(),
            "pipeline references no notify"
        );
        self.template()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::notify::{
        platform::{self, dingtalk, mail},
        DuplicateFilterParams, Payload,
    };

    #[test]
    fn deser() {
        let config = Config::init(
            r#"
[notify.ops-robot]
platform = "DingTalk"
access_token = "t0k3n"
msg_type = "markdown"
title = "Alert"

[notify.ops-mail]
platform = "Mail"
smtp = { host = "smtp.example.com", user = "bot@example.com", password = "p4ss" }
to = ["oncall@example.com"]
subject = "Alert"

[pipeline]
notify = ["ops-robot", "ops-mail"]
template = "{{ level }}: {{ message }}"
duplicate_filter = { dup_interval = "10min", max_records = 200 }
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            Config {
                notify_map: Accessor::new(NotifyMap(HashMap::from_iter([
                    (
                        "ops-robot".into(),
                        Accessor::new(platform::Config::DingTalk(Accessor::new(
                            dingtalk::ConfigParams {
                                access_token: Secret::with_raw("t0k3n"),
                                msg_type: dingtalk::MsgType::Markdown,
                                title: "Alert".into(),
                                at_mobiles: vec![],
                                is_at_all: false,
                                api_server: None,
                            }
                        )))
                    ),
                    (
                        "ops-mail".into(),
                        Accessor::new(platform::Config::Mail(Accessor::new(
                            mail::ConfigParams {
                                smtp: crate::mail::ConfigSmtp {
                                    host: "smtp.example.com".into(),
                                    port: 465,
                                    user: "bot@example.com".into(),
                                    password: Secret::with_raw("p4ss"),
                                },
                                to: vec!["oncall@example.com".into()],
                                subject: "Alert".into(),
                                content_type: crate::mail::ContentType::Plain,
                            }
                        )))
                    ),
                ]))),
                pipeline: Accessor::new(Pipeline {
                    notify_ref: vec!["ops-robot".into(), "ops-mail".into()],
                    template: Some("{{ level }}: {{ message }}".into()),
                    duplicate_filter: Some(DuplicateFilterParams {
                        dup_interval: Duration::from_secs(600),
                        max_records: 200,
                    }),
                }),
            }
        );

        assert!(config.build_notifier().is_ok());
    }

    #[test]
    fn invalid() {
        let robot = r#"
[notify.robot]
platform = "DingTalk"
access_token = "t0k3n"
"#;

        let err = Config::init(format!("{robot}[pipeline]\nnotify = [\"nope\"]"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("reference of notify not found 'nope'"), "{err}");

        let err = Config::init(format!("{robot}[pipeline]\nnotify = []"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("pipeline references no notify"), "{err}");

        let err = Config::init(format!(
            "{robot}[pipeline]\nnotify = [\"robot\"]\ntemplate = \"{{{{ level \""
        ))
        .unwrap_err()
        .to_string();
        assert!(err.contains("failed to parse template"), "{err}");

        let err = Config::init(
            r#"
[notify.robot]
platform = "DingTalk"
access_token = { env = "HERALD_CONFIG_TEST_UNSET" }

[pipeline]
notify = ["robot"]
            "#,
        )
        .unwrap_err()
        .to_string();
        assert!(err.contains("HERALD_CONFIG_TEST_UNSET"), "{err}");

        assert!(Config::init("[notify]").is_err());
    }

    #[tokio::test]
    async fn pipeline_order() {
        use serde_json::json;

        use crate::httpclient::tests::fake_server;

        let server = fake_server(200, json!({ "errcode": 0, "errmsg": "ok" })).await;
        let config = Config::init(format!(
            r#"
[notify.robot]
platform = "DingTalk"
access_token = "t0k3n"
title = "Alert"
api_server = "{}"

[pipeline]
notify = ["robot"]
template = "{{{{ level }}}}: {{{{ message }}}}"
duplicate_filter = {{ dup_interval = "1h" }}
            "#,
            server.addr
        ))
        .unwrap();
        let notifier = config.build_notifier().unwrap();

        let payload = Payload::from(json!({ "level": "warn", "message": "disk full" }));
        notifier.notify(&payload).await.unwrap();
        notifier.notify(&payload).await.unwrap();
        notifier
            .notify(&Payload::from(json!({ "level": "error", "message": "disk full" })))
            .await
            .unwrap();

        let received = server.received.lock();
        let contents = received
            .iter()
            .map(|req| req.body["text"]["content"].as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(contents, ["Alert\nwarn: disk full", "Alert\nerror: disk full"]);
    }
}
