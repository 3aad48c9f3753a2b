// https://open.dingtalk.com/document/group/custom-robot-access

use std::fmt;

use anyhow::{anyhow, ensure};
use serde::{Deserialize, Serialize};
use spdlog::prelude::*;

use crate::{
    config::{self, Secret},
    httpclient::ObjectClient,
    notify::{with_string_notifiers, Notifier, NotifyFuture, StringNotifier},
};

const ROBOT_SEND_ADDR: &str = "https://oapi.dingtalk.com/robot/send";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
    #[default]
    Text,
    Markdown,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ConfigParams {
    pub access_token: Secret,
    #[serde(default)]
    pub msg_type: MsgType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub at_mobiles: Vec<String>,
    #[serde(default)]
    pub is_at_all: bool,
    /// Overrides the robot endpoint, e.g. for a self-hosted gateway.
    pub api_server: Option<String>,
}

impl config::Validator for ConfigParams {
    fn validate(&self) -> anyhow::Result<()> {
        let token = self.access_token.get_str()?;
        ensure!(!token.is_empty(), "access token is empty");
        Ok(())
    }
}

impl fmt::Display for ConfigParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dingtalk:{:?}", self.msg_type)?;
        if !self.title.is_empty() {
            write!(f, ":{}", self.title)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Message<'a> {
    msgtype: MsgType,
    at: At<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<Text>,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown: Option<Markdown<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct At<'a> {
    at_mobiles: &'a [String],
    is_at_all: bool,
}

#[derive(Serialize)]
struct Text {
    content: String,
}

#[derive(Serialize)]
struct Markdown<'a> {
    title: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Posts every message to one DingTalk group robot.
pub struct DingTalkNotifier {
    params: ConfigParams,
    client: ObjectClient,
}

impl DingTalkNotifier {
    pub fn new(params: ConfigParams) -> anyhow::Result<Self> {
        let client = ObjectClient::new(params.api_server.as_deref().unwrap_or(ROBOT_SEND_ADDR))?
            .with_query_param("access_token", params.access_token.get_str()?);
        Ok(Self { params, client })
    }

    fn message<'a>(&'a self, message: &'a str) -> Message<'a> {
        let params = &self.params;
        let (text, markdown) = match params.msg_type {
            MsgType::Text => (
                Some(Text {
                    content: format!("{}\n{message}", params.title),
                }),
                None,
            ),
            MsgType::Markdown => (
                None,
                Some(Markdown {
                    title: &params.title,
                    text: message,
                }),
            ),
        };
        Message {
            msgtype: params.msg_type,
            at: At {
                at_mobiles: &params.at_mobiles,
                is_at_all: params.is_at_all,
            },
            text,
            markdown,
        }
    }

    async fn notify_impl(&self, message: &str) -> anyhow::Result<()> {
        info!("notifying to '{}'", self.params);

        let resp: Response = self.client.post("", &self.message(message)).await?;
        ensure!(resp.errcode == 0, "{}:{}", resp.errcode, resp.errmsg);
        Ok(())
    }
}

impl StringNotifier for DingTalkNotifier {
    fn notify<'a>(&'a self, message: &'a str) -> NotifyFuture<'a> {
        Box::pin(self.notify_impl(message))
    }
}

pub fn with_dingtalks(params: Vec<ConfigParams>) -> anyhow::Result<Box<dyn Notifier>> {
    let notifiers = params
        .into_iter()
        .map(|params| {
            DingTalkNotifier::new(params)
                .map(|notifier| Box::new(notifier) as Box<dyn StringNotifier>)
                .map_err(|err| anyhow!("failed to create dingtalk notifier: {err}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(with_string_notifiers(notifiers))
}
