pub mod dingtalk;
pub mod mail;

use std::fmt;

use anyhow::anyhow;
use serde::Deserialize;

use super::StringNotifier;
use crate::config;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "platform")]
pub enum Config {
    Mail(config::Accessor<mail::ConfigParams>),
    DingTalk(config::Accessor<dingtalk::ConfigParams>),
}

impl config::Validator for Config {
    fn validate(&self) -> anyhow::Result<()> {
        match self {
            Self::Mail(p) => p.validate(),
            Self::DingTalk(p) => p.validate(),
        }
        .map_err(|err| anyhow!("[{self}] {err}"))
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mail(p) => write!(f, "{p}"),
            Self::DingTalk(p) => write!(f, "{p}"),
        }
    }
}

pub fn notifier(config: &Config) -> anyhow::Result<Box<dyn StringNotifier>> {
    Ok(match config {
        Config::Mail(p) => Box::new(mail::MailNotifier::new((**p).clone())?),
        Config::DingTalk(p) => Box::new(dingtalk::DingTalkNotifier::new((**p).clone())?),
    })
}
