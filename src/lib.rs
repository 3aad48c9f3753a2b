pub mod config;
pub mod dotenv;
mod helper;
pub mod httpclient;
pub mod mail;
pub mod notify;
pub mod prop;

use std::path::Path;

use anyhow::{anyhow, bail, Context};
use spdlog::prelude::*;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use crate::{
    config::Config,
    notify::{Notifier, Payload},
};

/// Sends `message` through the configured pipeline, or every line of stdin
/// when no message is given.
pub async fn run(
    config: impl AsRef<Path>,
    message: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::init(
        tokio::fs::read_to_string(config)
            .await
            .map_err(|err| anyhow!("failed to read config file: {err}"))?,
    )?;
    let notifier = config.build_notifier()?;
    info!(
        "notifying through [{}]",
        config.pipeline().notify_ref().join(", ")
    );

    if let Some(message) = message {
        return notify(&*notifier, message, json).await;
    }

    let mut lines = BufReader::new(io::stdin()).lines();
    let (mut total, mut failed) = (0, 0);
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| anyhow!("failed to read stdin: {err}"))?
    {
        if line.trim().is_empty() {
            continue;
        }
        total += 1;
        if let Err(err) = notify(&*notifier, line, json).await {
            error!("{err:#}");
            failed += 1;
        }
    }

    if failed != 0 {
        bail!("{failed} of {total} notifications failed");
    }
    Ok(())
}

async fn notify(notifier: &dyn Notifier, message: String, json: bool) -> anyhow::Result<()> {
    let payload = parse_payload(message, json)?;
    notifier
        .notify(&payload)
        .await
        .with_context(|| format!("failed to notify '{payload}'"))
}

fn parse_payload(message: String, json: bool) -> anyhow::Result<Payload> {
    if !json {
        return Ok(Payload::Str(message));
    }
    serde_json::from_str::<serde_json::Value>(&message)
        .map(Payload::from)
        .map_err(|err| anyhow!("message is not valid json: {err}"))
}
