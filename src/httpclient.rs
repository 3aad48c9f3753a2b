use anyhow::anyhow;
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use spdlog::prelude::*;

use crate::helper;

/// A non-success status, or a successful response whose body could not be
/// decoded.
#[derive(Debug, thiserror::Error)]
#[error("{status}{}", .cause.as_ref().map(|cause| format!(": {cause}")).unwrap_or_default())]
pub struct ResponseError {
    pub status: StatusCode,
    pub body: String,
    #[source]
    cause: Option<serde_json::Error>,
}

impl ResponseError {
    pub fn is_status(&self, status: StatusCode) -> bool {
        self.status == status
    }
}

/// Whether any error in the chain is a [`ResponseError`], optionally with the
/// given status.
pub fn is_response_error(err: &anyhow::Error, status: Option<StatusCode>) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ResponseError>())
        .any(|resp_err| status.map_or(true, |status| resp_err.is_status(status)))
}

/// Sends JSON bodies to a base address and decodes JSON replies.
pub struct ObjectClient {
    client: reqwest::Client,
    addr: String,
    query: Vec<(String, String)>,
}

impl ObjectClient {
    pub fn new(addr: impl AsRef<str>) -> anyhow::Result<Self> {
        Ok(Self {
            client: helper::reqwest_client()?,
            addr: helper::normalize_addr(addr.as_ref()),
            query: vec![],
        })
    }

    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        self.execute(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body)).await
    }

    pub async fn execute<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> anyhow::Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.addr);
        trace!("sending {method} request to '{url}'");

        let mut req = self.client.request(method, &url).query(&self.query);
        if let Some(body) = body {
            req = req.json(body);
        }
        // The query may carry credentials, keep it out of the message
        let resp = req
            .send()
            .await
            .map_err(|err| anyhow!("failed to send request to '{url}': {}", err.without_url()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| anyhow!("failed to read response body: {}", err.without_url()))?;

        if !status.is_success() {
            return Err(ResponseError {
                status,
                body,
                cause: None,
            }
            .into());
        }

        serde_json::from_str(&body).map_err(|err| {
            ResponseError {
                status,
                body,
                cause: Some(err),
            }
            .into()
        })
    }
}
