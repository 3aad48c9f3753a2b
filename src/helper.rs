use std::{convert::identity, time::Duration};

use anyhow::anyhow;
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::prop;

pub fn reqwest_client() -> anyhow::Result<reqwest::Client> {
    reqwest_client_with(identity)
}

pub fn reqwest_client_with(
    configure: impl FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
) -> anyhow::Result<reqwest::Client> {
    let user_agent = HeaderValue::from_str(&prop::user_agent())
        .map_err(|err| anyhow!("invalid user agent: {err}"))?;

    configure(
        reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .default_headers(HeaderMap::from_iter([(header::USER_AGENT, user_agent)])),
    )
    .build()
    .map_err(|err| anyhow!("failed to build reqwest client: {err}"))
}

/// Prepends `http://` to addresses given without a scheme.
pub fn normalize_addr(addr: &str) -> String {
    if addr.is_empty() || addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_owned()
    } else {
        format!("http://{addr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize() {
        assert_eq!(normalize_addr(""), "");
        assert_eq!(normalize_addr("127.0.0.1:8080"), "http://127.0.0.1:8080");
        assert_eq!(
            normalize_addr("https://oapi.dingtalk.com/robot/send"),
            "https://oapi.dingtalk.com/robot/send"
        );
        assert_eq!(normalize_addr("http://localhost"), "http://localhost");
    }

    #[test]
    fn build_client() {
        assert!(reqwest_client().is_ok());
        assert!(reqwest_client_with(|builder| builder.timeout(Duration::from_secs(1))).is_ok());
    }
}
