use std::{borrow::Cow, env, fmt};

use anyhow::anyhow;
use serde::Deserialize;

use super::Validator;

/// A credential written inline or read from an environment variable when used.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    Lit(String),
    Env { env: String },
}

impl Secret {
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self::Lit(raw.into())
    }

    pub fn with_env(key: impl Into<String>) -> Self {
        Self::Env { env: key.into() }
    }

    pub fn get_str(&self) -> anyhow::Result<Cow<'_, str>> {
        match self {
            Self::Lit(lit) => Ok(Cow::Borrowed(lit)),
            Self::Env { env: key } => env::var(key)
                .map(Cow::Owned)
                .map_err(|err| anyhow!("{err} ({key})")),
        }
    }
}

impl Validator for Secret {
    fn validate(&self) -> anyhow::Result<()> {
        self.get_str().map(|_| ())
    }
}

// Literal values never reach logs
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lit(_) => f.write_str("Lit(***)"),
            Self::Env { env } => f.debug_struct("Env").field("env", env).finish(),
        }
    }
}
