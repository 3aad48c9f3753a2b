use std::{env, path::Path};

use anyhow::anyhow;

pub const DOT_ENV_FILES: &str = "DOT_ENV_FILES";

/// Loads environment files into the process environment. Variables that are
/// already set are kept.
///
/// `DOT_ENV_FILES` lists the files separated by `;`, each of which must exist.
/// Without it, `.env` in the working directory is loaded if present.
pub fn load() -> anyhow::Result<()> {
    load_from(env::var(DOT_ENV_FILES).ok().as_deref())
}

fn load_from(files: Option<&str>) -> anyhow::Result<()> {
    match files.filter(|files| !files.is_empty()) {
        Some(files) => files.split(';').try_for_each(|file| {
            dotenvy::from_path(Path::new(file))
                .map_err(|err| anyhow!("failed to load env file '{file}': {err}"))
        }),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(err) if err.not_found() => Ok(()),
            Err(err) => Err(anyhow!("failed to load '.env': {err}")),
        },
    }
}
