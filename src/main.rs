mod cli;

use std::{fs, path::Path, process::exit, sync::Arc};

use anyhow::anyhow;
use clap::Parser;
use herald::{dotenv, prop};
use spdlog::{
    prelude::*,
    sink::{RotatingFileSink, RotationPolicy},
};

#[tokio::main]
async fn main() {
    if let Err(err) = dotenv::load() {
        error!("{err}");
        exit(1);
    }

    let args = cli::Args::parse();
    let setup_logger_result = setup_logger(args.verbose, args.log_dir.as_deref());

    debug!("{} {} startup", prop::PACKAGE.name, prop::PACKAGE.version);

    match (setup_logger_result, &args.log_dir) {
        (Ok(_), Some(log_dir)) => debug!("logs will be written to '{}'", log_dir.display()),
        (Ok(_), None) => {}
        (Err(err), _) => {
            error!("logs will not be written to files, failed to setup logger: {err}")
        }
    }

    if let Err(err) = run(args).await {
        error!("exit with error: {err:#}");
        exit(1);
    }
}

fn setup_logger(verbose: bool, log_dir: Option<&Path>) -> anyhow::Result<()> {
    if verbose {
        spdlog::default_logger().set_level_filter(LevelFilter::All)
    }

    if let Some(log_dir) = log_dir {
        fs::create_dir_all(log_dir)
            .map_err(|err| anyhow!("failed to create log directory: {err}"))?;

        let file_sink = Arc::new(
            RotatingFileSink::builder()
                .base_path(log_dir.join(format!("{}.log", prop::PACKAGE.name)))
                .rotation_policy(RotationPolicy::Daily { hour: 0, minute: 0 })
                .build()
                .map_err(|err| anyhow!("failed to build log file sink: {err}"))?,
        );

        let logger = spdlog::default_logger()
            .fork_with(|logger| {
                logger.sinks_mut().push(file_sink);
                Ok(())
            })
            .map_err(|err| anyhow!("failed to build logger: {err}"))?;

        spdlog::set_default_logger(logger);
    }

    spdlog::default_logger().set_flush_level_filter(LevelFilter::All);

    Ok(())
}

async fn run(args: cli::Args) -> anyhow::Result<()> {
    herald::run(&args.config, args.message, args.json).await
}
