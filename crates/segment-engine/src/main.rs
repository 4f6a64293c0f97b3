//! 客群规则引擎 CLI
//!
//! 配置加载顺序见 `crm_shared::config::AppConfig::load`。

use anyhow::Context;
use clap::Parser;
use crm_shared::config::AppConfig;
use crm_shared::observability;
use segment_engine::cli::{Cli, CommandRunner, Commands};

const SERVICE_NAME: &str = "segment-engine";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(SERVICE_NAME).context("加载配置失败")?;
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }
    let _guard = observability::init(SERVICE_NAME, &config.observability)?;

    let runner = CommandRunner::new(config);

    match cli.command {
        Commands::Fields => runner.run_fields()?,
        Commands::Count {
            customers,
            segment,
            explain,
        } => runner.run_count(customers.as_deref(), &segment, explain.as_deref())?,
        Commands::Suggest { customers, prompt } => {
            runner.run_suggest(customers.as_deref(), &prompt).await?
        }
    }

    Ok(())
}
