use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::sandbox::{Sandbox, Value};
use crate::scheduler::{MemoryScheduleStore, Scheduler, expression};
use crate::scripts::{ScriptLoader, ScriptRunner};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Wire loader, sandbox, and approval gate from config.
pub fn build_runner(config: &Config) -> Result<ScriptRunner> {
    let secrets = Arc::new(config.secret_provider());
    let sandbox = Arc::new(Sandbox::new(config.sandbox_config(), secrets)?);
    let loader = Arc::new(ScriptLoader::new(config.scripts_path()));
    Ok(ScriptRunner::new(loader, sandbox, config.approval_gate()))
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let runner = build_runner(&config)?;
    match cli.command {
        Commands::Run {
            name,
            function,
            args,
        } => run_script(&runner, &name, function.as_deref(), &args).await,
        Commands::List => list_scripts(&runner).await,
        Commands::Secrets => {
            for name in runner.sandbox().secrets().names() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Daemon => run_daemon(runner, &config).await,
    }
}

async fn run_script(runner: &ScriptRunner, name: &str, function: Option<&str>, args: &[String]) -> Result<()> {
    let args = args
        .iter()
        .map(|raw| serde_json::from_str::<Value>(raw).with_context(|| format!("--arg is not valid JSON: {raw}")))
        .collect::<Result<Vec<_>>>()?;

    let ctx = CancellationToken::new();
    let result = runner.run(&ctx, name, function, args).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if let Some(error) = &result.error {
        anyhow::bail!("{name} failed: {error}");
    }
    Ok(())
}

async fn list_scripts(runner: &ScriptRunner) -> Result<()> {
    let scripts = runner.loader().list().await?;
    if scripts.is_empty() {
        println!("No scripts in {}", runner.loader().base_dir().display());
        return Ok(());
    }
    for script in scripts {
        let description = if script.description.is_empty() {
            "-"
        } else {
            script.description.as_str()
        };
        println!("{:<24} {description}", script.name);
        let secrets = script.required_secrets();
        if !secrets.is_empty() {
            println!("{:<24} secrets: {}", "", secrets.join(", "));
        }
    }
    Ok(())
}

async fn run_daemon(runner: ScriptRunner, config: &Config) -> Result<()> {
    let store = Arc::new(MemoryScheduleStore::seeded(config.schedules.iter().cloned()).await?);
    let scheduler = Scheduler::new(store, runner, config.scheduler_config());
    let registered = scheduler.start().await?;

    let now = Utc::now();
    for schedule in config.schedules.iter().filter(|s| s.enabled) {
        if let Ok(next) = expression::next_run_for(&schedule.cron_expr, now) {
            info!(name = %schedule.name, next_run = %next, "scheduled");
        }
    }
    println!("scriptcron daemon running with {registered} schedule(s). Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    scheduler.stop();
    Ok(())
}
