//! cathsm — build 3D models for protein query sequences via the CATH-SM
//! template-selection and modelling services.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cathsm_client::{AlignmentClient, Credentials, PollPolicy, SelectTemplateClient};
use cathsm_config::{ApiConfig, Config};
use cathsm_pipeline::{Engine, SequenceFileTask, TaskOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "cathsm",
    version,
    about = "Model protein sequences against CATH structural templates"
)]
struct Cli {
    /// Query sequences (FASTA)
    infile: PathBuf,

    /// Directory for final PDB models
    #[arg(long)]
    outdir: Option<PathBuf>,

    /// Directory for cached intermediate results
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Config file (default: $CATHSM_CONFIG or ./cathsm.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of concurrently running tasks
    #[arg(long)]
    max_workers: Option<usize>,

    /// 1-based index of the first sequence to process
    #[arg(long, default_value_t = 1)]
    startseq: usize,

    /// Base URL of the template-selection service
    #[arg(long)]
    api1_base: Option<String>,

    /// Base URL of the alignment/modelling service
    #[arg(long)]
    api2_base: Option<String>,

    /// Username for the template-selection service
    #[arg(long)]
    api1_user: Option<String>,

    /// Username for the alignment/modelling service
    #[arg(long)]
    api2_user: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cathsm=debug,info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("fatal: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    if !cli.infile.is_file() {
        bail!("input file '{}' not found", cli.infile.display());
    }

    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_str().context("config path is not valid UTF-8")?;
            Config::load_from(path)?
        }
        None => Config::load()?,
    };
    if let Some(base) = &cli.api1_base {
        config.api1.base_url = base.clone();
    }
    if let Some(base) = &cli.api2_base {
        config.api2.base_url = base.clone();
    }

    let max_workers = cli.max_workers.unwrap_or(config.run.max_workers);
    let work_dir = cli
        .workdir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.run.work_dir));
    let out_dir = cli
        .outdir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.run.out_dir));
    let poll = PollPolicy {
        interval: Duration::from_secs(config.run.poll_interval_secs),
        max_retries: config.run.max_poll_retries,
        ..PollPolicy::default()
    };

    info!(
        api1 = %config.api1.base_url,
        api2 = %config.api2.base_url,
        max_workers,
        work_dir = %work_dir.display(),
        out_dir = %out_dir.display(),
        "starting CATH-SM pipeline"
    );

    let select = Arc::new(
        SelectTemplateClient::connect(
            config.api1.base_url.clone(),
            credentials(&config.api1, cli.api1_user.as_deref(), "api1")?,
            poll.clone(),
        )
        .await?,
    );
    let align = Arc::new(
        AlignmentClient::connect(
            config.api2.base_url.clone(),
            credentials(&config.api2, cli.api2_user.as_deref(), "api2")?,
            poll,
        )
        .await?,
    );

    let engine = Engine::new(max_workers);
    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, letting in-flight tasks finish");
            cancel.cancel();
        }
    });

    let root = Arc::new(SequenceFileTask::new(
        &cli.infile,
        cli.startseq,
        select,
        align,
        &work_dir,
        &out_dir,
    ));
    let report = engine.run(root).await;

    let mut succeeded = 0usize;
    let mut cached = 0usize;
    let mut skipped = 0usize;
    let mut cancelled = 0usize;
    for outcome in report.outcomes().values() {
        match outcome {
            TaskOutcome::Succeeded => succeeded += 1,
            TaskOutcome::Cached => cached += 1,
            TaskOutcome::SkippedNoCandidates => skipped += 1,
            TaskOutcome::Cancelled => cancelled += 1,
            TaskOutcome::Failed(_) => {}
        }
    }
    let failed = report.failed().count();
    info!(succeeded, cached, skipped, cancelled, failed, "pipeline finished");
    for (task, reason) in report.failed() {
        error!(%task, "task failed: {reason}");
    }

    Ok(report.is_success())
}

/// Pre-shared token wins; otherwise user (CLI flag over config) plus the
/// password from the environment.
fn credentials(api: &ApiConfig, cli_user: Option<&str>, label: &str) -> anyhow::Result<Credentials> {
    if let Some(token) = &api.token {
        return Ok(Credentials::Token(token.clone()));
    }
    let user = cli_user
        .map(str::to_string)
        .or_else(|| api.user.clone())
        .with_context(|| format!("no user configured for {label} (flag, config, or token env)"))?;
    let password = api
        .password
        .clone()
        .with_context(|| format!("no password in environment for {label}"))?;
    Ok(Credentials::UserPassword { user, password })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn api(user: Option<&str>, password: Option<&str>, token: Option<&str>) -> ApiConfig {
        ApiConfig {
            base_url: "https://example.org".into(),
            user: user.map(str::to_string),
            password: password.map(|p| SecretString::from(p.to_string())),
            token: token.map(|t| SecretString::from(t.to_string())),
        }
    }

    #[test]
    fn token_takes_precedence_over_user_password() {
        let creds = credentials(&api(Some("u"), Some("p"), Some("tok")), None, "api1").unwrap();
        assert!(matches!(creds, Credentials::Token(_)));
    }

    #[test]
    fn cli_user_overrides_config_user() {
        let creds = credentials(&api(Some("cfg"), Some("p"), None), Some("flag"), "api1").unwrap();
        match creds {
            Credentials::UserPassword { user, .. } => assert_eq!(user, "flag"),
            Credentials::Token(_) => panic!("expected user/password"),
        }
    }

    #[test]
    fn missing_password_is_an_error() {
        let err = credentials(&api(Some("u"), None, None), None, "api2").unwrap_err();
        assert!(err.to_string().contains("password"));
    }
}
