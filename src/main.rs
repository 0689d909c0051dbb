mod app;
mod cli;
mod config;
mod error;
mod git;
mod paths;
mod prompt;
mod provider;
mod render;

use anyhow::Context;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = cli::Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config_path = paths::config_path()?;
    let mut cfg = config::Config::load_optional(&config_path)?.unwrap_or_default();
    tracing::debug!(?config_path, active_model = ?cfg.active_model, "resolved config");

    if let Some(cli::Command::Config { cmd }) = args.cmd.take() {
        return app::cmd_config(cmd, &mut cfg, &config_path, &mut std::io::stdout());
    }

    let kind = args.provider.unwrap_or(cfg.active_model);
    app::ensure_api_key(&mut cfg, kind, &config_path)?;

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let diff = git::GitDiff::new().run(&args.git_args()).await?;

    let opts = app::ExplainOptions {
        streaming: args.streaming(cfg.streaming),
        scheme: cfg.markup,
        verbose: args.verbose,
    };

    let outcome = app::run(&diff, &opts, &mut std::io::stdout(), || {
        app::build_provider(&http, &cfg, kind)
    })
    .await?;
    tracing::debug!(?outcome, "done");

    Ok(())
}
