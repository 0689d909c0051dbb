use crate::cli::{ConfigCommand, Toggle};
use crate::config::{Config, ProviderKind};
use crate::error::Result;
use crate::git;
use crate::prompt::Prompt;
use crate::provider::{self, ChatRequest, Provider};
use crate::render::{self, MarkupScheme, Renderer};
use anyhow::Context;
use std::io::{BufRead, Write};
use std::path::Path;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Copy)]
pub struct ExplainOptions {
    pub streaming: bool,
    pub scheme: MarkupScheme,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoDifferences,
    Explained,
}

pub type BoxProvider = Box<dyn Provider + Send + Sync>;

/// Reports an empty diff before `connect` is called, so a half-configured provider
/// never gets in the way of "No differences found.".
pub async fn run<W, F>(
    diff: &str,
    opts: &ExplainOptions,
    out: &mut W,
    connect: F,
) -> anyhow::Result<Outcome>
where
    W: Write,
    F: FnOnce() -> anyhow::Result<BoxProvider>,
{
    if report_empty(diff, out)? {
        return Ok(Outcome::NoDifferences);
    }

    let provider = connect()?;
    explain(provider.as_ref(), diff, opts, out)
        .await
        .with_context(|| format!("failed to explain diff with {}", provider.name()))
}

fn report_empty<W: Write>(diff: &str, out: &mut W) -> std::io::Result<bool> {
    if !diff.trim().is_empty() {
        return Ok(false);
    }
    writeln!(out, "No differences found.")?;
    Ok(true)
}

/// Diff text in, explanation out. An empty diff never reaches the provider.
pub async fn explain<W: Write>(
    provider: &(dyn Provider + Send + Sync),
    diff: &str,
    opts: &ExplainOptions,
    out: &mut W,
) -> Result<Outcome> {
    if report_empty(diff, out)? {
        return Ok(Outcome::NoDifferences);
    }

    if opts.verbose {
        let files = git::changed_files(diff);
        writeln!(out, "{diff}")?;
        writeln!(out, "Changed files ({}): {}\n", files.len(), files.join(", "))?;
    }

    let req = ChatRequest::new(Prompt::build(diff, opts.scheme));
    tracing::debug!(
        provider = provider.name(),
        streaming = opts.streaming,
        scheme = ?opts.scheme,
        prompt_len = req.prompt.as_str().len(),
        "requesting explanation"
    );

    if !opts.streaming {
        let text = provider.complete(req).await?;
        writeln!(out, "{}", render::render(opts.scheme, &text))?;
        return Ok(Outcome::Explained);
    }

    let mut stream = provider.stream_chat(req).await?;
    let mut renderer = Renderer::new(opts.scheme);

    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(flushed = renderer.flushed(), "stream aborted");
                if renderer.flushed() > 0 {
                    writeln!(out)?;
                }
                return Err(e);
            }
        };
        if let Some(fresh) = renderer.push(&chunk.text) {
            out.write_all(fresh.as_bytes())?;
            out.flush()?;
        }
    }

    if let Some(rest) = renderer.finish() {
        out.write_all(rest.as_bytes())?;
    }
    writeln!(out)?;
    out.flush()?;
    Ok(Outcome::Explained)
}

pub fn build_provider(
    http: &reqwest::Client,
    cfg: &Config,
    kind: ProviderKind,
) -> anyhow::Result<BoxProvider> {
    match kind {
        ProviderKind::Claude => {
            #[cfg(feature = "claude")]
            {
                let key = cfg
                    .api_key(kind)
                    .context("missing Claude API key (set ANTHROPIC_API_KEY or run `difx config set-key claude`)")?;
                let backend = provider::claude::ClaudeBackend::new(key, cfg.claude.model.clone());
                Ok(Box::new(provider::HttpProvider::new(http.clone(), backend)))
            }
            #[cfg(not(feature = "claude"))]
            {
                let _ = (http, cfg);
                anyhow::bail!("claude provider is not enabled in this build")
            }
        }
        ProviderKind::AzureOpenai => {
            #[cfg(feature = "azure")]
            {
                let key = cfg
                    .api_key(kind)
                    .context("missing Azure OpenAI API key (set AZURE_OPENAI_API_KEY or run `difx config set-key azure-openai`)")?;
                let endpoint = cfg
                    .azure_endpoint()
                    .context("missing Azure OpenAI endpoint (set AZURE_OPENAI_ENDPOINT or run `difx config set-endpoint <url>`)")?;
                let backend = provider::azure::AzureBackend::new(
                    key,
                    endpoint,
                    cfg.azure.deployment.clone(),
                    cfg.azure.api_version.clone(),
                );
                Ok(Box::new(provider::HttpProvider::new(http.clone(), backend)))
            }
            #[cfg(not(feature = "azure"))]
            {
                let _ = (http, cfg);
                anyhow::bail!("azure-openai provider is not enabled in this build")
            }
        }
        ProviderKind::Stub => Ok(Box::new(provider::stub::StubProvider::new())),
    }
}

/// Ask for a missing key on the terminal and persist it before continuing.
pub fn ensure_api_key(cfg: &mut Config, kind: ProviderKind, path: &Path) -> anyhow::Result<()> {
    if kind == ProviderKind::Stub || cfg.api_key(kind).is_some() {
        return Ok(());
    }

    let key = prompt_for_api_key(kind, &mut std::io::stdin().lock(), &mut std::io::stdout())?;
    cfg.set_api_key(kind, key);
    cfg.save(path)?;
    tracing::info!(path = %path.display(), "saved API key");
    Ok(())
}

pub fn prompt_for_api_key(
    kind: ProviderKind,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> anyhow::Result<String> {
    write!(out, "Please enter your {} API key: ", kind.label())?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line).context("failed to read API key")?;

    let key = line.trim();
    if key.is_empty() {
        anyhow::bail!("no API key entered for {}", kind.label());
    }
    Ok(key.to_string())
}

pub fn cmd_config(
    cmd: ConfigCommand,
    cfg: &mut Config,
    path: &Path,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let text = toml::to_string_pretty(&cfg.redacted()).context("failed to render config")?;
            writeln!(out, "# {}", path.display())?;
            write!(out, "{text}")?;
            return Ok(());
        }
        ConfigCommand::Use { provider } => cfg.active_model = provider,
        ConfigCommand::SetKey { provider, key } => {
            if provider == ProviderKind::Stub {
                anyhow::bail!("the stub provider does not use an API key");
            }
            let key = match key {
                Some(k) if !k.trim().is_empty() => k.trim().to_string(),
                _ => prompt_for_api_key(provider, &mut std::io::stdin().lock(), out)?,
            };
            cfg.set_api_key(provider, key);
        }
        ConfigCommand::SetEndpoint { url } => cfg.azure.endpoint = Some(url),
        ConfigCommand::Stream { state } => cfg.streaming = state == Toggle::On,
        ConfigCommand::Markup { scheme } => cfg.markup = scheme,
    }

    cfg.save(path)?;
    writeln!(out, "Saved config to: {}", path.display())?;
    Ok(())
}
