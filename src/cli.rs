use crate::config::ProviderKind;
use crate::render::MarkupScheme;
use clap::{Parser, Subcommand, ValueEnum};

/// Explain git diffs with an LLM
#[derive(Debug, Parser)]
#[command(name = "difx")]
#[command(version)]
#[command(about = "Explain git diffs with an LLM", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Args {
    /// Generate patch
    #[arg(short = 'p', long = "patch")]
    pub patch: bool,

    /// Generate diffstat
    #[arg(long = "stat")]
    pub stat: bool,

    /// Show only names of changed files
    #[arg(long = "name-only")]
    pub name_only: bool,

    /// Show only names and status of changed files
    #[arg(long = "name-status")]
    pub name_status: bool,

    /// Filter by added/modified/deleted
    #[arg(long = "diff-filter", value_name = "FILTER")]
    pub diff_filter: Option<String>,

    /// Show n lines of context
    #[arg(short = 'U', long = "unified", value_name = "N")]
    pub unified: Option<u32>,

    /// Show detailed output including the diff
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Provider (default: config active_model)
    #[arg(long = "provider", value_enum)]
    pub provider: Option<ProviderKind>,

    /// Stream the explanation (default: config streaming)
    #[arg(long = "stream", overrides_with = "no_stream")]
    pub stream: bool,

    /// Wait for the whole explanation before printing
    #[arg(long = "no-stream", overrides_with = "stream")]
    pub no_stream: bool,

    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Commits or ranges passed to git diff
    #[arg(value_name = "COMMIT")]
    pub commits: Vec<String>,

    /// Paths passed to git diff after `--`
    #[arg(last = true, value_name = "PATH")]
    pub paths: Vec<String>,
}

impl Args {
    /// Arguments forwarded to `git diff`, in git's own syntax.
    pub fn git_args(&self) -> Vec<String> {
        let mut out = Vec::new();
        let flags = [
            (self.patch, "--patch"),
            (self.stat, "--stat"),
            (self.name_only, "--name-only"),
            (self.name_status, "--name-status"),
        ];
        out.extend(flags.iter().filter(|(on, _)| *on).map(|(_, f)| f.to_string()));

        if let Some(filter) = &self.diff_filter {
            out.push(format!("--diff-filter={filter}"));
        }
        if let Some(n) = self.unified {
            out.push(format!("--unified={n}"));
        }

        out.extend(self.commits.iter().cloned());
        if !self.paths.is_empty() {
            out.push("--".to_string());
            out.extend(self.paths.iter().cloned());
        }
        out
    }

    pub fn streaming(&self, configured: bool) -> bool {
        match (self.stream, self.no_stream) {
            (true, _) => true,
            (_, true) => false,
            _ => configured,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show or edit the configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the current configuration (keys redacted)
    Show,
    /// Select the provider used by default
    Use { provider: ProviderKind },
    /// Store an API key; prompts when KEY is omitted
    SetKey {
        provider: ProviderKind,
        key: Option<String>,
    },
    /// Set the Azure OpenAI resource endpoint
    SetEndpoint { url: String },
    /// Turn streaming on or off
    Stream { state: Toggle },
    /// Choose the colour convention requested from the model
    Markup { scheme: MarkupScheme },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}
