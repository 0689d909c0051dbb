use crate::error::{Error, Result};
use crate::render::MarkupScheme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which backend explains the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[default]
    Claude,
    AzureOpenai,
    /// Offline canned response, no credentials needed.
    Stub,
}

impl ProviderKind {
    pub fn label(self) -> &'static str {
        match self {
            ProviderKind::Claude => "Claude",
            ProviderKind::AzureOpenai => "Azure OpenAI",
            ProviderKind::Stub => "stub",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used when `--provider` is not given.
    pub active_model: ProviderKind,

    /// Stream the explanation as it is generated.
    pub streaming: bool,

    /// Colour convention requested from the model.
    pub markup: MarkupScheme,

    pub claude: ClaudeConfig,
    pub azure: AzureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_model: ProviderKind::default(),
            streaming: true,
            markup: MarkupScheme::default(),
            claude: ClaudeConfig::default(),
            azure: AzureConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let s = String::from_utf8(bytes)
            .map_err(|_| Error::Config(format!("{} is not valid UTF-8", path.display())))?;
        let cfg: Config = toml::from_str(&s)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        Ok(Some(cfg))
    }

    /// Write through a temp file and rename so a crash never leaves half a config.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let write_err = |what: &str, p: &Path, e: &dyn std::fmt::Display| {
            Error::Config(format!("failed to {what} {}: {e}", p.display()))
        };

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| write_err("create directory", dir, &e))?;

        let text = toml::to_string_pretty(self).map_err(|e| write_err("serialize", path, &e))?;
        let tmp = tmp_path(path);
        std::fs::write(&tmp, text).map_err(|e| write_err("write", &tmp, &e))?;
        std::fs::rename(&tmp, path).map_err(|e| write_err("replace", path, &e))?;
        Ok(())
    }

    /// Key from the environment, falling back to the file. Empty values count as missing.
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        let (var, stored) = match kind {
            ProviderKind::Claude => ("ANTHROPIC_API_KEY", &self.claude.api_key),
            ProviderKind::AzureOpenai => ("AZURE_OPENAI_API_KEY", &self.azure.api_key),
            ProviderKind::Stub => return None,
        };
        env_or(var, stored)
    }

    pub fn set_api_key(&mut self, kind: ProviderKind, key: String) {
        match kind {
            ProviderKind::Claude => self.claude.api_key = Some(key),
            ProviderKind::AzureOpenai => self.azure.api_key = Some(key),
            ProviderKind::Stub => {}
        }
    }

    pub fn azure_endpoint(&self) -> Option<String> {
        env_or("AZURE_OPENAI_ENDPOINT", &self.azure.endpoint)
    }

    /// Copy safe to print: keys reduced to their last four characters.
    pub fn redacted(&self) -> Self {
        let mut c = self.clone();
        for key in [&mut c.claude.api_key, &mut c.azure.api_key] {
            if let Some(k) = key.as_mut() {
                *k = redact(k);
            }
        }
        c
    }
}

fn env_or(var: &str, stored: &Option<String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .or_else(|| stored.clone())
        .filter(|v| !v.trim().is_empty())
}

fn redact(key: &str) -> String {
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "config.toml".to_string());
    p.set_file_name(format!("{file}.tmp"));
    p
}
