use anyhow::Context;
use std::ffi::OsString;
use std::path::PathBuf;

const CONFIG_FILE: &str = "config.toml";

/// Location of the config file. Nothing is created here; [`crate::config::Config::save`]
/// makes the directory on first write.
pub fn config_path() -> anyhow::Result<PathBuf> {
    resolve(|var| std::env::var_os(var))
}

fn resolve(var: impl Fn(&str) -> Option<OsString>) -> anyhow::Result<PathBuf> {
    let set = |name: &str| var(name).filter(|v| !v.is_empty()).map(PathBuf::from);

    if let Some(home) = set("DIFX_HOME") {
        return Ok(home.join(CONFIG_FILE));
    }
    if let Some(xdg) = set("XDG_CONFIG_HOME") {
        return Ok(xdg.join("difx").join(CONFIG_FILE));
    }

    let home = set("HOME").context("HOME is not set; set DIFX_HOME to pick a config directory")?;
    Ok(home.join(".config").join("difx").join(CONFIG_FILE))
}
