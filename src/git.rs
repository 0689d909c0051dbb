use crate::error::{Error, Result};
use tokio::process::Command;

/// Runs `git diff` with extra arguments and hands back its stdout.
#[derive(Debug, Clone)]
pub struct GitDiff {
    program: String,
}

impl GitDiff {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    #[cfg(test)]
    fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub async fn run(&self, args: &[String]) -> Result<String> {
        tracing::debug!(program = %self.program, ?args, "running diff");

        let output = Command::new(&self.program)
            .arg("diff")
            .args(args)
            .output()
            .await
            .map_err(|e| Error::DiffSource {
                status: format!("could not start {}", self.program),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(Error::DiffSource {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GitDiff {
    fn default() -> Self {
        Self::new()
    }
}

/// Paths named by `diff --git a/<old> b/<new>` headers, new side.
pub fn changed_files(diff: &str) -> Vec<&str> {
    diff.lines()
        .filter_map(|line| line.strip_prefix("diff --git "))
        .filter_map(|rest| rest.split(' ').nth(1))
        .map(|new| new.strip_prefix("b/").unwrap_or(new))
        .collect()
}
