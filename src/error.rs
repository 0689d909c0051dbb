use thiserror::Error;

/// Longest slice of an offending payload quoted back in a decode error.
const FRAGMENT_LIMIT: usize = 256;

/// Everything that can abort an invocation. None of these are retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("git diff failed ({status}): {stderr}")]
    DiffSource { status: String, stderr: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{provider} API returned HTTP {status}: {body}")]
    Provider {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode response: {reason} (data: {fragment})")]
    Decode { fragment: String, reason: String },

    #[error("terminal write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn decode(fragment: &str, reason: impl std::fmt::Display) -> Self {
        let fragment = match fragment.char_indices().nth(FRAGMENT_LIMIT) {
            Some((cut, _)) => format!("{}...", &fragment[..cut]),
            None => fragment.to_string(),
        };
        Error::Decode {
            fragment,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
