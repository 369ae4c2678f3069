//! API key resolution.
//!
//! A key can be configured three ways, checked in this order:
//!
//! 1. **Inline** - `summarizer.api_key` (or `OPENAI_API_KEY` via overrides)
//! 2. **File** - `summarizer.api_key_file`, e.g. a mounted Docker secret
//! 3. **Env var name** - `summarizer.api_key_env`, read at start-up

use std::path::PathBuf;

use secrecy::SecretString;

use crate::config::SummarizerConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set api_key, api_key_file or api_key_env)")]
    Missing,

    #[error("Failed to read API key from '{path}': {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{0}' is empty")]
    EmptyFile(PathBuf),

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    NotUnicode { name: String },
}

/// Where an API key may come from.
#[derive(Debug, Clone, Default)]
pub struct SecretSource<'a> {
    pub inline: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> From<&'a SummarizerConfig> for SecretSource<'a> {
    fn from(config: &'a SummarizerConfig) -> Self {
        Self {
            inline: config.api_key.as_deref(),
            file: config.api_key_file.as_deref(),
            env_var: config.api_key_env.as_deref(),
        }
    }
}

impl SecretSource<'_> {
    /// True if any source is configured at all.
    pub fn is_configured(&self) -> bool {
        [self.inline, self.file, self.env_var]
            .iter()
            .any(|s| s.is_some_and(|s| !s.trim().is_empty()))
    }

    /// Resolves the key; blank values count as absent.
    ///
    /// An unset env var falls through to [`SecretError::Missing`], a file
    /// that cannot be read is an error.
    pub fn resolve(&self) -> Result<SecretString, SecretError> {
        if let Some(value) = non_blank(self.inline) {
            return Ok(SecretString::from(value.to_string()));
        }

        if let Some(path) = non_blank(self.file) {
            let path = expand_home(path);
            let content = std::fs::read_to_string(&path).map_err(|e| SecretError::File {
                path: path.clone(),
                source: e,
            })?;
            let key = content.trim();
            if key.is_empty() {
                return Err(SecretError::EmptyFile(path));
            }
            return Ok(SecretString::from(key.to_string()));
        }

        if let Some(name) = non_blank(self.env_var) {
            match std::env::var(name) {
                Ok(value) if !value.trim().is_empty() => {
                    return Ok(SecretString::from(value.trim().to_string()));
                }
                Ok(_) | Err(std::env::VarError::NotPresent) => {
                    log::debug!("API key variable {} is not set", name);
                }
                Err(std::env::VarError::NotUnicode(_)) => {
                    return Err(SecretError::NotUnicode {
                        name: name.to_string(),
                    });
                }
            }
        }

        Err(SecretError::Missing)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Expands a leading `~` or `~/`. `~user` forms are left alone.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => Some(""),
        Some(rest) if rest.starts_with('/') => Some(&rest[1..]),
        _ => None,
    };
    match (rest, dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
