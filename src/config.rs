use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable holding the GitHub bearer token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "ISSUETABLE_CACHE_DIR";

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub cache_dir: PathBuf,
    pub cache_enabled: bool,
}

impl Config {
    /// Build configuration from the environment. A missing token is a hard
    /// precondition failure: nothing can be fetched without it.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .with_context(|| format!("Missing {} environment variable", TOKEN_ENV))?;
        if token.trim().is_empty() {
            anyhow::bail!("{} is set but empty", TOKEN_ENV);
        }

        Ok(Self {
            token,
            cache_dir: cache_dir(),
            cache_enabled: true,
        })
    }
}

/// Cache directory: explicit override, else the platform cache dir,
/// else a temp-dir fallback. Entries here are a build-local optimization
/// and safe to delete.
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("issuetable")
}
