//! Configuration module

mod site;

use std::path::PathBuf;
use thiserror::Error;

pub use site::HighlightConfig;
pub use site::MenuItem;
pub use site::NotionConfig;
pub use site::ServerConfig;
pub use site::SiteConfig;

/// Environment variable holding the Notion integration token
pub const NOTION_TOKEN_VAR: &str = "NOTION_TOKEN";
/// Environment variable holding the Notion database id
pub const DATABASE_ID_VAR: &str = "DATABASE_ID";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable `{0}` is not set")]
    MissingEnv(&'static str),

    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid site config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Credentials identifying the content source
#[derive(Clone)]
pub struct NotionCredentials {
    pub token: String,
    pub database_id: String,
}

impl NotionCredentials {
    /// Read `NOTION_TOKEN` and `DATABASE_ID` from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };

        Ok(Self {
            token: require(NOTION_TOKEN_VAR)?,
            database_id: require(DATABASE_ID_VAR)?,
        })
    }
}

// Keep the token out of logs.
impl std::fmt::Debug for NotionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionCredentials")
            .field("token", &"<redacted>")
            .field("database_id", &self.database_id)
            .finish()
    }
}
