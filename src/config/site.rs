//! Site configuration (_config.yml)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::ConfigError;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    /// `%s` is replaced with the page title
    pub title_template: String,
    pub description: String,
    pub language: String,

    // URL
    pub url: String,
    pub root: String,

    #[serde(default)]
    pub menu: Vec<MenuItem>,

    #[serde(default)]
    pub highlight: HighlightConfig,

    #[serde(default)]
    pub notion: NotionConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            title_template: "%s | My Blog".to_string(),
            description: "A blog about technology, programming, and more".to_string(),
            language: "en".to_string(),

            url: "http://localhost:3000".to_string(),
            root: "/".to_string(),

            menu: vec![MenuItem {
                name: "Home".to_string(),
                path: "/".to_string(),
            }],

            highlight: HighlightConfig::default(),
            notion: NotionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load `_config.yml` from a base directory, falling back to defaults
    /// when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(base_dir: P) -> Result<Self, ConfigError> {
        let config_path = base_dir.as_ref().join("_config.yml");
        if config_path.exists() {
            tracing::debug!("Loading site config from {:?}", config_path);
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Format a page title through `title_template`
    pub fn page_title(&self, title: Option<&str>) -> String {
        match title {
            Some(title) if !title.is_empty() => self.title_template.replace("%s", title),
            _ => self.title.clone(),
        }
    }
}

/// Navigation entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub name: String,
    pub path: String,
}

/// Syntax highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Name of a syntect bundled theme
    pub theme: String,
    /// Upper bound for highlighting a single code block
    pub timeout_ms: u64,
    pub line_numbers: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            timeout_ms: 2000,
            line_numbers: false,
        }
    }
}

/// Notion database layout and client settings.
///
/// Credentials are not stored here; they come from the environment
/// (see [`super::NotionCredentials`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotionConfig {
    pub api_base: String,
    pub version: String,
    pub timeout_secs: u64,
    pub title_property: String,
    pub date_property: String,
    pub tags_property: String,
    pub description_property: String,
    pub slug_property: String,
    /// Checkbox property gating visibility. Unset means every page is public.
    pub published_property: Option<String>,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.notion.com/v1".to_string(),
            version: "2022-06-28".to_string(),
            timeout_secs: 15,
            title_property: "Title".to_string(),
            date_property: "Date".to_string(),
            tags_property: "Tags".to_string(),
            description_property: "Description".to_string(),
            slug_property: "Slug".to_string(),
            published_property: None,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ip: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}
