use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub mod defaults;

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    /// Request body ceiling in bytes; must leave room above `import.max_file_size`
    pub max_request_size: Option<usize>,
}

/// Limits and tables for the import pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub max_file_size: usize,
    pub max_rows: usize,
    pub max_string_length: usize,
    pub write_group_size: usize,
    pub membership_query_limit: usize,
    pub header_scan_rows: usize,
    pub preferred_sheet: String,
    pub default_country: String,
    /// Per-caller hourly import quota; unlimited when absent
    pub max_imports_per_hour: Option<u32>,
    /// Extra header label synonyms (normalized label -> canonical key)
    pub header_aliases: BTreeMap<String, String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_rows: DEFAULT_MAX_ROWS,
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            write_group_size: DEFAULT_WRITE_GROUP_SIZE,
            membership_query_limit: DEFAULT_MEMBERSHIP_QUERY_LIMIT,
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            preferred_sheet: DEFAULT_PREFERRED_SHEET.to_string(),
            default_country: DEFAULT_COUNTRY.to_string(),
            max_imports_per_hour: None,
            header_aliases: BTreeMap::new(),
        }
    }
}

/// Bearer tokens accepted by the static verifier (token -> account id)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
            web: WebConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                base_url: format!("http://localhost:{}", DEFAULT_PORT),
                max_request_size: None,
            },
            import: ImportConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, writing the defaults there if the file is missing
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(path, contents)?;
            Ok(default_config)
        }
    }

    pub fn max_request_size(&self) -> usize {
        self.web
            .max_request_size
            .unwrap_or(self.import.max_file_size + MULTIPART_OVERHEAD)
    }
}
