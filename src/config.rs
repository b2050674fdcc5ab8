use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::DefaultDates;
use crate::error::GideError;
use crate::index::{DEFAULT_INDEX_NAME, DEFAULT_INDEX_URL};
use crate::ontology::DEFAULT_OLS_URL;
use crate::transform::bia::{DEFAULT_BIA_URL, DEFAULT_PAGE_SIZE};

pub const DEFAULT_CONFIG_FILE: &str = "gide-search.json";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub default_dates: Option<DatesEntry>,
    #[serde(default)]
    pub elasticsearch_url: Option<String>,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub ols_url: Option<String>,
    #[serde(default)]
    pub bia_url: Option<String>,
    #[serde(default)]
    pub bia_page_size: Option<usize>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DatesEntry {
    #[serde(default)]
    pub idr: Option<NaiveDate>,
    #[serde(default)]
    pub ssbd: Option<NaiveDate>,
    #[serde(default)]
    pub linked_data: Option<NaiveDate>,
    #[serde(default)]
    pub bia: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub dates: DefaultDates,
    pub elasticsearch_url: String,
    pub index_name: String,
    pub api_key: Option<String>,
    pub ols_url: String,
    pub bia_url: String,
    pub bia_page_size: usize,
    pub output_dir: Utf8PathBuf,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        ConfigLoader::resolve_config(Config::default())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, GideError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| GideError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| GideError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    pub fn resolve_config(config: Config) -> ResolvedConfig {
        let defaults = DefaultDates::default();
        let dates = match config.default_dates {
            Some(entry) => DefaultDates {
                idr: entry.idr.unwrap_or(defaults.idr),
                ssbd: entry.ssbd.unwrap_or(defaults.ssbd),
                linked_data: entry.linked_data.unwrap_or(defaults.linked_data),
                bia: entry.bia.unwrap_or(defaults.bia),
            },
            None => defaults,
        };

        ResolvedConfig {
            dates,
            elasticsearch_url: config
                .elasticsearch_url
                .unwrap_or_else(|| DEFAULT_INDEX_URL.to_string()),
            index_name: config
                .index_name
                .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string()),
            api_key: config.api_key.filter(|key| !key.trim().is_empty()),
            ols_url: config.ols_url.unwrap_or_else(|| DEFAULT_OLS_URL.to_string()),
            bia_url: config.bia_url.unwrap_or_else(|| DEFAULT_BIA_URL.to_string()),
            bia_page_size: config
                .bia_page_size
                .filter(|size| *size > 0)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            output_dir: Utf8PathBuf::from(
                config
                    .output_dir
                    .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
        }
    }
}
