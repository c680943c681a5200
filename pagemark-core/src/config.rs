use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ids::{IdGenerator, SequentialIdGenerator, UuidIdGenerator};
use crate::search::{SearchOptions, SEARCH_MARKER};

pub const DEFAULT_SEARCH_COLOR: &str = "#ff6b6b";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub ids: IdConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub color: String,
    pub marker: String,
    pub case_insensitive: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            color: DEFAULT_SEARCH_COLOR.to_owned(),
            marker: SEARCH_MARKER.to_owned(),
            case_insensitive: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    #[default]
    Uuid,
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdConfig {
    pub strategy: IdStrategy,
    pub prefix: String,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            strategy: IdStrategy::Uuid,
            prefix: "h".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let payload = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        Self::parse(&payload).with_context(|| format!("failed to decode config file {:?}", path))
    }

    pub fn parse(payload: &str) -> Result<Self> {
        Ok(toml::from_str(payload)?)
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            case_insensitive: self.search.case_insensitive,
            marker: self.search.marker.clone(),
        }
    }

    pub fn id_generator(&self) -> Arc<dyn IdGenerator> {
        match self.ids.strategy {
            IdStrategy::Uuid => Arc::new(UuidIdGenerator),
            IdStrategy::Sequential => Arc::new(SequentialIdGenerator::new(self.ids.prefix.clone())),
        }
    }
}
