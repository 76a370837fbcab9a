use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::fetch::{BROWSER_USER_AGENT, DEFAULT_TIMEOUT_SECS, DEFAULT_WORKERS};

const ENV_INPUT_DIR: &str = "REDDIT_MEDIA_INPUT_DIR";
const ENV_OUTPUT_DIR: &str = "REDDIT_MEDIA_OUTPUT_DIR";
const ENV_WORKERS: &str = "REDDIT_MEDIA_WORKERS";
const ENV_TIMEOUT_SECS: &str = "REDDIT_MEDIA_TIMEOUT_SECS";

/// Shape of the optional TOML config file. Everything may be omitted.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub(crate) struct ConfigFile {
    #[serde(default)]
    pub(crate) input_dir: Option<PathBuf>,
    #[serde(default)]
    pub(crate) output_root: Option<PathBuf>,
    #[serde(default)]
    pub(crate) output_dir: Option<PathBuf>,
    #[serde(default)]
    pub(crate) workers: Option<usize>,
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub input_dir: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input_dir: PathBuf,
    /// Parent of the timestamped run directory when `output_dir` is not set.
    pub output_root: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub workers: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_root: PathBuf::from("downloads"),
            output_dir: None,
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Defaults, then the config file (if any), then `REDDIT_MEDIA_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(path) = file {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
            cfg.apply_file(&raw).with_context(|| format!("parsing config: {}", path.display()))?;
        }
        cfg.apply_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    pub(crate) fn apply_file(&mut self, raw: &str) -> Result<()> {
        let file: ConfigFile = toml::from_str(raw)?;
        if let Some(v) = file.input_dir { self.input_dir = v; }
        if let Some(v) = file.output_root { self.output_root = v; }
        if let Some(v) = file.output_dir { self.output_dir = Some(v); }
        if let Some(v) = file.workers { self.workers = v.max(1); }
        if let Some(v) = file.timeout_secs { self.timeout_secs = v; }
        if let Some(v) = file.user_agent { self.user_agent = v; }
        Ok(())
    }

    /// Malformed numbers are ignored rather than rejected.
    pub(crate) fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_INPUT_DIR) { self.input_dir = PathBuf::from(v); }
        if let Some(v) = lookup(ENV_OUTPUT_DIR) { self.output_dir = Some(PathBuf::from(v)); }
        if let Some(v) = lookup(ENV_WORKERS).and_then(|s| s.parse::<usize>().ok()) { self.workers = v.max(1); }
        if let Some(v) = lookup(ENV_TIMEOUT_SECS).and_then(|s| s.parse().ok()) { self.timeout_secs = v; }
    }

    pub fn apply_overrides(&mut self, o: Overrides) {
        if let Some(v) = o.input_dir { self.input_dir = v; }
        if let Some(v) = o.output_root { self.output_root = v; }
        if let Some(v) = o.output_dir { self.output_dir = Some(v); }
        if let Some(v) = o.workers { self.workers = v.max(1); }
        if let Some(v) = o.timeout_secs { self.timeout_secs = v; }
    }

    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

    /// Where this run writes: the explicit output dir, or `output_root/<timestamp>`.
    pub fn resolve_output_dir(&self, now: DateTime<Local>) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self.output_root.join(now.format("%Y-%m-%d_%H-%M-%S").to_string()),
        }
    }
}
