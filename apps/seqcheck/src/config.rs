//! Configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/seqcheck/seqcheck.toml`
//! - Windows: `%APPDATA%/seqcheck/seqcheck.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use seqcheck_analysis::{DEFAULT_TOOL, FastQcInvoker};
use seqcheck_pipeline::PipelineConfig;
use seqcheck_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_WORKER_TIMEOUT};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum bytes per transfer chunk (0 = default).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Parent directory for per-request scratch files.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// Parent directory for per-request reports.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Seconds allowed for all chunk workers of one upload.
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,

    /// Analysis tool executable.
    #[serde(default = "default_tool")]
    pub tool: PathBuf,

    /// Extra arguments passed to the tool before the input path.
    #[serde(default)]
    pub tool_args: Vec<String>,

    /// Seconds before the tool is killed (0 = no limit).
    #[serde(default)]
    pub analysis_timeout_secs: u64,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir().join("seqcheck")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("fastqc_output")
}

fn default_worker_timeout_secs() -> u64 {
    DEFAULT_WORKER_TIMEOUT.as_secs()
}

fn default_tool() -> PathBuf {
    PathBuf::from(DEFAULT_TOOL)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            work_root: default_work_root(),
            output_root: default_output_root(),
            worker_timeout_secs: default_worker_timeout_secs(),
            tool: default_tool(),
            tool_args: Vec::new(),
            analysis_timeout_secs: 0,
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the default location), creating a
    /// default file if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        } else {
            let config = Config::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Pipeline settings derived from this configuration.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            chunk_size: self.chunk_size,
            work_root: self.work_root.clone(),
            output_root: self.output_root.clone(),
            worker_timeout: Duration::from_secs(self.worker_timeout_secs),
        }
    }

    /// Analysis tool launcher derived from this configuration.
    pub fn invoker(&self) -> FastQcInvoker {
        let timeout = (self.analysis_timeout_secs > 0)
            .then(|| Duration::from_secs(self.analysis_timeout_secs));
        FastQcInvoker::new(&self.tool)
            .with_args(self.tool_args.clone())
            .with_timeout(timeout)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("seqcheck").join("seqcheck.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("seqcheck")
            .join("seqcheck.toml"))
    }
}
