//! Configuration for a structmap run.
//!
//! Loaded from `<root>/structmap.toml`; every field has a default so an absent
//! file means "offline, heuristic summaries, default layout".

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "structmap.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructmapConfig {
    pub project: ProjectConfig,
    pub scan: ScanConfig,
    pub summary: SummaryConfig,
    pub output: OutputConfig,
}

impl StructmapConfig {
    /// Load configuration from the given path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<root>/structmap.toml`, or defaults if the file doesn't exist.
    pub fn load_for_root(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.summary.validate()
    }

    /// Project name, falling back to the root directory name.
    pub fn project_name(&self, root: &Path) -> String {
        self.project.name.clone().unwrap_or_else(|| {
            root.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("project")
                .to_string()
        })
    }

    /// Output directory resolved against the root.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        if self.output.dir.is_absolute() {
            self.output.dir.clone()
        } else {
            root.join(&self.output.dir)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub goals: Vec<String>,
    /// Leading directories stripped when building uids.
    pub source_roots: Vec<String>,
    /// File stems that stand for their parent package (`__init__.py`, `mod.rs`).
    pub index_stems: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            goals: Vec::new(),
            source_roots: vec!["src".to_string(), "lib".to_string()],
            index_stems: vec![
                "__init__".to_string(),
                "mod".to_string(),
                "index".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Worker count; 0 means one per available CPU.
    pub workers: usize,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_file_size: u64,
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            include: Vec::new(),
            exclude: Vec::new(),
            max_file_size: 2 * 1024 * 1024,
            include_hidden: false,
        }
    }
}

impl ScanConfig {
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// When false every entity gets an empty summary.
    pub enabled: bool,
    pub max_chars: usize,
    pub docstring_confidence: f32,
    pub heuristic_confidence: f32,
    /// Used when the remote provider does not report a confidence.
    pub llm_default_confidence: f32,
    pub llm: LlmConfig,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_chars: 240,
            docstring_confidence: 0.9,
            heuristic_confidence: 0.3,
            llm_default_confidence: 0.5,
            llm: LlmConfig::default(),
        }
    }
}

impl SummaryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("docstring_confidence", self.docstring_confidence),
            ("heuristic_confidence", self.heuristic_confidence),
            ("llm_default_confidence", self.llm_default_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "summary.{field} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.heuristic_confidence >= self.docstring_confidence {
            return Err(ConfigError::Invalid(
                "summary.heuristic_confidence must be below docstring_confidence".to_string(),
            ));
        }
        if self.llm_default_confidence >= self.docstring_confidence {
            return Err(ConfigError::Invalid(
                "summary.llm_default_confidence must be below docstring_confidence".to_string(),
            ));
        }
        if self.max_chars == 0 {
            return Err(ConfigError::Invalid(
                "summary.max_chars must be positive".to_string(),
            ));
        }
        if self.llm.enabled && self.llm.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "summary.llm.timeout_ms must be positive when the LLM provider is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Remote summary provider settings. Disabled unless explicitly turned on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub document_file: String,
    pub manifest_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".structmap"),
            document_file: "structure.json".to_string(),
            manifest_file: "manifest.json".to_string(),
        }
    }
}
