//! File discovery module.
//!
//! Discovers candidate source files under a root while respecting .gitignore
//! rules. Which of them are actually scanned is decided by the scanner
//! registry.

use crate::config::ScanConfig;
use crate::error::StructmapError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};

/// Discovers source files in a repository.
pub struct FileDiscovery {
    /// Additional include patterns (override excludes)
    include_patterns: Vec<String>,
    /// Additional ignore patterns
    exclude_patterns: Vec<String>,
    /// Whether to include hidden files
    include_hidden: bool,
    /// Max file size in bytes
    max_file_size: u64,
    /// Directory the index writes to; never scanned
    output_dir: Option<PathBuf>,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

impl FileDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            include_patterns: config.include.clone(),
            exclude_patterns: config.exclude.clone(),
            include_hidden: config.include_hidden,
            max_file_size: config.max_file_size,
            output_dir: None,
        }
    }

    /// Add an exclude pattern.
    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(pattern.to_string());
        self
    }

    /// Skip everything under `dir`.
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }

    /// Discover all candidate files under `root`, sorted by path.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, StructmapError> {
        if !root.is_dir() {
            return Err(StructmapError::Discovery(format!(
                "{} is not a directory",
                root.display()
            )));
        }

        let default_excludes = build_globset(default_exclude_patterns())?;
        let user_excludes = build_globset(self.exclude_patterns.iter().map(|s| s.as_str()))?;
        let user_includes = build_globset(self.include_patterns.iter().map(|s| s.as_str()))?;

        // Build walker with .gitignore support
        let walker = WalkBuilder::new(root)
            .hidden(!self.include_hidden)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::<PathBuf>::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if self
                .output_dir
                .as_deref()
                .is_some_and(|out| path.starts_with(out))
            {
                continue;
            }

            let rel = path.strip_prefix(root).unwrap_or(path);
            if is_excluded(rel, &default_excludes, &user_excludes, &user_includes) {
                continue;
            }

            if self.within_size_limit(path) {
                files.push(path.to_path_buf());
            } else {
                tracing::debug!("Skipping {} (larger than {} bytes)", rel.display(), self.max_file_size);
            }
        }

        files.sort();
        Ok(files)
    }

    fn within_size_limit(&self, path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };
        metadata.len() <= self.max_file_size
    }
}

/// Root-relative, `/`-separated form of a discovered path.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn default_exclude_patterns() -> Vec<&'static str> {
    vec![
        "**/.git/**",
        "**/.structmap/**",
        "**/target/**",
        "**/node_modules/**",
        "**/dist/**",
        "**/build/**",
        "**/__pycache__/**",
        "**/.venv/**",
        "**/venv/**",
        "**/.next/**",
        "**/*.min.js",
        "**/*.d.ts",
    ]
}

fn build_globset<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Result<GlobSet, StructmapError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| StructmapError::Discovery(format!("invalid pattern `{pattern}`: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| StructmapError::Discovery(e.to_string()))
}

fn is_excluded(path: &Path, default: &GlobSet, user: &GlobSet, include: &GlobSet) -> bool {
    let is_included = include.is_match(path);
    let is_excluded = default.is_match(path) || user.is_match(path);
    is_excluded && !is_included
}
