//! Filesystem-backed skill repository.
//!
//! Scans a directory for `*.md` documents that parse as skills. Files that
//! do not parse are skipped with a warning so one broken document cannot
//! take the whole repository down.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use skein_core::{Result, Skill, SkillRepository, SkillSummary};
use tracing::warn;
use walkdir::WalkDir;

use crate::parser::parse_skill;

/// A skill repository over a directory of Markdown documents.
#[derive(Debug, Clone)]
pub struct FsSkillRepository {
    root: PathBuf,
    max_depth: usize,
}

impl FsSkillRepository {
    /// Creates a repository rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_depth: 3,
        }
    }

    /// Sets the maximum directory depth to scan.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scans the directory, returning each parsed skill with its source.
    /// When two documents declare the same id and version, the later one
    /// wins.
    pub fn scan(&self) -> Result<Vec<(Skill, String, PathBuf)>> {
        let mut found: Vec<(Skill, String, PathBuf)> = Vec::new();

        if !self.root.exists() {
            return Ok(found);
        }

        for entry in WalkDir::new(&self.root)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let source = std::fs::read_to_string(path)?;
            match parse_skill(&source) {
                Ok(skill) => {
                    if let Some(existing) = found.iter_mut().find(|(s, _, _)| {
                        s.id == skill.id && s.version == skill.version
                    }) {
                        warn!(
                            skill_id = %skill.id,
                            path = %path.display(),
                            replaced = %existing.2.display(),
                            "duplicate skill document, later file wins"
                        );
                        *existing = (skill, source, path.to_path_buf());
                    } else {
                        found.push((skill, source, path.to_path_buf()));
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparseable skill document");
                }
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl SkillRepository for FsSkillRepository {
    async fn list(&self) -> Result<Vec<SkillSummary>> {
        Ok(self
            .scan()?
            .iter()
            .map(|(skill, _, _)| SkillSummary::from(skill))
            .collect())
    }

    async fn load(&self, id: &str, version: Option<&str>) -> Result<Option<String>> {
        Ok(self
            .scan()?
            .into_iter()
            .find(|(skill, _, _)| {
                skill.id == id
                    && match version {
                        Some(wanted) => skill.version.as_deref() == Some(wanted),
                        None => true,
                    }
            })
            .map(|(_, source, _)| source))
    }
}
