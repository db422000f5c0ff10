//! On-disk stub directory.
//!
//! A store directory holds one `<Class>.pyi` module per class, a manifest
//! (`classes.json`) describing them and an `__init__.pyi` index re-exporting
//! every class. Nothing else may live there: the store refuses to open a
//! directory it does not fully own.
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::TreeError;
use crate::naming;
use crate::render::{HEADER, render};
use crate::strategies::Strategies;
use crate::tree::build_tree;
use crate::value::Value;

pub const MANIFEST_FILE: &str = "classes.json";
pub const INDEX_FILE: &str = "__init__.pyi";

static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(from\s+\S+\s+)?import\s").expect("import regex"));

/// What to do when a class is committed a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfExists {
    Overwrite,
    /// Keep the stored module; fail unless the new one is equivalent.
    #[default]
    Validate,
}

impl FromStr for IfExists {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(IfExists::Overwrite),
            "validate" => Ok(IfExists::Validate),
            other => Err(TreeError::invalid_config(
                "if_exists",
                format!("expected any of (overwrite, validate) but got `{other}`"),
            )),
        }
    }
}

impl std::fmt::Display for IfExists {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IfExists::Overwrite => "overwrite",
            IfExists::Validate => "validate",
        })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unreadable manifest {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },

    #[error(
        "`{class_name}` already exists with a different shape; overwrite it, reset the store \
         or make the input compliant"
    )]
    NonCompliant { class_name: String },

    #[error("{} contains files the store did not create: {}", .dir.display(), .files.join(", "))]
    ForeignFiles { dir: PathBuf, files: Vec<String> },

    #[error("manifest lists `{class_name}` but {} is missing", .path.display())]
    MissingSource { class_name: String, path: PathBuf },
}

pub type StoreResult<T> = Result<T, StoreError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub structural_hash: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub classes: IndexMap<String, ManifestEntry>,
}

/// Result of committing one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Overwritten,
    /// Already stored and equivalent.
    Unchanged,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Outcome::Created => "created",
            Outcome::Overwritten => "overwritten",
            Outcome::Unchanged => "unchanged",
        })
    }
}

/// A rendered module that is ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stub {
    pub class_name: String,
    pub source: String,
    pub structural_hash: u64,
}

impl Stub {
    pub fn render(
        value: &Value,
        class_name: &str,
        strategies: impl Into<Arc<Strategies>>,
    ) -> Result<Self, TreeError> {
        let tree = build_tree(value, class_name, strategies)?;
        let source = render(&tree)?.to_module();
        Ok(Self {
            class_name: class_name.to_string(),
            source,
            structural_hash: tree.structural_hash(),
        })
    }
}

#[derive(Debug)]
pub struct StubStore {
    dir: PathBuf,
    if_exists: IfExists,
    manifest: Manifest,
}

impl StubStore {
    /// Open (creating if needed) the store at `dir`.
    pub fn open(dir: impl Into<PathBuf>, if_exists: IfExists) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let src = fs::read_to_string(&manifest_path).map_err(io_error(&manifest_path))?;
            crate::path_de::from_str_with_path::<Manifest>(&src).map_err(|e| StoreError::Manifest {
                path: manifest_path.clone(),
                reason: e.to_string(),
            })?
        } else {
            Manifest::default()
        };

        let store = Self { dir, if_exists, manifest };
        store.check_ownership()?;
        debug!(dir = %store.dir.display(), classes = store.manifest.classes.len(), "opened stub store");
        Ok(store)
    }

    fn check_ownership(&self) -> StoreResult<()> {
        let mut foreign = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_error(&self.dir))? {
            let entry = entry.map_err(io_error(&self.dir))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let owned = name == MANIFEST_FILE
                || name == INDEX_FILE
                || self.manifest.classes.values().any(|e| e.file == name);
            if !owned {
                foreign.push(name);
            }
        }
        if !foreign.is_empty() {
            foreign.sort();
            return Err(StoreError::ForeignFiles { dir: self.dir.clone(), files: foreign });
        }
        for (class_name, entry) in &self.manifest.classes {
            let path = self.dir.join(&entry.file);
            if !path.is_file() {
                return Err(StoreError::MissingSource { class_name: class_name.clone(), path });
            }
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn if_exists(&self) -> IfExists {
        self.if_exists
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &ManifestEntry)> {
        self.manifest.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn path_of(&self, class_name: &str) -> PathBuf {
        self.dir.join(format!("{class_name}.pyi"))
    }

    /// Infer, render and commit `value` as `class_name`.
    pub fn from_value(
        &mut self,
        value: &Value,
        class_name: &str,
        strategies: impl Into<Arc<Strategies>>,
    ) -> StoreResult<Outcome> {
        let stub = Stub::render(value, class_name, strategies)?;
        self.commit(&stub)
    }

    pub fn commit(&mut self, stub: &Stub) -> StoreResult<Outcome> {
        let class_name = stub.class_name.as_str();
        if !naming::is_identifier(class_name) {
            return Err(TreeError::InvalidIdentifier(class_name.to_string()).into());
        }
        let path = self.path_of(class_name);
        let now = Utc::now();

        if self.manifest.classes.contains_key(class_name) {
            match self.if_exists {
                IfExists::Validate => {
                    let stored = fs::read_to_string(&path).map_err(io_error(&path))?;
                    if !equivalent_ignoring_imports(&stored, &stub.source) {
                        warn!(class = class_name, "stored stub differs from the new input");
                        return Err(StoreError::NonCompliant { class_name: class_name.to_string() });
                    }
                    debug!(class = class_name, "stub unchanged");
                    return Ok(Outcome::Unchanged);
                }
                IfExists::Overwrite => {
                    fs::write(&path, &stub.source).map_err(io_error(&path))?;
                    if let Some(entry) = self.manifest.classes.get_mut(class_name) {
                        entry.structural_hash = stub.structural_hash;
                        entry.updated_at = now;
                    }
                    self.save()?;
                    info!(class = class_name, path = %path.display(), "overwrote stub");
                    return Ok(Outcome::Overwritten);
                }
            }
        }

        fs::write(&path, &stub.source).map_err(io_error(&path))?;
        self.manifest.classes.insert(
            class_name.to_string(),
            ManifestEntry {
                file: format!("{class_name}.pyi"),
                structural_hash: stub.structural_hash,
                created_at: now,
                updated_at: now,
            },
        );
        self.save()?;
        info!(class = class_name, path = %path.display(), "created stub");
        Ok(Outcome::Created)
    }

    fn save(&self) -> StoreResult<()> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&self.manifest).map_err(|e| StoreError::Manifest {
            path: manifest_path.clone(),
            reason: e.to_string(),
        })?;
        fs::write(&manifest_path, json).map_err(io_error(&manifest_path))?;

        let index_path = self.dir.join(INDEX_FILE);
        fs::write(&index_path, self.render_index()).map_err(io_error(&index_path))
    }

    /// `__init__.pyi` re-exporting every class.
    pub fn render_index(&self) -> String {
        let mut names: Vec<&str> = self.manifest.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        let mut out = format!("{HEADER}\n");
        for name in &names {
            out.push_str(&format!("from .{name} import {name}\n"));
        }
        let all = names.iter().map(|n| format!("\"{n}\"")).collect::<Vec<_>>().join(", ");
        out.push_str(&format!("\n__all__ = [{all}]\n"));
        out
    }

    /// Delete every artifact, the directory included.
    pub fn reset(self) -> StoreResult<()> {
        fs::remove_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        info!(dir = %self.dir.display(), classes = self.manifest.classes.len(), "reset stub store");
        Ok(())
    }
}

/// Compare two modules ignoring blank lines, comments and imports.
pub fn equivalent_ignoring_imports(a: &str, b: &str) -> bool {
    significant_lines(a).eq(significant_lines(b))
}

fn significant_lines(src: &str) -> impl Iterator<Item = &str> {
    let mut in_import = false;
    src.lines().filter(move |line| {
        let trimmed = line.trim();
        if in_import {
            in_import = !trimmed.starts_with(')');
            return false;
        }
        if IMPORT_LINE.is_match(trimmed) {
            in_import = trimmed.ends_with('(');
            return false;
        }
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}
