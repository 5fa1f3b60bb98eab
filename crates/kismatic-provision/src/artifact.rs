//! Collision-free output file allocation
//!
//! Plan files are never overwritten: `kismatic-cluster.yaml` is used when
//! free, otherwise `kismatic-cluster-1.yaml`, `kismatic-cluster-2.yaml`, ...
//! Each candidate is claimed with an exclusive create, so two concurrent
//! runs in the same directory cannot end up with the same file.

use crate::error::ProvisionError;
use anyhow::{Context, Result};
use kismatic_provision_common::defaults::{MAX_ARTIFACT_ATTEMPTS, PLAN_BASE_NAME, PLAN_EXTENSION};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A freshly created, exclusively owned output file
#[derive(Debug)]
pub struct AllocatedArtifact {
    pub path: PathBuf,
    pub file: File,
}

impl AllocatedArtifact {
    /// Write and flush `contents` to disk. On failure the file is removed
    /// so the name is free for the next run.
    pub fn write_contents(mut self, contents: &[u8]) -> Result<PathBuf> {
        let written = self
            .file
            .write_all(contents)
            .and_then(|()| self.file.sync_all());
        if let Err(e) = written {
            drop(self.file);
            if let Err(remove) = std::fs::remove_file(&self.path) {
                warn!(
                    path = %self.path.display(),
                    error = %remove,
                    "Failed to remove partial file"
                );
            }
            return Err(e).with_context(|| format!("Failed to write '{}'", self.path.display()));
        }
        Ok(self.path)
    }
}

/// Finds the first free `<base>[-<n>].<extension>` in a directory
#[derive(Debug, Clone)]
pub struct ArtifactAllocator {
    dir: PathBuf,
    base: String,
    extension: String,
    max_attempts: u32,
}

impl ArtifactAllocator {
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
            extension: extension.into(),
            max_attempts: MAX_ARTIFACT_ATTEMPTS,
        }
    }

    /// Allocator for `kismatic-cluster[-n].yaml` in `dir`
    pub fn plan_file(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, PLAN_BASE_NAME, PLAN_EXTENSION)
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name tried for suffix `n`; `0` means no suffix.
    pub fn candidate_name(&self, n: u32) -> String {
        if n == 0 {
            format!("{}.{}", self.base, self.extension)
        } else {
            format!("{}-{}.{}", self.base, n, self.extension)
        }
    }

    /// Claim the first free candidate name.
    pub fn allocate(&self) -> Result<AllocatedArtifact> {
        for n in 0..self.max_attempts {
            let path = self.dir.join(self.candidate_name(n));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    debug!(path = %path.display(), "Allocated output file");
                    return Ok(AllocatedArtifact { path, file });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create '{}'", path.display()));
                }
            }
        }

        Err(ProvisionError::ArtifactNamesExhausted {
            base: self.base.clone(),
            extension: self.extension.clone(),
            attempts: self.max_attempts,
        }
        .into())
    }
}
