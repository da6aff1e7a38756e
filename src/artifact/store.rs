//! JSON persistence for trained artifacts
//!
//! One file per variant under the models directory. Writes go to a staging
//! file first and are renamed into place, so a crash mid-write never leaves
//! a truncated artifact where the loader will find it.

use crate::artifact::ModelArtifact;
use crate::error::{FraudError, Result};
use crate::models::ModelVariant;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const LOAD_ATTEMPTS: usize = 3;

/// Filesystem store for model artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, variant: ModelVariant) -> PathBuf {
        self.dir.join(format!("{}.json", variant.as_str()))
    }

    /// Persist an artifact via staging file + rename
    pub fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let final_path = self.artifact_path(artifact.variant);
        let staging_path = final_path.with_extension("json.tmp");

        let json = serde_json::to_vec(artifact)?;
        fs::write(&staging_path, &json)?;
        fs::rename(&staging_path, &final_path).map_err(|e| {
            FraudError::PersistenceError(format!(
                "failed to publish {}: {}",
                final_path.display(),
                e
            ))
        })?;

        info!(
            variant = %artifact.variant,
            path = %final_path.display(),
            bytes = json.len(),
            "saved model artifact"
        );
        Ok(())
    }

    /// Load the persisted artifact for one variant
    pub fn load(&self, variant: ModelVariant) -> Result<ModelArtifact> {
        let path = self.artifact_path(variant);
        let bytes = fs::read(&path).map_err(|e| {
            FraudError::PersistenceError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;
        Ok(artifact)
    }

    /// Load every persisted artifact present on disk. Retries the directory
    /// scan a few times before giving up; missing or unreadable artifacts
    /// are skipped with a warning rather than failing startup.
    pub fn load_all(&self) -> Vec<ModelArtifact> {
        for attempt in 1..=LOAD_ATTEMPTS {
            if self.dir.exists() {
                break;
            }
            if attempt == LOAD_ATTEMPTS {
                info!(dir = %self.dir.display(), "no artifact directory, starting without models");
                return Vec::new();
            }
            std::thread::sleep(std::time::Duration::from_millis(100));
        }

        let mut artifacts = Vec::new();
        for variant in ModelVariant::all() {
            if !self.artifact_path(variant).exists() {
                continue;
            }
            match self.load(variant) {
                Ok(artifact) => {
                    info!(variant = %variant, "loaded persisted artifact");
                    artifacts.push(artifact);
                }
                Err(e) => {
                    warn!(variant = %variant, error = %e, "skipping unreadable artifact");
                }
            }
        }
        artifacts
    }
}
