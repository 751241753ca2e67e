//! Blob storage collaborator for source images and derived overlays.
//!
//! The pipeline only ever sees the `ArtifactStore` trait: put bytes, get a
//! stable reference back; hand a reference in for deletion. The bundled
//! implementation writes to a local directory; a cloud backend slots in
//! behind the same trait. Deletion failures are logged and swallowed by
//! the callers — losing an orphaned blob never fails a pipeline call.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("Artifact reference outside store root: {0}")]
    ForeignRef(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    SourceImage,
    Overlay,
}

impl ArtifactKind {
    fn prefix(&self) -> &'static str {
        match self {
            ArtifactKind::SourceImage => "images",
            ArtifactKind::Overlay => "overlays",
        }
    }
}

pub trait ArtifactStore: Send + Sync {
    /// Store bytes, returning a stable reference for later retrieval or
    /// deletion.
    fn put(
        &self,
        subject_id: &Uuid,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> Result<String, ArtifactError>;

    fn delete(&self, artifact_ref: &str) -> Result<(), ArtifactError>;
}

/// Filesystem-backed store: `<root>/<subject>/<kind>/<uuid>.bin`, with the
/// root-relative path as the reference.
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, artifact_ref: &str) -> Result<PathBuf, ArtifactError> {
        // References are relative paths we issued ourselves; reject
        // anything that climbs out of the root.
        let rel = Path::new(artifact_ref);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(ArtifactError::ForeignRef(artifact_ref.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn put(
        &self,
        subject_id: &Uuid,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> Result<String, ArtifactError> {
        let rel = format!("{}/{}/{}.bin", subject_id, kind.prefix(), Uuid::new_v4());
        let path = self.root.join(&rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(rel)
    }

    fn delete(&self, artifact_ref: &str) -> Result<(), ArtifactError> {
        let path = self.resolve(artifact_ref)?;
        fs::remove_file(path)?;
        Ok(())
    }
}

/// Best-effort artifact release. Failures are logged, never propagated —
/// blob cleanup must not turn a successful delete into a pipeline error.
pub fn release_artifact(store: &dyn ArtifactStore, artifact_ref: &str) {
    if let Err(e) = store.delete(artifact_ref) {
        tracing::warn!(artifact_ref, "artifact release failed, skipping: {e}");
    }
}
