//! Artifact filesystem
//!
//! Rendered images land under `{DATA_DIR}/static/qrcode/{key_id}/...`,
//! partitioned by principal and by generation kind so concurrent writers
//! never contend on a path. The same tree is served read-only at `/data`.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::ApiError;

/// Which subtree of a principal's namespace an artifact belongs to
pub enum ArtifactKind<'a> {
    Static,
    Dynamic,
    /// Bulk artifacts share a per-request directory
    Bulk(&'a str),
}

impl ArtifactKind<'_> {
    fn segment(&self) -> String {
        match self {
            ArtifactKind::Static => "static".to_string(),
            ArtifactKind::Dynamic => "dynamic".to_string(),
            ArtifactKind::Bulk(bulk_id) => format!("bulk/{}", bulk_id),
        }
    }
}

#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_dir(&self, key_id: &str, kind: &ArtifactKind<'_>) -> String {
        format!("static/qrcode/{}/{}", key_id, kind.segment())
    }

    /// The path a client sees, rooted at the /data mount
    pub fn public_path(&self, key_id: &str, kind: &ArtifactKind<'_>, file_name: &str) -> String {
        format!("/data/{}/{}", self.relative_dir(key_id, kind), file_name)
    }

    /// Writes an artifact, creating its directory as needed
    ///
    /// Repeat writes to the same path overwrite in place; content-addressed
    /// names make that idempotent by construction.
    pub async fn write(
        &self,
        key_id: &str,
        kind: &ArtifactKind<'_>,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), ApiError> {
        let dir = self.root.join(self.relative_dir(key_id, kind));
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(file_name), bytes).await?;
        Ok(())
    }

    /// Modification time of an existing artifact, None if absent
    pub async fn modified_at(
        &self,
        key_id: &str,
        kind: &ArtifactKind<'_>,
        file_name: &str,
    ) -> Option<DateTime<Utc>> {
        let path = self
            .root
            .join(self.relative_dir(key_id, kind))
            .join(file_name);
        let meta = tokio::fs::metadata(path).await.ok()?;
        meta.modified().ok().map(DateTime::<Utc>::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_creates_partitioned_directories() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        store
            .write("key1", &ArtifactKind::Static, "abc.png", b"png-bytes")
            .await
            .unwrap();
        store
            .write("key1", &ArtifactKind::Bulk("req42"), "x.png", b"more")
            .await
            .unwrap();

        let written = dir.path().join("static/qrcode/key1/static/abc.png");
        assert_eq!(std::fs::read(written).unwrap(), b"png-bytes");
        assert!(dir.path().join("static/qrcode/key1/bulk/req42/x.png").exists());
    }

    #[tokio::test]
    async fn overwriting_the_same_path_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        store
            .write("k", &ArtifactKind::Dynamic, "id.png", b"first")
            .await
            .unwrap();
        store
            .write("k", &ArtifactKind::Dynamic, "id.png", b"second")
            .await
            .unwrap();

        let written = dir.path().join("static/qrcode/k/dynamic/id.png");
        assert_eq!(std::fs::read(written).unwrap(), b"second");
    }

    #[test]
    fn public_paths_mirror_the_disk_layout() {
        let store = ArtifactStore::new("data");
        assert_eq!(
            store.public_path("k7", &ArtifactKind::Static, "h.png"),
            "/data/static/qrcode/k7/static/h.png"
        );
        assert_eq!(
            store.public_path("k7", &ArtifactKind::Bulk("b1"), "f.svg"),
            "/data/static/qrcode/k7/bulk/b1/f.svg"
        );
    }
}
