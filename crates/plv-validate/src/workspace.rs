//! Per-URL scratch directories.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Directory holding exactly one manifest for one validation attempt.
///
/// Created workspaces are exclusively owned and uniquely named. A workspace
/// wrapping an existing directory (see [`Workspace::existing`]) is never
/// removed.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    manifest_path: PathBuf,
    owned: bool,
}

impl Workspace {
    /// Create `<root>/<uuid>/` and write `contents` as `manifest_file_name`.
    ///
    /// The manifest is staged under a temporary name and renamed into place,
    /// so the returned workspace always holds the complete file. On any
    /// failure the directory is removed again.
    pub async fn create(root: &Path, manifest_file_name: &str, contents: &[u8]) -> io::Result<Self> {
        let dir = root.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir(&dir).await?;

        let manifest_path = dir.join(manifest_file_name);
        let staging = dir.join(format!(".{manifest_file_name}.partial"));
        let written = async {
            tokio::fs::write(&staging, contents).await?;
            tokio::fs::rename(&staging, &manifest_path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_dir_all(&dir).await;
            return Err(e);
        }

        Ok(Self {
            dir,
            manifest_path,
            owned: true,
        })
    }

    /// Wrap a directory that already contains a manifest.
    pub fn existing(dir: impl Into<PathBuf>, manifest_file_name: &str) -> Self {
        let dir = dir.into();
        let manifest_path = dir.join(manifest_file_name);
        Self {
            dir,
            manifest_path,
            owned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Delete the directory. No-op for workspaces this process did not create.
    pub async fn remove(self) -> io::Result<()> {
        if self.owned {
            tokio::fs::remove_dir_all(&self.dir).await
        } else {
            Ok(())
        }
    }
}
