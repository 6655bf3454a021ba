use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use parking_lot::Mutex;

use crate::foundation::error::{ReelError, ReelResult};

/// Named flat file set the external encoder reads from and writes to.
///
/// Names are plain file names (`frame_000001.png`), never paths.
pub trait Workspace: Send + Sync {
    fn write(&self, name: &str, bytes: &[u8]) -> ReelResult<()>;
    fn read(&self, name: &str) -> ReelResult<Vec<u8>>;
    /// Removing a missing file is not an error.
    fn delete(&self, name: &str) -> ReelResult<()>;
    fn exists(&self, name: &str) -> bool;
    /// Sorted list of every file currently held.
    fn names(&self) -> Vec<String>;
    /// Backing directory, when the files live on disk.
    fn local_dir(&self) -> Option<&Path>;
}

pub fn validate_name(name: &str) -> ReelResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0')
    {
        return Err(ReelError::validation(format!(
            "invalid workspace file name '{name}'"
        )));
    }
    Ok(())
}

/// Workspace backed by a directory. A directory created by [`DirWorkspace::temp`] is removed
/// when the workspace is dropped.
#[derive(Debug)]
pub struct DirWorkspace {
    root: PathBuf,
    owned: bool,
}

impl DirWorkspace {
    pub fn temp() -> ReelResult<Self> {
        let root = std::env::temp_dir().join(format!(
            "scenereel_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create workspace '{}'", root.display()))?;
        Ok(Self { root, owned: true })
    }

    /// Use an existing (or new) directory that outlives the workspace.
    pub fn at(root: impl Into<PathBuf>) -> ReelResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create workspace '{}'", root.display()))?;
        Ok(Self { root, owned: false })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> ReelResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

impl Workspace for DirWorkspace {
    fn write(&self, name: &str, bytes: &[u8]) -> ReelResult<()> {
        let path = self.path(name)?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(())
    }

    fn read(&self, name: &str) -> ReelResult<Vec<u8>> {
        let path = self.path(name)?;
        let bytes =
            std::fs::read(&path).with_context(|| format!("failed to read '{}'", path.display()))?;
        Ok(bytes)
    }

    fn delete(&self, name: &str) -> ReelResult<()> {
        let path = self.path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("failed to delete '{}'", path.display()))
                .into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn names(&self) -> Vec<String> {
        let mut out: Vec<String> = std::fs::read_dir(&self.root)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        out.sort();
        out
    }

    fn local_dir(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

impl Drop for DirWorkspace {
    fn drop(&mut self) {
        if self.owned {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }
}

/// In-memory workspace for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl Workspace for MemoryWorkspace {
    fn write(&self, name: &str, bytes: &[u8]) -> ReelResult<()> {
        validate_name(name)?;
        self.files.lock().insert(name.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> ReelResult<Vec<u8>> {
        self.files
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ReelError::encoder(format!("workspace has no file '{name}'")))
    }

    fn delete(&self, name: &str) -> ReelResult<()> {
        self.files.lock().remove(name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    fn local_dir(&self) -> Option<&Path> {
        None
    }
}
