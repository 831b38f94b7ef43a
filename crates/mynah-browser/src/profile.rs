use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Throwaway Chrome profile for one session.
///
/// Every dispatch gets a fresh `--user-data-dir` so no cookies, permissions
/// or crash-restore state leak between meetings. The directory is removed
/// when the manager is dropped.
pub struct ProfileManager {
    path: PathBuf,
}

impl ProfileManager {
    pub fn temporary() -> Result<Self> {
        let temp_dir = tempfile::tempdir().map_err(|e| Error::Io(e.into()))?;
        Ok(Self {
            path: temp_dir.keep(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProfileManager {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_creates_and_cleans_up() {
        let profile = ProfileManager::temporary().unwrap();
        let path = profile.path().to_path_buf();

        assert!(path.is_dir());
        drop(profile);
        assert!(!path.exists());
    }
}
