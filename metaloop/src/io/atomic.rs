//! Crash-safe file replacement shared by the config and state writers.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Replace `path` with `contents` via a sibling `<name>.tmp` file and a rename.
///
/// Readers see either the old or the new file, never a partial write.
pub fn replace_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    }
    let tmp = staging_path(path);
    fs::write(&tmp, contents).with_context(|| format!("stage {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("move {} over {}", tmp.display(), path.display()))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
