use std::path::Path;

/// Create the directory at `path`, and its parents, if missing.
pub fn create_dir_or_err(path: &Path) -> anyhow::Result<()> {
    if !path.is_dir() {
        log::info!("Creating directory {}", path.display());
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Create the file at `path` with `contents`, if missing.
///
/// Parent directories are created as needed. An existing file is left alone.
pub fn create_file_with_contents(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_or_err(parent)?;
    }
    if !path.is_file() {
        log::info!("Creating file {}", path.display());
        std::fs::write(path, contents)?;
    }
    Ok(())
}
