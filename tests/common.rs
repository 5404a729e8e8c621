//! Shared test utilities for integration tests.
//!
//! Provides helpers for building temporary sites: an HTML page next to the
//! Markdown documents it references.

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use url::Url;

/// Creates temporary site directory containing the given files.
///
/// # Arguments
///
/// * `files`: Pairs of relative path and content; parent directories are created
///
/// # Errors
///
/// Returns error if directory or file creation fails
pub fn create_site(files: &[(&str, &str)]) -> Result<TempDir> {
    let dir = TempDir::new()?;

    for (path, content) in files {
        let path = dir.path().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }

    Ok(dir)
}

/// Returns canonical path of a file inside the site.
pub fn site_path(site: &TempDir, path: &str) -> Result<PathBuf> {
    Ok(site.path().canonicalize()?.join(path))
}

/// Returns file URL of a page inside the site.
pub fn page_url(site: &TempDir, page: &str) -> Result<Url> {
    let path = site_path(site, page)?;
    Url::from_file_path(&path).map_err(|()| anyhow::anyhow!("Not absolute: {}", path.display()))
}

/// Wraps body markup in a minimal HTML page.
pub fn html_page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Docs</title></head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

/// Reads a file from the site as UTF-8.
pub fn read(site: &TempDir, path: impl AsRef<Path>) -> Result<String> {
    Ok(fs::read_to_string(site.path().join(path))?)
}
