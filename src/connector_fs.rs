//! Schema directory scan.
//!
//! Lists the files directly inside `data.schema_path` whose names end in
//! one of the configured extensions. Subdirectories are not descended.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::DataConfig;

/// Return matching schema files sorted by path.
///
/// Sorting fixes the merge order, so for duplicate table names the file
/// that sorts last wins. Unreadable directory entries are logged and
/// skipped; a missing root is an error for the caller to handle.
pub fn scan_schema_dir(config: &DataConfig) -> Result<Vec<PathBuf>> {
    let root = &config.schema_path;
    if !root.is_dir() {
        bail!("Schema directory does not exist: {}", root.display());
    }

    let matcher = build_extension_set(&config.file_extensions)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry in schema directory");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if matcher.is_match(entry.file_name()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn build_extension_set(extensions: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for ext in extensions {
        builder.add(Glob::new(&format!("*{}", ext))?);
    }
    Ok(builder.build()?)
}
