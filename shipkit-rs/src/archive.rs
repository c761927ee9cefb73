//! Upload archive packaging.
//!
//! Two independent zip archives per deployment: the full resulting source
//! set (kept server-side so later `changes`-mode patches have something to
//! apply against) and the bundled output alone under a fixed canonical
//! name. The logical file listing is deterministic for identical inputs.

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::DeployError;
use crate::source_store::SourceStore;

/// Canonical name of the bundled module inside the bundle archive.
pub const BUNDLE_FILE_NAME: &str = "index.js";

#[derive(Debug, Clone)]
pub struct DeploymentArchives {
    pub source: Vec<u8>,
    pub bundle: Vec<u8>,
}

fn write_archive<'a>(
    entries: impl Iterator<Item = (&'a str, &'a [u8])>,
) -> Result<Vec<u8>, DeployError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, bytes) in entries {
        writer
            .start_file(path, options)
            .map_err(|e| DeployError::deploy_failed(format!("Failed to add '{}': {}", path, e)))?;
        writer
            .write_all(bytes)
            .map_err(|e| DeployError::deploy_failed(format!("Failed to write '{}': {}", path, e)))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| DeployError::deploy_failed(format!("Failed to finish archive: {}", e)))?;
    Ok(cursor.into_inner())
}

/// Package the original source files (store iteration order is already
/// deterministic).
pub fn package_source(store: &SourceStore) -> Result<Vec<u8>, DeployError> {
    write_archive(store.iter().map(|(path, content)| (path, content.as_bytes())))
}

/// Package the bundled output alone under [`BUNDLE_FILE_NAME`].
pub fn package_bundle(code: &str) -> Result<Vec<u8>, DeployError> {
    write_archive(std::iter::once((BUNDLE_FILE_NAME, code.as_bytes())))
}
