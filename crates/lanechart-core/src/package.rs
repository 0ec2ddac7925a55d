//! Packaging a repaired document as a `.lucid` archive: a zip holding a
//! single `document.json` entry.

use std::io::{Cursor, Write};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::Document;

/// Name of the archive entry the host reads the document from.
pub const DOCUMENT_ENTRY: &str = "document.json";
/// File name the archive is stored and uploaded under.
pub const PACKAGE_FILE_NAME: &str = "form.lucid";

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("failed to serialize document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
}

/// An in-memory archive ready for upload.
#[derive(Debug, Clone)]
pub struct Package {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub fn package(document: &Document) -> Result<Package, PackageError> {
    let json = serde_json::to_vec_pretty(document)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(DOCUMENT_ENTRY, options)?;
    writer.write_all(&json)?;
    let bytes = writer.finish()?.into_inner();

    debug!(document_bytes = json.len(), archive_bytes = bytes.len(); "packaged document");
    Ok(Package {
        file_name: PACKAGE_FILE_NAME.to_string(),
        bytes,
    })
}
