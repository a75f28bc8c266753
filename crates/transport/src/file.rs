//! The file handed to the transport: declared metadata plus a byte source.

use std::path::{Path, PathBuf};

use filerelay_protocol::FileInfo;
use filerelay_protocol::constants::OCTET_STREAM;

use crate::error::TransportError;

/// Where the upload body is read from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Streamed from disk when the upload starts.
    Path(PathBuf),
    /// Already in memory.
    Memory(Vec<u8>),
}

/// A file chosen for transfer.
#[derive(Debug, Clone)]
pub struct UploadFile {
    info: FileInfo,
    source: UploadSource,
}

impl UploadFile {
    /// Describes a file on disk.
    ///
    /// `requested_name` is the name the user typed; when blank, the file's
    /// own name is declared instead. The size comes from the file metadata.
    pub async fn from_path(
        path: impl AsRef<Path>,
        requested_name: &str,
    ) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(TransportError::NotAFile(path.to_path_buf()));
        }

        let own_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            info: FileInfo {
                name: resolve_name(requested_name, &own_name),
                mime_type: detect_mime_type(path).to_string(),
                size: meta.len(),
            },
            source: UploadSource::Path(path.to_path_buf()),
        })
    }

    /// Describes an in-memory payload.
    pub fn from_bytes(name: &str, mime_type: Option<&str>, data: Vec<u8>) -> Self {
        let mime_type = mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| detect_mime_type(Path::new(name)));
        Self {
            info: FileInfo {
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                size: data.len() as u64,
            },
            source: UploadSource::Memory(data),
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn source(&self) -> &UploadSource {
        &self.source
    }

    /// Declared size in bytes.
    pub fn size(&self) -> u64 {
        self.info.size
    }
}

/// Picks the declared name: the trimmed user input, or the fallback when
/// the input is blank.
pub fn resolve_name(requested: &str, fallback: &str) -> String {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Detects a MIME type from the file extension.
///
/// Unknown or missing extensions map to `application/octet-stream`.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("txt" | "log") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => OCTET_STREAM,
    }
}
