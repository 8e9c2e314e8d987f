//! Local file helpers: reference image loading and output persistence.

use crate::error::{GemImgError, Result};
use crate::image::ReferenceImage;
use chrono::{DateTime, Local};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Extensions accepted for reference images.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "heic", "heif"];

/// Extension used for generated files when no output path is given.
pub const OUTPUT_EXTENSION: &str = "png";

/// Maps a file extension to the MIME type sent to the API.
///
/// Unknown extensions are sent as JPEG.
pub fn mime_type_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "gif" => "image/gif",
        _ => "image/jpeg",
    }
}

/// Validates and reads a reference image from disk.
pub fn load_reference_image(path: impl AsRef<Path>) -> Result<ReferenceImage> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(GemImgError::FileNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(GemImgError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: ext,
        });
    }

    let data = std::fs::read(path).map_err(|e| GemImgError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(ReferenceImage::new(data, mime_type_for_extension(&ext)))
}

/// Writes bytes to `path`, creating parent directories as needed.
///
/// The data goes to a temporary file in the same directory which is then
/// renamed over `path`, so a failed write never leaves a partial file.
pub fn write_bytes(path: &Path, data: &[u8]) -> Result<()> {
    let write_err = |source| GemImgError::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(write_err)?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Output file name for a generation started at `now`.
///
/// Millisecond resolution keeps concurrent runs from sharing a name.
pub fn output_file_name(now: DateTime<Local>) -> String {
    format!(
        "gemimg_{}.{OUTPUT_EXTENSION}",
        now.format("%Y%m%d_%H%M%S_%3f")
    )
}

/// Timestamped output path in the current directory.
pub fn default_output_path() -> PathBuf {
    PathBuf::from(output_file_name(Local::now()))
}
