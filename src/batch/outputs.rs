//! Upload intake and output directory management
//!
//! Reading an output never deletes anything. Cleanup is a separate, explicit
//! [`finalize_outputs`] call made once the client has everything it wants.

use std::fs;
use std::path::{Component, Path};

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ProcessorConfig;
use crate::error::{FxError, Result};

/// An upload that was not admitted to the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedUpload {
    pub name: String,
    pub reason: String,
}

/// Outcome of filtering a set of uploaded file names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadIntake {
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedUpload>,
}

/// Check one upload name against the allowed extensions
///
/// Returns the rejection when the name is not admitted.
pub fn screen_upload(name: &str, config: &ProcessorConfig) -> Option<RejectedUpload> {
    let reason = match Path::new(name).extension().and_then(|e| e.to_str()) {
        Some(ext) if config.allows_extension(ext) => return None,
        Some(ext) => format!("extension '{}' is not allowed", ext),
        None => "file has no extension".to_string(),
    };
    warn!("Rejected upload '{}': {}", name, reason);
    Some(RejectedUpload {
        name: name.to_string(),
        reason,
    })
}

/// Split upload names into accepted and rejected by extension
pub fn filter_uploads<S: AsRef<str>>(names: &[S], config: &ProcessorConfig) -> UploadIntake {
    let mut intake = UploadIntake::default();
    for name in names {
        let name = name.as_ref();
        match screen_upload(name, config) {
            Some(rejected) => intake.rejected.push(rejected),
            None => intake.accepted.push(name.to_string()),
        }
    }
    intake
}

/// Check that `name` is a single plain file name
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Read one output file (a variant or the archive) without side effects
pub fn read_output(output_dir: &Path, name: &str) -> Result<Vec<u8>> {
    let path = output_dir.join(name);
    if !is_plain_file_name(name) || !path.is_file() {
        return Err(FxError::FileNotFound { path });
    }
    Ok(fs::read(&path)?)
}

/// Remove every processed file and the archive from `output_dir`
///
/// Returns the names removed, sorted. Subdirectories are left alone.
pub fn finalize_outputs(output_dir: &Path) -> Result<Vec<String>> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut removed = Vec::new();
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        fs::remove_file(entry.path())?;
        removed.push(entry.file_name().to_string_lossy().into_owned());
    }
    removed.sort();

    info!(
        "Finalized {}: removed {} files",
        output_dir.display(),
        removed.len()
    );
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::archive::{package_outputs, ARCHIVE_NAME};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_filter_uploads_reports_rejections() {
        let config = ProcessorConfig::default();
        let intake = filter_uploads(&["a.wav", "b.MP3", "c.flac", "notes", "d.zip"], &config);

        assert_eq!(intake.accepted, vec!["a.wav", "b.MP3", "d.zip"]);
        let rejected: Vec<&str> = intake.rejected.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(rejected, vec!["c.flac", "notes"]);
    }

    #[test]
    fn test_screen_upload_reasons() {
        let config = ProcessorConfig::default();
        assert_eq!(screen_upload("take.ogg", &config), None);
        assert_eq!(
            screen_upload("take.flac", &config).unwrap().reason,
            "extension 'flac' is not allowed"
        );
        assert_eq!(
            screen_upload("README", &config).unwrap().reason,
            "file has no extension"
        );
    }

    #[test]
    fn test_read_output_has_no_side_effects() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_variant0.wav"), b"zero").unwrap();
        fs::write(dir.path().join("a_variant1.wav"), b"one").unwrap();

        assert_eq!(read_output(dir.path(), "a_variant0.wav").unwrap(), b"zero");
        assert!(dir.path().join("a_variant0.wav").exists());
        assert!(dir.path().join("a_variant1.wav").exists());
    }

    #[test]
    fn test_read_output_refuses_traversal() {
        let dir = tempdir().unwrap();
        let inner = dir.path().join("out");
        fs::create_dir(&inner).unwrap();
        fs::write(dir.path().join("secret.txt"), b"s").unwrap();

        assert!(read_output(&inner, "../secret.txt").is_err());
        assert!(read_output(&inner, "/etc/passwd").is_err());
        assert!(read_output(&inner, "missing.wav").is_err());
    }

    #[test]
    fn test_finalize_after_archive_download_empties_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_variant0.wav"), b"zero").unwrap();
        fs::write(dir.path().join("a_variant1.wav"), b"one").unwrap();
        package_outputs(dir.path()).unwrap();

        let archive = read_output(dir.path(), ARCHIVE_NAME).unwrap();
        assert!(!archive.is_empty());

        let removed = finalize_outputs(dir.path()).unwrap();
        assert_eq!(removed, vec!["a_variant0.wav", "a_variant1.wav", ARCHIVE_NAME]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_finalize_missing_directory_is_noop() {
        let dir = tempdir().unwrap();
        assert!(finalize_outputs(&dir.path().join("nope")).unwrap().is_empty());
    }
}
