//! Zip archive handling
//!
//! Extracts uploaded archives into a job workspace and packages rendered
//! variants into the reserved download archive.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{FxError, Result};

/// Reserved name of the packaged output archive
pub const ARCHIVE_NAME: &str = "processed_files.zip";

/// Directory created by macOS archivers alongside real entries
const MACOS_METADATA_DIR: &str = "__MACOSX";

fn archive_error(path: &Path, reason: impl Into<String>) -> FxError {
    FxError::Archive {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Whether `path` should be treated as a zip archive
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Hidden files and archiver metadata are never treated as sources
fn is_ignored(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            name.starts_with('.') || name == MACOS_METADATA_DIR
        }
        _ => false,
    })
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract every file entry of `archive` into `dest`
///
/// Entry names are sanitized; entries that would escape `dest` are skipped.
/// Returns the extracted file paths, sorted.
///
/// # Errors
/// * `Archive` - If the archive is unreadable, corrupt, or holds no files
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut zip =
        ZipArchive::new(file).map_err(|e| archive_error(archive, format!("cannot open: {}", e)))?;

    fs::create_dir_all(dest)?;
    let mut extracted = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| archive_error(archive, format!("corrupt entry {}: {}", i, e)))?;

        let relative = match entry.enclosed_name() {
            Some(name) => name.to_path_buf(),
            None => {
                warn!("Skipping unsafe archive entry '{}'", entry.name());
                continue;
            }
        };
        if entry.is_dir() || is_ignored(&relative) {
            continue;
        }

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            archive_error(archive, format!("failed to inflate '{}': {}", relative.display(), e))
        })?;
        debug!("Extracted {}", relative.display());
        extracted.push(target);
    }

    if extracted.is_empty() {
        return Err(archive_error(archive, "archive contains no files"));
    }

    extracted.sort();
    info!(
        "Extracted {} files from {} to {}",
        extracted.len(),
        archive.display(),
        dest.display()
    );
    Ok(extracted)
}

// ============================================================================
// Packaging
// ============================================================================

/// One member of a packaged archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagedFile {
    pub name: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the member contents
    pub sha256: String,
}

/// Result of [`package_outputs`]
#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub archive_path: PathBuf,
    pub members: Vec<PackagedFile>,
}

impl PackageSummary {
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }
}

/// Regular files in `output_dir`, sorted by name, excluding the reserved
/// archive and hidden files
pub fn list_output_files(output_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(output_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == ARCHIVE_NAME || name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    Ok(names)
}

/// Bundle every file in `output_dir` into `processed_files.zip`
///
/// Members are added in filename order. Any earlier archive of the reserved
/// name is replaced and never included in the new one.
pub fn package_outputs(output_dir: &Path) -> Result<PackageSummary> {
    if !output_dir.is_dir() {
        return Err(FxError::FileNotFound {
            path: output_dir.to_path_buf(),
        });
    }

    let names = list_output_files(output_dir)?;
    let archive_path = output_dir.join(ARCHIVE_NAME);

    // Build beside the final path, then rename into place
    let mut staging = tempfile::Builder::new()
        .prefix(".packaging-")
        .tempfile_in(output_dir)?;

    let mut members = Vec::with_capacity(names.len());
    {
        let mut writer = ZipWriter::new(&mut staging);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for name in &names {
            let bytes = fs::read(output_dir.join(name))?;
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| archive_error(&archive_path, e.to_string()))?;
            writer.write_all(&bytes)?;

            members.push(PackagedFile {
                name: name.clone(),
                size_bytes: bytes.len() as u64,
                sha256: format!("{:x}", Sha256::digest(&bytes)),
            });
        }
        writer
            .finish()
            .map_err(|e| archive_error(&archive_path, e.to_string()))?;
    }

    staging.persist(&archive_path).map_err(|e| e.error)?;
    info!(
        "Packaged {} files into {}",
        members.len(),
        archive_path.display()
    );

    Ok(PackageSummary {
        archive_path,
        members,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, data) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_member_names(path: &Path) -> Vec<String> {
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_is_archive() {
        assert!(is_archive(Path::new("upload.ZIP")));
        assert!(!is_archive(Path::new("song.wav")));
        assert!(!is_archive(Path::new("zip")));
    }

    #[test]
    fn test_extract_skips_metadata() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("in.zip");
        write_zip(
            &zip_path,
            &[
                ("b.wav", b"bbb"),
                ("nested/a.wav", b"aaa"),
                ("__MACOSX/._b.wav", b"junk"),
                (".DS_Store", b"junk"),
            ],
        );

        let dest = dir.path().join("out");
        let files = extract_archive(&zip_path, &dest).unwrap();
        assert_eq!(files, vec![dest.join("b.wav"), dest.join("nested/a.wav")]);
        assert_eq!(fs::read(dest.join("nested/a.wav")).unwrap(), b"aaa");
    }

    #[test]
    fn test_extract_corrupt_archive() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("bad.zip");
        fs::write(&zip_path, b"PK not really").unwrap();

        let err = extract_archive(&zip_path, &dir.path().join("out")).unwrap_err();
        assert_eq!(err.error_code(), "ARCHIVE_ERROR");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_extract_empty_archive() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("empty.zip");
        write_zip(&zip_path, &[]);

        let err = extract_archive(&zip_path, &dir.path().join("out")).unwrap_err();
        assert_eq!(err.error_code(), "ARCHIVE_ERROR");
    }

    #[test]
    fn test_package_sorted_members() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a_variant1.wav"), b"one").unwrap();
        fs::write(dir.path().join("a_variant0.wav"), b"zero").unwrap();

        let summary = package_outputs(dir.path()).unwrap();
        assert_eq!(summary.member_names(), vec!["a_variant0.wav", "a_variant1.wav"]);
        assert_eq!(summary.members[0].size_bytes, 4);
        assert_eq!(
            read_member_names(&summary.archive_path),
            vec!["a_variant0.wav", "a_variant1.wav"]
        );
    }

    #[test]
    fn test_package_excludes_previous_archive() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x_variant0.wav"), b"x").unwrap();
        package_outputs(dir.path()).unwrap();

        fs::write(dir.path().join("y_variant0.wav"), b"y").unwrap();
        let summary = package_outputs(dir.path()).unwrap();

        assert_eq!(summary.member_names(), vec!["x_variant0.wav", "y_variant0.wav"]);
        assert_eq!(
            read_member_names(&dir.path().join(ARCHIVE_NAME)),
            vec!["x_variant0.wav", "y_variant0.wav"]
        );
        // No staging files left behind
        assert_eq!(
            list_output_files(dir.path()).unwrap(),
            vec!["x_variant0.wav", "y_variant0.wav"]
        );
    }

    #[test]
    fn test_package_checksum() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("abc.wav"), b"abc").unwrap();
        let summary = package_outputs(dir.path()).unwrap();
        assert_eq!(
            summary.members[0].sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
