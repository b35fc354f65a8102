//! Build clustering input from a local folder of photos.

pub mod discovery;
pub mod metadata;

use anyhow::Result;
use chrono::SecondsFormat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ScannerConfig;
use crate::photo::RescuePhoto;

pub use discovery::{discover_images, relative_id};
pub use metadata::{extract_capture, CaptureMetadata};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_files: usize,
    pub with_gps: usize,
    pub without_gps: usize,
    pub missing_taken_at: usize,
}

/// A file left out of the photo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub photos: Vec<RescuePhoto>,
    pub skipped: Vec<SkippedFile>,
    pub stats: ScanStats,
}

enum Scanned {
    Photo(RescuePhoto),
    Skipped(SkippedFile),
}

/// Scan `directory` recursively. Files without a capture time are skipped,
/// never passed on with a guessed timestamp.
pub fn scan_directory(directory: &Path, config: &ScannerConfig) -> Result<ScanReport> {
    let image_paths = discover_images(directory, &config.image_extensions)?;
    tracing::info!(
        directory = %directory.display(),
        files = image_paths.len(),
        "Scanning photos"
    );

    let scanned: Vec<Scanned> = image_paths
        .par_iter()
        .map(|path| scan_single_file(directory, path))
        .collect();

    let mut report = ScanReport {
        stats: ScanStats {
            total_files: image_paths.len(),
            ..Default::default()
        },
        ..Default::default()
    };

    for item in scanned {
        match item {
            Scanned::Photo(photo) => {
                if photo.lat.is_some() && photo.lng.is_some() {
                    report.stats.with_gps += 1;
                } else {
                    report.stats.without_gps += 1;
                }
                report.photos.push(photo);
            }
            Scanned::Skipped(skipped) => {
                tracing::warn!(path = %skipped.path.display(), "Skipping photo: {}", skipped.reason);
                report.stats.missing_taken_at += 1;
                report.skipped.push(skipped);
            }
        }
    }

    tracing::info!(
        photos = report.photos.len(),
        with_gps = report.stats.with_gps,
        without_gps = report.stats.without_gps,
        skipped = report.skipped.len(),
        "Scan complete"
    );

    Ok(report)
}

fn scan_single_file(root: &Path, path: &Path) -> Scanned {
    let metadata = match extract_capture(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            return Scanned::Skipped(SkippedFile {
                path: path.to_path_buf(),
                reason: format!("unreadable: {}", e),
            })
        }
    };

    let Some(taken_at) = metadata.taken_at else {
        return Scanned::Skipped(SkippedFile {
            path: path.to_path_buf(),
            reason: "no capture time in EXIF".to_string(),
        });
    };

    let file_size = std::fs::metadata(path).map(|m| m.len()).ok();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    Scanned::Photo(RescuePhoto {
        photo_id: relative_id(root, path),
        taken_at_utc: taken_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        lat: metadata.gps_latitude,
        lng: metadata.gps_longitude,
        accuracy_m: metadata.gps_accuracy_m,
        file_name,
        file_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_files_without_capture_time_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.jpg"), b"no exif here").unwrap();
        fs::write(dir.path().join("b.jpg"), b"nor here").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let report = scan_directory(dir.path(), &ScannerConfig::default()).unwrap();
        assert!(report.photos.is_empty());
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.stats.total_files, 2);
        assert_eq!(report.stats.missing_taken_at, 2);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();
        let report = scan_directory(dir.path(), &ScannerConfig::default()).unwrap();
        assert_eq!(report.stats, ScanStats::default());
    }
}
