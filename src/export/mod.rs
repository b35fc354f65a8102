use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::cluster::ClusterResult;

/// Export format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown format '{}' (expected json or csv)", other)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Where a photo ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoCategory {
    Group,
    Bucket,
    Unlocated,
    Noise,
    Rejected,
}

impl PhotoCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoCategory::Group => "group",
            PhotoCategory::Bucket => "bucket",
            PhotoCategory::Unlocated => "unlocated",
            PhotoCategory::Noise => "noise",
            PhotoCategory::Rejected => "rejected",
        }
    }
}

/// One row per input photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementRow<'a> {
    pub photo_id: &'a str,
    pub category: PhotoCategory,
    pub cluster_id: &'a str,
    pub session_id: &'a str,
    pub unit_id: &'a str,
}

impl<'a> PlacementRow<'a> {
    fn outside(photo_id: &'a str, category: PhotoCategory) -> Self {
        Self {
            photo_id,
            category,
            cluster_id: "",
            session_id: "",
            unit_id: "",
        }
    }
}

/// Flatten a result into per-photo placements: clustered photos first, in
/// cluster order, then unlocated, noise and rejected.
pub fn placement_rows(result: &ClusterResult) -> Vec<PlacementRow<'_>> {
    let mut rows = Vec::new();

    match result {
        ClusterResult::Groups(r) => {
            for group in &r.groups {
                for photo_id in &group.photo_ids {
                    rows.push(PlacementRow {
                        photo_id,
                        category: PhotoCategory::Group,
                        cluster_id: &group.group_id,
                        session_id: &group.group_id,
                        unit_id: "",
                    });
                }
            }
        }
        ClusterResult::Buckets(r) => {
            for bucket in &r.buckets {
                for session in &bucket.sessions {
                    let units: HashMap<&str, &str> = session
                        .suggested_units
                        .iter()
                        .flat_map(|u| u.photo_ids.iter().map(|p| (p.as_str(), u.unit_id.as_str())))
                        .collect();
                    for photo_id in &session.photo_ids {
                        rows.push(PlacementRow {
                            photo_id,
                            category: PhotoCategory::Bucket,
                            cluster_id: &bucket.bucket_id,
                            session_id: &session.session_id,
                            unit_id: units.get(photo_id.as_str()).copied().unwrap_or(""),
                        });
                    }
                }
            }
        }
    }

    for photo_id in result.unlocated_photo_ids() {
        rows.push(PlacementRow::outside(photo_id, PhotoCategory::Unlocated));
    }
    for photo_id in result.noise_gps_photo_ids() {
        rows.push(PlacementRow::outside(photo_id, PhotoCategory::Noise));
    }
    for rejected in result.rejected() {
        rows.push(PlacementRow::outside(&rejected.photo_id, PhotoCategory::Rejected));
    }

    rows
}

/// Write `result` in `format`. Returns the number of photos written.
pub fn write_result<W: Write>(result: &ClusterResult, format: ExportFormat, writer: W) -> Result<usize> {
    let count = result.stats().total_photos;
    match format {
        ExportFormat::Json => export_json(result, writer)?,
        ExportFormat::Csv => export_csv(result, writer)?,
    }
    Ok(count)
}

/// Export a result to a file
pub fn export_result(result: &ClusterResult, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let file = File::create(output_path)?;
    let count = write_result(result, format, BufWriter::new(file))?;
    tracing::info!(
        path = %output_path.display(),
        format = format.name(),
        photos = count,
        "Exported clustering result"
    );
    Ok(count)
}

fn export_json<W: Write>(result: &ClusterResult, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn export_csv<W: Write>(result: &ClusterResult, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    // Write headers
    wtr.write_record(["photo_id", "category", "cluster_id", "session_id", "unit_id"])?;

    // Write data
    for row in placement_rows(result) {
        wtr.write_record([
            row.photo_id,
            row.category.as_str(),
            row.cluster_id,
            row.session_id,
            row.unit_id,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
