use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::marks_file::{parse_marks_text, render_marks_text};
use crate::record::StudentRecord;

const MANIFEST_ENTRY: &str = "manifest.json";
const DATA_ENTRY: &str = "data/studentmarks.txt";
pub const BUNDLE_FORMAT_V1: &str = "studentd-bundle-v1";
pub const PLAIN_MARKS_FORMAT: &str = "marks-text";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub record_count: usize,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportedBundle {
    pub bundle_format_detected: String,
    pub records: Vec<StudentRecord>,
}

pub fn export_bundle(records: &[StudentRecord], out_path: &Path) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let data = render_marks_text(records);
    let sha256 = sha256_hex(data.as_bytes());

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "recordCount": records.len(),
        "sha256": sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DATA_ENTRY, opts)
        .context("failed to start student data entry")?;
    zip.write_all(data.as_bytes())
        .context("failed to write student data entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        record_count: records.len(),
        sha256,
    })
}

/// Reads a bundle written by `export_bundle`, or a bare marks file.
pub fn import_bundle(in_path: &Path) -> anyhow::Result<ImportedBundle> {
    if !is_zip_file(in_path)? {
        let bytes = std::fs::read(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        let parsed = parse_marks_text(&String::from_utf8_lossy(&bytes));
        return Ok(ImportedBundle {
            bundle_format_detected: PLAIN_MARKS_FORMAT.to_string(),
            records: parsed.records,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut data = Vec::new();
    archive
        .by_name(DATA_ENTRY)
        .context("bundle missing data/studentmarks.txt")?
        .read_to_end(&mut data)
        .context("failed to read student data entry")?;

    let expected = manifest
        .get("sha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let actual = sha256_hex(&data);
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(anyhow!(
            "student data checksum mismatch (manifest {}, actual {})",
            expected,
            actual
        ));
    }

    let parsed = parse_marks_text(&String::from_utf8_lossy(&data));
    Ok(ImportedBundle {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        records: parsed.records,
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
