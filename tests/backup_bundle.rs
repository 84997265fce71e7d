#[path = "../src/backup.rs"]
mod backup;
#[path = "../src/error.rs"]
mod error;
#[path = "../src/marks_file.rs"]
mod marks_file;
#[path = "../src/record.rs"]
mod record;

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn fixture_path(rel: &str) -> PathBuf {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    base.join("fixtures").join(rel)
}

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[test]
fn zip_export_and_import_roundtrip() {
    let out_dir = temp_dir("studentd-bundle-roundtrip");
    let parsed =
        marks_file::load_marks_file(&fixture_path("studentmarks.txt")).expect("parse fixture");

    let bundle_path = out_dir.join("nested").join("students.bundle.zip");
    let export = backup::export_bundle(&parsed.records, &bundle_path).expect("export bundle");
    assert_eq!(export.bundle_format, backup::BUNDLE_FORMAT_V1);
    assert_eq!(export.entry_count, 2);
    assert_eq!(export.record_count, 10);
    assert_eq!(export.sha256.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");
    let mut manifest = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest).expect("manifest json");
    assert_eq!(manifest["format"], backup::BUNDLE_FORMAT_V1);
    assert_eq!(manifest["recordCount"], 10);
    assert_eq!(manifest["sha256"], export.sha256.as_str());
    assert!(manifest["exportedAt"].as_str().is_some());

    let import = backup::import_bundle(&bundle_path).expect("import bundle");
    assert_eq!(import.bundle_format_detected, backup::BUNDLE_FORMAT_V1);
    assert_eq!(import.records, parsed.records);

    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn plain_marks_file_import_is_supported() {
    let import = backup::import_bundle(&fixture_path("studentmarks_legacy.txt"))
        .expect("import plain marks file");
    assert_eq!(import.bundle_format_detected, backup::PLAIN_MARKS_FORMAT);
    assert_eq!(import.records.len(), 3);
}

#[test]
fn checksum_mismatch_is_rejected() {
    let out_dir = temp_dir("studentd-bundle-tampered");
    let bundle_path = out_dir.join("tampered.zip");

    let f = File::create(&bundle_path).expect("create bundle");
    let mut zip = zip::ZipWriter::new(f);
    let opts = zip::write::FileOptions::default();
    let manifest = serde_json::json!({
        "format": backup::BUNDLE_FORMAT_V1,
        "version": 1,
        "sha256": backup::sha256_hex(b"1\nS1,Alice,1,1,1,1\n"),
    });
    zip.start_file("manifest.json", opts).expect("manifest entry");
    zip.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    zip.start_file("data/studentmarks.txt", opts)
        .expect("data entry");
    zip.write_all(b"1\nS1,Alice,20,20,20,100\n")
        .expect("write data");
    zip.finish().expect("finish zip");

    let e = backup::import_bundle(&bundle_path).expect_err("tampered bundle");
    assert!(e.to_string().contains("checksum mismatch"), "{e}");

    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn unknown_bundle_format_is_rejected() {
    let out_dir = temp_dir("studentd-bundle-format");
    let bundle_path = out_dir.join("other.zip");

    let f = File::create(&bundle_path).expect("create bundle");
    let mut zip = zip::ZipWriter::new(f);
    zip.start_file("manifest.json", zip::write::FileOptions::default())
        .expect("manifest entry");
    zip.write_all(br#"{"format":"gradebook-export-v3"}"#)
        .expect("write manifest");
    zip.finish().expect("finish zip");

    let e = backup::import_bundle(&bundle_path).expect_err("wrong format");
    assert!(e.to_string().contains("unsupported bundle format"), "{e}");

    let _ = std::fs::remove_dir_all(out_dir);
}
