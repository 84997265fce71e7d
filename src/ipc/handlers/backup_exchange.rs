use crate::backup;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{param_str, require_store};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_backup_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(out_path) = param_str(req, "outPath").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match backup::export_bundle(store.list(), &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "path": out_path.to_string_lossy(),
                "bundleFormat": summary.bundle_format,
                "entryCount": summary.entry_count,
                "recordCount": summary.record_count,
                "sha256": summary.sha256,
            }),
        ),
        Err(e) => err(&req.id, "backup_failed", format!("{e:#}"), None),
    }
}

fn handle_backup_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(in_path) = param_str(req, "inPath").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };

    let imported = match backup::import_bundle(&in_path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "backup_failed", format!("{e:#}"), None),
    };
    match store.replace_all(imported.records) {
        Ok(count) => ok(
            &req.id,
            json!({
                "bundleFormatDetected": imported.bundle_format_detected,
                "count": count,
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_backup_export(state, req)),
        "backup.import" => Some(handle_backup_import(state, req)),
        _ => None,
    }
}
