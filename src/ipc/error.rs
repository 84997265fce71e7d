use serde_json::json;

use crate::error::StoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    let details = match e {
        StoreError::ValidationFailed(violations) => Some(json!({
            "reason": violations.first().map(|v| v.reason()),
            "violations": violations
                .iter()
                .map(|v| json!({
                    "reason": v.reason(),
                    "field": v.field(),
                    "message": v.to_string(),
                }))
                .collect::<Vec<_>>(),
        })),
        StoreError::OutOfRange { index, len } => Some(json!({ "index": index, "len": len })),
        StoreError::SourceNotFound { path }
        | StoreError::LoadFailed { path, .. }
        | StoreError::UnsavedChanges { path }
        | StoreError::PersistFailed { path, .. } => {
            Some(json!({ "path": path.to_string_lossy() }))
        }
        _ => None,
    };
    err(id, e.code(), e.to_string(), details)
}
