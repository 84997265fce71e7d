use serde_json::json;

use crate::ipc::error::{err, store_err};
use crate::ipc::types::{AppState, Request};
use crate::record::StudentRecord;
use crate::store::{CollectionSummary, StudentStore};

pub fn require_store<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut StudentStore, serde_json::Value> {
    state
        .store
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_store", "open a student file first", None))
}

pub fn param_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

/// Marks come from text entries as often as from numbers; both are accepted
/// as long as they hold an integer.
pub fn parse_mark(v: &serde_json::Value, key: &str) -> Result<i64, String> {
    let parsed = match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| format!("numeric fields must be integers ({key})"))
}

pub fn optional_mark(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<i64>, String> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => parse_mark(v, key).map(Some),
    }
}

pub fn optional_text(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<String>, String> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("{key} must be a string")),
    }
}

/// Resolves `params.index` or, failing that, `params.code` to a position.
pub fn resolve_index(store: &StudentStore, req: &Request) -> Result<usize, serde_json::Value> {
    if let Some(v) = req.params.get("index").filter(|v| !v.is_null()) {
        return v
            .as_u64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    "index must be a non-negative integer",
                    None,
                )
            });
    }
    if let Some(code) = param_str(req, "code") {
        return store.position_of(code).map_err(|e| store_err(&req.id, &e));
    }
    Err(err(&req.id, "bad_params", "missing index or code", None))
}

pub fn student_json(index: usize, r: &StudentRecord) -> serde_json::Value {
    let [c1, c2, c3] = r.coursework_marks();
    json!({
        "index": index,
        "code": r.code(),
        "name": r.name(),
        "c1": c1,
        "c2": c2,
        "c3": c3,
        "exam": r.exam(),
        "coursework": r.coursework(),
        "overall": r.overall(),
        "percentage": r.percentage(),
        "percentageDisplay": r.percentage_display(),
        "grade": r.grade().as_str(),
    })
}

pub fn summary_json(s: &CollectionSummary) -> serde_json::Value {
    json!({
        "count": s.count,
        "averagePercentage": s.average_percentage,
        "averagePercentageDisplay": format!("{:.2}", s.average_percentage),
    })
}
