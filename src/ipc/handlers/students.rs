use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{
    optional_mark, optional_text, param_str, parse_mark, require_store, resolve_index,
    student_json, summary_json,
};
use crate::ipc::types::{AppState, Request};
use crate::record::{StudentInput, StudentPatch};
use crate::store::SortDirection;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let students: Vec<serde_json::Value> = store
        .list()
        .iter()
        .enumerate()
        .map(|(i, r)| student_json(i, r))
        .collect();
    let mut result = summary_json(&store.summary());
    result["students"] = json!(students);
    ok(&req.id, result)
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let index = match resolve_index(store, req) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match store.get(index) {
        Ok(r) => ok(&req.id, json!({ "student": student_json(index, r) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let code = param_str(req, "code").unwrap_or("").to_string();
    let name = param_str(req, "name").unwrap_or("").to_string();
    let mut marks = [0i64; 4];
    for (slot, key) in marks.iter_mut().zip(["c1", "c2", "c3", "exam"]) {
        let Some(v) = req.params.get(key) else {
            return err(&req.id, "bad_params", format!("missing {key}"), None);
        };
        match parse_mark(v, key) {
            Ok(m) => *slot = m,
            Err(msg) => {
                return err(&req.id, "bad_params", msg, Some(json!({ "field": key })))
            }
        }
    }

    let candidate = StudentInput {
        code,
        name,
        c1: marks[0],
        c2: marks[1],
        c3: marks[2],
        exam: marks[3],
    };
    match store.add(candidate) {
        Ok(r) => ok(
            &req.id,
            json!({ "student": student_json(store.len() - 1, &r), "index": store.len() - 1 }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn parse_patch(req: &Request) -> Result<StudentPatch, serde_json::Value> {
    let Some(obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(err(&req.id, "bad_params", "missing/invalid patch", None));
    };
    let bad = |msg: String| err(&req.id, "bad_params", msg, None);
    let patch = StudentPatch {
        code: optional_text(obj, "code").map_err(bad)?,
        name: optional_text(obj, "name").map_err(bad)?,
        c1: optional_mark(obj, "c1").map_err(bad)?,
        c2: optional_mark(obj, "c2").map_err(bad)?,
        c3: optional_mark(obj, "c3").map_err(bad)?,
        exam: optional_mark(obj, "exam").map_err(bad)?,
    };
    if patch.is_empty() {
        return Err(err(&req.id, "bad_params", "patch has no fields", None));
    }
    Ok(patch)
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let index = match resolve_index(store, req) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    let patch = match parse_patch(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match store.update(index, &patch) {
        Ok(r) => ok(
            &req.id,
            json!({ "student": student_json(index, &r), "index": index }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let index = match resolve_index(store, req) {
        Ok(i) => i,
        Err(resp) => return resp,
    };
    match store.delete(index) {
        Ok(r) => ok(
            &req.id,
            json!({ "student": student_json(index, &r), "count": store.len() }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_find(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(query) = param_str(req, "query") else {
        return err(&req.id, "bad_params", "missing query", None);
    };
    match store.find_by_text(query) {
        Ok((i, r)) => ok(&req.id, json!({ "student": student_json(i, r), "index": i })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_extreme(state: &mut AppState, req: &Request, highest: bool) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let found = if highest {
        store.highest()
    } else {
        store.lowest()
    };
    match found {
        Ok((i, r)) => ok(&req.id, json!({ "student": student_json(i, r), "index": i })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_sort(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(direction) = param_str(req, "direction").and_then(SortDirection::parse) else {
        return err(
            &req.id,
            "bad_params",
            "direction must be asc or desc",
            None,
        );
    };

    let students: Vec<serde_json::Value> = store
        .sorted_by_percentage(direction)
        .into_iter()
        .map(|(i, r)| student_json(i, r))
        .collect();

    let mut result = summary_json(&store.summary());
    result["students"] = json!(students);
    result["direction"] = json!(direction);
    ok(&req.id, result)
}

fn handle_students_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    match require_store(state, req) {
        Ok(store) => ok(&req.id, summary_json(&store.summary())),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.find" => Some(handle_students_find(state, req)),
        "students.highest" => Some(handle_students_extreme(state, req, true)),
        "students.lowest" => Some(handle_students_extreme(state, req, false)),
        "students.sort" => Some(handle_students_sort(state, req)),
        "students.summary" => Some(handle_students_summary(state, req)),
        _ => None,
    }
}
