use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{param_str, require_store};
use crate::ipc::types::{AppState, Request};
use crate::store::StudentStore;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "studentFile": state.store.as_ref().map(|s| s.path().to_string_lossy().to_string()),
            "dirty": state.store.as_ref().map(|s| s.is_dirty()).unwrap_or(false),
        }),
    )
}

fn param_force(req: &Request) -> bool {
    req.params
        .get("force")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn handle_store_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = param_str(req, "path").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let create_if_missing = req
        .params
        .get("createIfMissing")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if let Some(current) = state.store.as_ref() {
        if let Err(e) = current.ensure_saved(param_force(req)) {
            return store_err(&req.id, &e);
        }
    }

    let opened = if create_if_missing {
        StudentStore::open_or_empty(&path)
    } else {
        StudentStore::open(&path)
    };

    // A failed open keeps whatever store was already open.
    match opened {
        Ok(store) => {
            let count = store.len();
            state.store = Some(store);
            ok(
                &req.id,
                json!({ "studentFile": path.to_string_lossy(), "count": count }),
            )
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_store_reload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.reload(param_force(req)) {
        Ok(count) => ok(&req.id, json!({ "count": count })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_store_flush(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match require_store(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match store.flush() {
        Ok(()) => ok(&req.id, json!({ "count": store.len() })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "store.open" => Some(handle_store_open(state, req)),
        "store.reload" => Some(handle_store_reload(state, req)),
        "store.flush" => Some(handle_store_flush(state, req)),
        _ => None,
    }
}
