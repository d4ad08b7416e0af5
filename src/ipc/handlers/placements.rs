use crate::error::PlacementError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::manager::{FormField, PlacementManager};
use crate::rules;
use rusqlite::Connection;
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }
}

impl From<PlacementError> for HandlerErr {
    fn from(e: PlacementError) -> Self {
        let details = match &e {
            PlacementError::Validation(f) => Some(json!({ "field": f.field })),
            _ => None,
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn get_optional_u32(params: &serde_json::Value, key: &str) -> Result<Option<u32>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a positive integer", key))),
    }
}

fn require_db(db: &Option<Connection>) -> Result<&Connection, HandlerErr> {
    db.as_ref().ok_or_else(|| HandlerErr {
        code: "no_workspace",
        message: "select a workspace first".to_string(),
        details: None,
    })
}

/// Session snapshot plus the flash produced by the operation that just ran.
fn session_reply(session: &mut PlacementManager) -> serde_json::Value {
    let flash = session.take_flash();
    json!({
        "session": session,
        "flash": flash,
    })
}

fn placements_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let search = match params.get("search") {
        None => None,
        Some(serde_json::Value::Null) => Some(String::new()),
        Some(v) => Some(
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| HandlerErr::bad_params("search must be a string"))?,
        ),
    };
    let page = get_optional_u32(params, "page")?;
    let per_page = get_optional_u32(params, "perPage")?;

    let conn = require_db(&state.db)?;
    let listing = state
        .session
        .list_placements(conn, search, page, per_page)?;
    let min_start = state.session.min_start_date(state.clock.today());

    let mut result = serde_json::to_value(&listing).map_err(|e| HandlerErr {
        code: "serialize_failed",
        message: e.to_string(),
        details: None,
    })?;
    result["minStartDate"] = json!(rules::format_date(min_start));
    result["flash"] = json!(state.session.take_flash());
    Ok(result)
}

fn form_edit(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let placement_id = get_required_str(params, "placementId")?;
    let conn = require_db(&state.db)?;
    state.session.open_edit_form(conn, &placement_id)?;
    Ok(session_reply(&mut state.session))
}

/// Two-way form binding: any subset of the form keys may be sent; `null`
/// clears a field.
fn form_set(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let mut updates = Vec::new();
    for field in FormField::ALL {
        let value = match params.get(field.key()) {
            None => continue,
            Some(serde_json::Value::Null) => String::new(),
            Some(v) => v
                .as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a string", field.key())))?,
        };
        updates.push((field, value));
    }
    if updates.is_empty() {
        return Err(HandlerErr::bad_params(
            "expected at least one of studentId, companyId, teacherId, start, end",
        ));
    }

    for (field, value) in updates {
        state.session.set_field(field, value);
    }
    Ok(session_reply(&mut state.session))
}

fn form_start_changed(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let start = match params.get("start") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(v) => v
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| HandlerErr::bad_params("start must be a string"))?,
    };
    state.session.on_start_date_changed(start);
    Ok(session_reply(&mut state.session))
}

fn placements_submit(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    let today = state.clock.today();
    state.session.submit(conn, today)?;
    Ok(session_reply(&mut state.session))
}

fn delete_request(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let placement_id = get_required_str(params, "placementId")?;
    state.session.request_delete(placement_id);
    Ok(session_reply(&mut state.session))
}

fn delete_confirm(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(&state.db)?;
    state.session.confirm_delete(conn)?;
    Ok(session_reply(&mut state.session))
}

fn respond(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let params = &req.params;
    let resp = match req.method.as_str() {
        "placements.list" => respond(req, placements_list(state, params)),
        "placements.form.open" => {
            state.session.open_create_form();
            ok(&req.id, session_reply(&mut state.session))
        }
        "placements.form.edit" => respond(req, form_edit(state, params)),
        "placements.form.close" => {
            state.session.close_form();
            ok(&req.id, session_reply(&mut state.session))
        }
        "placements.form.set" => respond(req, form_set(state, params)),
        "placements.form.startChanged" => respond(req, form_start_changed(state, params)),
        "placements.form.get" => ok(&req.id, session_reply(&mut state.session)),
        "placements.submit" => respond(req, placements_submit(state)),
        "placements.delete.request" => respond(req, delete_request(state, params)),
        "placements.delete.confirm" => respond(req, delete_confirm(state)),
        "placements.minStartDate" => {
            let d = state.session.min_start_date(state.clock.today());
            ok(&req.id, json!({ "minStartDate": rules::format_date(d) }))
        }
        _ => return None,
    };
    Some(resp)
}
