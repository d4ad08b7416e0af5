use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn required_text(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    let v = match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    };
    if v.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            format!("{key} must not be empty"),
            None,
        ));
    }
    Ok(v)
}

fn insert_failed(req: &Request, table: &str, e: rusqlite::Error) -> serde_json::Value {
    let code = if db::is_unique_violation(&e) {
        "conflict"
    } else {
        "db_insert_failed"
    };
    err(&req.id, code, e.to_string(), Some(json!({ "table": table })))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match required_text(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let email = match required_text(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::student_insert(conn, &name, &email) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => insert_failed(req, "students", e),
    }
}

fn handle_companies_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match required_text(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::company_insert(conn, &name) {
        Ok(company) => ok(&req.id, json!({ "company": company })),
        Err(e) => insert_failed(req, "companies", e),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match required_text(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::teacher_insert(conn, &name) {
        Ok(teacher) => ok(&req.id, json!({ "teacher": teacher })),
        Err(e) => insert_failed(req, "teachers", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "companies.create" => Some(handle_companies_create(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        _ => None,
    }
}
