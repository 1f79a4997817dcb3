use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{check_date, db_conn, now_utc, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

/// `suggested_methods` travels as a JSON string array and is stored as
/// serialized JSON text.
fn parse_suggested_methods(req: &Request) -> Result<Option<String>, serde_json::Value> {
    let Some(raw) = req.params.get("suggested_methods") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(items) = raw.as_array() else {
        return Err(err(
            &req.id,
            "bad_params",
            "suggested_methods must be an array of strings",
            None,
        ));
    };
    if items.iter().any(|v| !v.is_string()) {
        return Err(err(
            &req.id,
            "bad_params",
            "suggested_methods must be an array of strings",
            None,
        ));
    }
    Ok(Some(raw.to_string()))
}

fn methods_to_json(stored: Option<String>) -> serde_json::Value {
    stored
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(serde_json::Value::Null)
}

fn plan_row_json(r: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "student_id": r.get::<_, String>(1)?,
        "class_id": r.get::<_, String>(2)?,
        "teacher_id": r.get::<_, String>(3)?,
        "subject_id": r.get::<_, String>(4)?,
        "title": r.get::<_, String>(5)?,
        "description": r.get::<_, Option<String>>(6)?,
        "suggested_methods": methods_to_json(r.get::<_, Option<String>>(7)?),
        "start_date": r.get::<_, String>(8)?,
        "end_date": r.get::<_, Option<String>>(9)?,
        "status": r.get::<_, String>(10)?,
        "created_at": r.get::<_, String>(11)?,
    }))
}

const PLAN_COLUMNS: &str = "id, student_id, class_id, teacher_id, subject_id, title, description,
    suggested_methods, start_date, end_date, status, created_at";

fn handle_remedial_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let student_id = match required_str(req, "student_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "class_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacher_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subject_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let start_date = match required_str(req, "start_date") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = check_date(req, "start_date", &start_date) {
        return e;
    }
    let end_date = optional_str(req, "end_date");
    if let Some(d) = end_date.as_deref() {
        if let Err(e) = check_date(req, "end_date", d) {
            return e;
        }
    }
    let description = optional_str(req, "description");
    let suggested_methods = match parse_suggested_methods(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let plan_id = Uuid::new_v4().to_string();
    let created_at = now_utc();
    if let Err(e) = conn.execute(
        "INSERT INTO remedial_plans(id, student_id, class_id, teacher_id, subject_id, title,
            description, suggested_methods, start_date, end_date, status, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'Active', ?)",
        (
            &plan_id,
            &student_id,
            &class_id,
            &teacher_id,
            &subject_id,
            &title,
            &description,
            &suggested_methods,
            &start_date,
            &end_date,
            &created_at,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "remedial_plans" })),
        );
    }

    ok(
        &req.id,
        json!({
            "plan": {
                "id": plan_id,
                "student_id": student_id,
                "class_id": class_id,
                "teacher_id": teacher_id,
                "subject_id": subject_id,
                "title": title,
                "description": description,
                "suggested_methods": methods_to_json(suggested_methods),
                "start_date": start_date,
                "end_date": end_date,
                "status": "Active",
                "created_at": created_at,
            }
        }),
    )
}

fn handle_remedial_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let student_id = optional_str(req, "student_id");
    let class_id = optional_str(req, "class_id");

    let base = format!("SELECT {} FROM remedial_plans", PLAN_COLUMNS);
    let rows = match (student_id, class_id) {
        (Some(sid), Some(cid)) => conn
            .prepare(&format!(
                "{} WHERE student_id = ? AND class_id = ? ORDER BY created_at, id",
                base
            ))
            .and_then(|mut stmt| {
                stmt.query_map((&sid, &cid), |r| plan_row_json(r))
                    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            }),
        (Some(sid), None) => conn
            .prepare(&format!(
                "{} WHERE student_id = ? ORDER BY created_at, id",
                base
            ))
            .and_then(|mut stmt| {
                stmt.query_map([&sid], |r| plan_row_json(r))
                    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            }),
        (None, Some(cid)) => conn
            .prepare(&format!(
                "{} WHERE class_id = ? ORDER BY created_at, id",
                base
            ))
            .and_then(|mut stmt| {
                stmt.query_map([&cid], |r| plan_row_json(r))
                    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            }),
        (None, None) => conn
            .prepare(&format!("{} ORDER BY created_at, id", base))
            .and_then(|mut stmt| {
                stmt.query_map([], |r| plan_row_json(r))
                    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            }),
    };

    match rows {
        Ok(plans) => ok(&req.id, json!({ "plans": plans })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_progress_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let plan_id = match required_str(req, "plan_id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM remedial_plans WHERE id = ?", [&plan_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "remedial plan not found", None);
    }

    let progress_percentage = match req.params.get("progress_percentage") {
        None | Some(serde_json::Value::Null) => 0.0,
        Some(v) => match v.as_f64() {
            Some(p) if (0.0..=100.0).contains(&p) => p,
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    "progress_percentage must be a number in [0,100]",
                    None,
                )
            }
        },
    };
    let assessment_score = match req.params.get("assessment_score") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_f64() {
            Some(s) => Some(s),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "assessment_score must be a number",
                    None,
                )
            }
        },
    };
    let notes = optional_str(req, "notes");
    let completion_status =
        optional_str(req, "completion_status").unwrap_or_else(|| "In Progress".to_string());
    let recorded_by = optional_str(req, "recorded_by");

    let progress_id = Uuid::new_v4().to_string();
    let recorded_at = now_utc();
    if let Err(e) = conn.execute(
        "INSERT INTO remedial_plan_progress(id, remedial_plan_id, progress_percentage, notes,
            assessment_score, completion_status, recorded_by, recorded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &progress_id,
            &plan_id,
            &progress_percentage,
            &notes,
            &assessment_score,
            &completion_status,
            &recorded_by,
            &recorded_at,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "remedial_plan_progress" })),
        );
    }

    ok(
        &req.id,
        json!({
            "progress": {
                "id": progress_id,
                "remedial_plan_id": plan_id,
                "progress_percentage": progress_percentage,
                "notes": notes,
                "assessment_score": assessment_score,
                "completion_status": completion_status,
                "recorded_by": recorded_by,
                "recorded_at": recorded_at,
            }
        }),
    )
}

fn handle_progress_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let plan_id = match required_str(req, "plan_id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = conn
        .prepare(
            "SELECT id, remedial_plan_id, progress_percentage, notes, assessment_score,
                completion_status, recorded_by, recorded_at
             FROM remedial_plan_progress
             WHERE remedial_plan_id = ?
             ORDER BY recorded_at, id",
        )
        .and_then(|mut stmt| {
            stmt.query_map([&plan_id], |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "remedial_plan_id": r.get::<_, String>(1)?,
                    "progress_percentage": r.get::<_, f64>(2)?,
                    "notes": r.get::<_, Option<String>>(3)?,
                    "assessment_score": r.get::<_, Option<f64>>(4)?,
                    "completion_status": r.get::<_, String>(5)?,
                    "recorded_by": r.get::<_, Option<String>>(6)?,
                    "recorded_at": r.get::<_, String>(7)?,
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });

    match rows {
        Ok(progress) => ok(&req.id, json!({ "progress": progress })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "remedial.create" => Some(handle_remedial_create(state, req)),
        "remedial.list" => Some(handle_remedial_list(state, req)),
        "remedial.progress.record" => Some(handle_progress_record(state, req)),
        "remedial.progress.list" => Some(handle_progress_list(state, req)),
        _ => None,
    }
}
