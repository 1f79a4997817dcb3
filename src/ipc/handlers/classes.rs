use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_utc, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn class_row_json(r: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "name": r.get::<_, String>(1)?,
        "teacher_id": r.get::<_, String>(2)?,
        "section": r.get::<_, String>(3)?,
        "grade_level": r.get::<_, String>(4)?,
        "total_students": r.get::<_, i64>(5)?,
        "created_at": r.get::<_, String>(6)?,
    }))
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    let teacher_id = optional_str(req, "teacher_id");

    // One statement per shape; rusqlite params make an optional filter awkward otherwise.
    let rows = if let Some(tid) = teacher_id {
        conn.prepare(
            "SELECT id, name, teacher_id, section, grade_level, total_students, created_at
             FROM classes WHERE teacher_id = ? ORDER BY name",
        )
        .and_then(|mut stmt| {
            stmt.query_map([&tid], |r| class_row_json(r))
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        })
    } else {
        conn.prepare(
            "SELECT id, name, teacher_id, section, grade_level, total_students, created_at
             FROM classes ORDER BY name",
        )
        .and_then(|mut stmt| {
            stmt.query_map([], |r| class_row_json(r))
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        })
    };

    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let class_id = match required_str(req, "class_id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row = match conn
        .query_row(
            "SELECT id, name, teacher_id, section, grade_level, total_students, created_at
             FROM classes WHERE id = ?",
            [&class_id],
            |r| class_row_json(r),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match row {
        Some(class) => ok(&req.id, json!({ "class": class })),
        None => err(&req.id, "not_found", "class not found", None),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacher_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section = match required_str(req, "section") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade_level = match required_str(req, "grade_level") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let class_id = Uuid::new_v4().to_string();
    let created_at = now_utc();
    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, name, teacher_id, section, grade_level, total_students, created_at)
         VALUES(?, ?, ?, ?, ?, 0, ?)",
        (&class_id, &name, &teacher_id, &section, &grade_level, &created_at),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    ok(
        &req.id,
        json!({
            "class": {
                "id": class_id,
                "name": name,
                "teacher_id": teacher_id,
                "section": section,
                "grade_level": grade_level,
                "total_students": 0,
                "created_at": created_at,
            }
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        _ => None,
    }
}
