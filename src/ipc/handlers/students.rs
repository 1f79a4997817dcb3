use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_utc, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let class_id = match required_str(req, "class_id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = conn
        .prepare(
            "SELECT id, class_id, name, roll_number, email, created_at
             FROM students WHERE class_id = ? ORDER BY roll_number",
        )
        .and_then(|mut stmt| {
            stmt.query_map([&class_id], |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "class_id": r.get::<_, String>(1)?,
                    "name": r.get::<_, String>(2)?,
                    "roll_number": r.get::<_, String>(3)?,
                    "email": r.get::<_, Option<String>>(4)?,
                    "created_at": r.get::<_, String>(5)?,
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let roll_number = match required_str(req, "roll_number") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "class_id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = optional_str(req, "email");

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [&class_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }

    let dup: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM students WHERE class_id = ? AND roll_number = ?",
            (&class_id, &roll_number),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if dup.is_some() {
        return err(
            &req.id,
            "duplicate_roll_number",
            "roll number already used in this class",
            Some(json!({ "roll_number": roll_number })),
        );
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let student_id = Uuid::new_v4().to_string();
    let created_at = now_utc();
    if let Err(e) = tx.execute(
        "INSERT INTO students(id, class_id, name, roll_number, email, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&student_id, &class_id, &name, &roll_number, &email, &created_at),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    // Keep the denormalized roster count on the class in step with the row.
    if let Err(e) = tx.execute(
        "UPDATE classes SET total_students = total_students + 1 WHERE id = ?",
        [&class_id],
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "student": {
                "id": student_id,
                "class_id": class_id,
                "name": name,
                "roll_number": roll_number,
                "email": email,
                "created_at": created_at,
            }
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        _ => None,
    }
}
