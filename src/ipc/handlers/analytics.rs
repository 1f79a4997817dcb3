use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::stats;
use rusqlite::Connection;

fn load_class_marks(conn: &Connection, class_id: &str) -> rusqlite::Result<Vec<stats::MarkRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, subject_id, percentage
         FROM student_marks
         WHERE class_id = ?
         ORDER BY rowid",
    )?;
    stmt.query_map([class_id], |r| {
        Ok(stats::MarkRecord {
            student_id: r.get(0)?,
            subject_id: r.get(1)?,
            percentage: r.get(2)?,
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
}

fn handle_analytics_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let class_id = match required_str(req, "class_id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // A class with no marks is a valid zero summary; only a failed read
    // is an error.
    let marks = match load_class_marks(conn, &class_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let summary = stats::class_analytics(&marks);
    match serde_json::to_value(&summary) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.class" => Some(handle_analytics_class(state, req)),
        _ => None,
    }
}
