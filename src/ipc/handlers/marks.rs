use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{check_date, db_conn, now_utc, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct MarkUploadEntry {
    student_id: String,
    subject_id: String,
    #[serde(default)]
    marks_obtained: Option<f64>,
    #[serde(default)]
    total_marks: Option<f64>,
    #[serde(default)]
    percentage: Option<f64>,
    #[serde(default)]
    assessment_date: Option<String>,
    #[serde(default)]
    assessment_type: Option<String>,
}

/// An explicit percentage wins; otherwise derive it from the raw score.
/// Anything underivable stays NULL and the analytics coercion policy
/// decides what it means.
fn resolve_percentage(entry: &MarkUploadEntry) -> Option<f64> {
    if let Some(p) = entry.percentage {
        return p.is_finite().then_some(p);
    }
    match (entry.marks_obtained, entry.total_marks) {
        (Some(obtained), Some(total)) if total > 0.0 => {
            let p = 100.0 * obtained / total;
            p.is_finite().then_some(p)
        }
        _ => None,
    }
}

fn mark_row_json(r: &rusqlite::Row) -> rusqlite::Result<serde_json::Value> {
    Ok(json!({
        "id": r.get::<_, String>(0)?,
        "student_id": r.get::<_, String>(1)?,
        "subject_id": r.get::<_, String>(2)?,
        "class_id": r.get::<_, String>(3)?,
        "marks_obtained": r.get::<_, Option<f64>>(4)?,
        "total_marks": r.get::<_, Option<f64>>(5)?,
        "percentage": r.get::<_, Option<f64>>(6)?,
        "assessment_date": r.get::<_, Option<String>>(7)?,
        "assessment_type": r.get::<_, String>(8)?,
        "teacher_id": r.get::<_, String>(9)?,
        "created_at": r.get::<_, String>(10)?,
    }))
}

const MARK_COLUMNS: &str = "id, student_id, subject_id, class_id, marks_obtained, total_marks,
    percentage, assessment_date, assessment_type, teacher_id, created_at";

fn handle_marks_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
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
    let Some(raw_marks) = req.params.get("marks").filter(|v| v.is_array()) else {
        return err(&req.id, "bad_params", "marks must be an array", None);
    };
    let entries: Vec<MarkUploadEntry> = match serde_json::from_value(raw_marks.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid marks payload: {}", e),
                None,
            )
        }
    };
    if entries.is_empty() {
        return err(&req.id, "bad_params", "marks must not be empty", None);
    }

    for (i, entry) in entries.iter().enumerate() {
        if entry.student_id.trim().is_empty() || entry.subject_id.trim().is_empty() {
            return err(
                &req.id,
                "bad_params",
                "each mark needs student_id and subject_id",
                Some(json!({ "index": i })),
            );
        }
        if let Some(date) = entry.assessment_date.as_deref() {
            if let Err(e) = check_date(req, "assessment_date", date) {
                return e;
            }
        }
    }

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

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let created_at = now_utc();
    let mut inserted = Vec::with_capacity(entries.len());
    for entry in &entries {
        let mark_id = Uuid::new_v4().to_string();
        let percentage = resolve_percentage(entry);
        let assessment_type = entry
            .assessment_type
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Test".to_string());
        if let Err(e) = tx.execute(
            "INSERT INTO student_marks(id, student_id, subject_id, class_id, marks_obtained,
                total_marks, percentage, assessment_date, assessment_type, teacher_id, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &mark_id,
                &entry.student_id,
                &entry.subject_id,
                &class_id,
                &entry.marks_obtained,
                &entry.total_marks,
                &percentage,
                &entry.assessment_date,
                &assessment_type,
                &teacher_id,
                &created_at,
            ),
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "student_marks" })),
            );
        }
        inserted.push(json!({
            "id": mark_id,
            "student_id": entry.student_id,
            "subject_id": entry.subject_id,
            "class_id": class_id,
            "marks_obtained": entry.marks_obtained,
            "total_marks": entry.total_marks,
            "percentage": percentage,
            "assessment_date": entry.assessment_date,
            "assessment_type": assessment_type,
            "teacher_id": teacher_id,
            "created_at": created_at,
        }));
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({ "count": inserted.len(), "marks": inserted }),
    )
}

fn handle_marks_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let student_id = match required_str(req, "student_id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let sql = format!(
        "SELECT {} FROM student_marks WHERE student_id = ? ORDER BY rowid",
        MARK_COLUMNS
    );
    let rows = conn.prepare(&sql).and_then(|mut stmt| {
        stmt.query_map([&student_id], |r| mark_row_json(r))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    });

    match rows {
        Ok(marks) => ok(&req.id, json!({ "marks": marks })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let rows = conn
        .prepare("SELECT id, name FROM subjects ORDER BY name")
        .and_then(|mut stmt| {
            stmt.query_map([], |r| {
                Ok(json!({
                    "id": r.get::<_, String>(0)?,
                    "name": r.get::<_, String>(1)?,
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });

    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let existing: Option<String> = match conn
        .query_row("SELECT id FROM subjects WHERE name = ?", [&name], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if existing.is_some() {
        return err(
            &req.id,
            "subject_exists",
            "a subject with this name already exists",
            Some(json!({ "name": name })),
        );
    }

    let subject_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, name) VALUES(?, ?)",
        (&subject_id, &name),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    ok(
        &req.id,
        json!({ "subject": { "id": subject_id, "name": name } }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.upload" => Some(handle_marks_upload(state, req)),
        "marks.student" => Some(handle_marks_student(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        _ => None,
    }
}
