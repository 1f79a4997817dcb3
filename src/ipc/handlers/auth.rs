use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, now_utc, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

fn password_hash(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

fn user_json(
    id: String,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    phone: Option<String>,
    created_at: String,
) -> serde_json::Value {
    json!({
        "id": id,
        "email": email,
        "first_name": first_name,
        "last_name": last_name,
        "role": role,
        "phone": phone,
        "created_at": created_at,
    })
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let email = match required_str(req, "email") {
        Ok(v) => v.to_ascii_lowercase(),
        Err(e) => return e,
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing password", None),
    };
    let first_name = match required_str(req, "first_name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match required_str(req, "last_name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role = optional_str(req, "role").unwrap_or_else(|| "teacher".to_string());
    let phone = optional_str(req, "phone");

    let taken: Option<i64> = match conn
        .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if taken.is_some() {
        return err(
            &req.id,
            "email_taken",
            "a user with this email already exists",
            None,
        );
    }

    let user_id = Uuid::new_v4().to_string();
    let created_at = now_utc();
    if let Err(e) = conn.execute(
        "INSERT INTO users(id, email, password_hash, first_name, last_name, role, phone, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &user_id,
            &email,
            &password_hash(&password),
            &first_name,
            &last_name,
            &role,
            &phone,
            &created_at,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }

    ok(
        &req.id,
        json!({ "user": user_json(user_id, email, first_name, last_name, role, phone, created_at) }),
    )
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let email = match required_str(req, "email") {
        Ok(v) => v.to_ascii_lowercase(),
        Err(e) => return e,
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => return err(&req.id, "bad_params", "missing password", None),
    };

    type UserRow = (String, String, String, String, String, Option<String>, String);
    let row: Option<UserRow> = match conn
        .query_row(
            "SELECT id, password_hash, first_name, last_name, role, phone, created_at
             FROM users WHERE email = ?",
            [&email],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            },
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // One message for both misses so the reply doesn't leak which one it was.
    let Some((id, hash, first_name, last_name, role, phone, created_at)) = row else {
        return err(&req.id, "invalid_credentials", "invalid email or password", None);
    };
    if hash != password_hash(&password) {
        return err(&req.id, "invalid_credentials", "invalid email or password", None);
    }

    ok(
        &req.id,
        json!({ "user": user_json(id, email, first_name, last_name, role, phone, created_at) }),
    )
}

fn handle_user_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };

    let user_id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row = match conn
        .query_row(
            "SELECT id, email, first_name, last_name, role, phone, created_at
             FROM users WHERE id = ?",
            [&user_id],
            |r| {
                Ok(user_json(
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            },
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    match row {
        Some(user) => ok(&req.id, json!({ "user": user })),
        None => err(&req.id, "not_found", "user not found", None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(handle_register(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.user.get" => Some(handle_user_get(state, req)),
        _ => None,
    }
}
