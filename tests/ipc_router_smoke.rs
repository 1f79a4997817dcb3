mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn health_reports_version_and_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let before = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(before.get("version").and_then(|v| v.as_str()).is_some());
    assert!(before
        .get("workspace_path")
        .map(|v| v.is_null())
        .unwrap_or(false));

    let workspace = temp_dir("mentor-smoke");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let after = request_ok(&mut stdin, &mut reader, "3", "health", json!({}));
    assert_eq!(
        after.get("workspace_path").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );
}

#[test]
fn unknown_method_is_not_implemented() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let error = request_err(&mut stdin, &mut reader, "1", "nope.nothing", json!({}));
    assert_eq!(error_code(&error), "not_implemented");
}

#[test]
fn data_methods_require_a_workspace() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let error = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "analytics.class",
        json!({ "class_id": "c1" }),
    );
    assert_eq!(error_code(&error), "no_workspace");
}
