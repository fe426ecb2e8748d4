use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_libraryd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn libraryd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn result_str(value: &serde_json::Value, path: &[&str]) -> String {
    let mut cur = value.get("result");
    for key in path {
        cur = cur.and_then(|v| v.get(key));
    }
    cur.and_then(|v| v.as_str()).unwrap_or("").to_string()
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("libraryd-router-smoke");
    let bundle_out = workspace.join("smoke-backup.zip");
    let admin = json!({ "role": "admin", "adminId": "smoke-admin" });

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "settings.get",
        json!({ "actor": admin }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "settings.update",
        json!({ "actor": admin, "loanPeriodDays": 21 }),
    );

    let created_book = request(
        &mut stdin,
        &mut reader,
        "5",
        "books.create",
        json!({
            "actor": admin,
            "book": { "title": "Smoke Book", "author": "Smoke", "subject": "Misc", "totalCopies": 2 }
        }),
    );
    let book_id = result_str(&created_book, &["book", "id"]);
    assert!(!book_id.is_empty(), "books.create: {}", created_book);
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "books.list",
        json!({ "actor": admin }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "books.get",
        json!({ "actor": admin, "bookId": book_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "books.subjects",
        json!({ "actor": admin }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "books.update",
        json!({ "actor": admin, "bookId": book_id, "patch": { "totalCopies": 3 } }),
    );

    let created_student = request(
        &mut stdin,
        &mut reader,
        "10",
        "students.create",
        json!({
            "actor": admin,
            "student": { "studentNo": "SMOKE-1", "firstName": "Smoke", "lastName": "Student" }
        }),
    );
    let student_id = result_str(&created_student, &["student", "id"]);
    assert!(!student_id.is_empty(), "students.create: {}", created_student);
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "students.list",
        json!({ "actor": admin }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "students.setActive",
        json!({ "actor": admin, "studentId": student_id, "active": true }),
    );

    let student = json!({ "role": "student", "studentId": student_id });
    let borrowed = request(
        &mut stdin,
        &mut reader,
        "13",
        "borrow.request",
        json!({ "actor": student, "bookId": book_id }),
    );
    let request_id = result_str(&borrowed, &["request", "id"]);
    assert!(!request_id.is_empty(), "borrow.request: {}", borrowed);
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "borrow.mine",
        json!({ "actor": student }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "borrow.list",
        json!({ "actor": admin, "status": "pending" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "borrow.approve",
        json!({ "actor": admin, "requestId": request_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "17",
        "borrow.reject",
        json!({ "actor": admin, "requestId": request_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "18",
        "borrow.complete",
        json!({ "actor": admin, "requestId": request_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "19",
        "library.audit",
        json!({ "actor": admin }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "backup.exportWorkspaceBundle",
        json!({ "actor": admin, "outPath": bundle_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "21",
        "backup.importWorkspaceBundle",
        json!({ "actor": admin, "inPath": bundle_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "22",
        "books.delete",
        json!({ "actor": admin, "bookId": book_id }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
