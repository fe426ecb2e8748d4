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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn roles_are_checked_before_any_work() {
    let workspace = temp_dir("libraryd-access");
    let admin = json!({ "role": "admin", "adminId": "a-1" });
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let before = request(
        &mut stdin,
        &mut reader,
        "0",
        "books.list",
        json!({ "actor": admin }),
    );
    assert_eq!(code(&before), Some("no_workspace"));

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let anonymous = request(&mut stdin, &mut reader, "2", "books.list", json!({}));
    assert_eq!(code(&anonymous), Some("unauthenticated"));

    let unknown_role = request(
        &mut stdin,
        &mut reader,
        "3",
        "books.list",
        json!({ "actor": { "role": "parent", "parentId": "p" } }),
    );
    assert_eq!(code(&unknown_role), Some("unauthenticated"));

    let student = json!({ "role": "student", "studentId": "s-1" });
    for (i, method) in [
        "books.create",
        "books.delete",
        "students.list",
        "borrow.approve",
        "borrow.list",
        "library.audit",
        "settings.update",
        "backup.exportWorkspaceBundle",
    ]
    .iter()
    .enumerate()
    {
        let res = request(
            &mut stdin,
            &mut reader,
            &format!("s-{}", i),
            method,
            json!({ "actor": student }),
        );
        assert_eq!(code(&res), Some("forbidden"), "{} as student", method);
        assert_eq!(res["error"]["details"]["role"].as_str(), Some("student"));
    }

    for (i, method) in ["borrow.request", "borrow.mine"].iter().enumerate() {
        let res = request(
            &mut stdin,
            &mut reader,
            &format!("a-{}", i),
            method,
            json!({ "actor": admin }),
        );
        assert_eq!(code(&res), Some("forbidden"), "{} as admin", method);
    }

    let unknown_student = request(
        &mut stdin,
        &mut reader,
        "4",
        "borrow.mine",
        json!({ "actor": student }),
    );
    assert_eq!(code(&unknown_student), Some("not_found"));

    let s = request(
        &mut stdin,
        &mut reader,
        "5",
        "students.create",
        json!({ "actor": admin, "student": { "studentNo": "X-1", "firstName": "F", "lastName": "L" } }),
    );
    let student_id = s["result"]["student"]["id"].as_str().expect("id").to_string();
    let book = request(
        &mut stdin,
        &mut reader,
        "6",
        "books.create",
        json!({ "actor": admin, "book": { "title": "T", "author": "A", "totalCopies": 1 } }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.setActive",
        json!({ "actor": admin, "studentId": student_id, "active": false }),
    );
    let inactive = request(
        &mut stdin,
        &mut reader,
        "8",
        "borrow.request",
        json!({
            "actor": { "role": "student", "studentId": student_id },
            "bookId": book["result"]["book"]["id"]
        }),
    );
    assert_eq!(code(&inactive), Some("student_inactive"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
