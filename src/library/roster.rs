use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::model::{timestamp, Student};
use super::{immediate, LibraryError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub student_no: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub class_name: Option<String>,
}

pub fn create_student(conn: &Connection, new: NewStudent, now: DateTime<Utc>) -> Result<Student> {
    let student_no = new.student_no.trim().to_string();
    let first_name = new.first_name.trim().to_string();
    let last_name = new.last_name.trim().to_string();
    if student_no.is_empty() || first_name.is_empty() || last_name.is_empty() {
        return Err(LibraryError::Invalid(
            "studentNo, firstName and lastName are required".to_string(),
        ));
    }

    let tx = immediate(conn)?;
    let taken: Option<String> = tx
        .query_row(
            "SELECT id FROM students WHERE student_no = ?",
            [&student_no],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(LibraryError::Invalid(format!(
            "student number already in use: {}",
            student_no
        )));
    }

    let student = Student {
        id: Uuid::new_v4().to_string(),
        student_no,
        first_name,
        last_name,
        class_name: new
            .class_name
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        is_active: true,
        created_at: timestamp(now),
    };
    tx.execute(
        "INSERT INTO students(id, student_no, first_name, last_name, class_name, is_active, created_at)
         VALUES(?, ?, ?, ?, ?, 1, ?)",
        params![
            student.id,
            student.student_no,
            student.first_name,
            student.last_name,
            student.class_name,
            student.created_at
        ],
    )?;
    tx.commit()?;
    info!(student_id = %student.id, "student registered");
    Ok(student)
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Student> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", Student::COLUMNS);
    conn.query_row(&sql, [student_id], Student::from_row)
        .optional()?
        .ok_or_else(|| LibraryError::not_found("student", student_id))
}

pub fn list_students(conn: &Connection, include_inactive: bool) -> Result<Vec<Student>> {
    let sql = format!(
        "SELECT {} FROM students
         WHERE ?1 OR is_active = 1
         ORDER BY last_name COLLATE NOCASE, first_name COLLATE NOCASE, student_no",
        Student::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map([include_inactive], Student::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(students)
}

/// Inactive students keep their history but cannot open new requests.
pub fn set_active(conn: &Connection, student_id: &str, active: bool) -> Result<Student> {
    let changed = conn.execute(
        "UPDATE students SET is_active = ? WHERE id = ?",
        params![active, student_id],
    )?;
    if changed == 0 {
        return Err(LibraryError::not_found("student", student_id));
    }
    info!(student_id, active, "student activity changed");
    get_student(conn, student_id)
}
