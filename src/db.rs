use crate::model::{Company, Placement, PlacementPage, PlacementRow, Student, Teacher};
use anyhow::Context;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "pkl.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace directory {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    init_schema(&conn)?;
    Ok(conn)
}

/// `fold_case(text)`: full Unicode lowercase. SQLite's own `lower()` and
/// `LIKE` only fold ASCII letters.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
    )
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    register_functions(conn).context("failed to register SQL functions")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            status_pkl INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS companies(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_companies_name ON companies(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS placements(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            company_id TEXT NOT NULL,
            teacher_id TEXT,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(company_id) REFERENCES companies(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    // One placement per student is a storage rule, not just an app-level check.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_placements_student ON placements(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_placements_company ON placements(company_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_placements_created ON placements(created_at)",
        [],
    )?;

    Ok(())
}

pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn student_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        status_pkl: row.get::<_, i64>(3)? != 0,
    })
}

fn placement_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Placement> {
    Ok(Placement {
        id: row.get(0)?,
        student_id: row.get(1)?,
        company_id: row.get(2)?,
        teacher_id: row.get(3)?,
        start_date: row.get(4)?,
        end_date: row.get(5)?,
    })
}

pub fn student_insert(conn: &Connection, name: &str, email: &str) -> rusqlite::Result<Student> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, email, name, status_pkl, updated_at)
         VALUES(?, ?, ?, 0, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&id, email, name),
    )?;
    Ok(Student {
        id,
        email: email.to_string(),
        name: name.to_string(),
        status_pkl: false,
    })
}

pub fn student_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Student>> {
    conn.query_row(
        "SELECT id, email, name, status_pkl FROM students WHERE email = ?",
        [email],
        student_from_row,
    )
    .optional()
}

pub fn student_get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Student>> {
    conn.query_row(
        "SELECT id, email, name, status_pkl FROM students WHERE id = ?",
        [id],
        student_from_row,
    )
    .optional()
}

/// Returns the number of rows touched (0 when the student does not exist).
pub fn student_set_status(conn: &Connection, id: &str, active: bool) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE students
         SET status_pkl = ?, updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        (active as i64, id),
    )
}

pub fn company_insert(conn: &Connection, name: &str) -> rusqlite::Result<Company> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO companies(id, name, updated_at)
         VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&id, name),
    )?;
    Ok(Company {
        id,
        name: name.to_string(),
    })
}

pub fn companies_all(conn: &Connection) -> rusqlite::Result<Vec<Company>> {
    let mut stmt = conn.prepare("SELECT id, name FROM companies ORDER BY name, id")?;
    let rows = stmt.query_map([], |r| {
        Ok(Company {
            id: r.get(0)?,
            name: r.get(1)?,
        })
    })?;
    rows.collect()
}

pub fn teacher_insert(conn: &Connection, name: &str) -> rusqlite::Result<Teacher> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO teachers(id, name, updated_at)
         VALUES(?, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&id, name),
    )?;
    Ok(Teacher {
        id,
        name: name.to_string(),
    })
}

pub fn teachers_all(conn: &Connection) -> rusqlite::Result<Vec<Teacher>> {
    let mut stmt = conn.prepare("SELECT id, name FROM teachers ORDER BY name, id")?;
    let rows = stmt.query_map([], |r| {
        Ok(Teacher {
            id: r.get(0)?,
            name: r.get(1)?,
        })
    })?;
    rows.collect()
}

pub fn teacher_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM teachers WHERE id = ?", [id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
}

pub fn placement_get(conn: &Connection, id: &str) -> rusqlite::Result<Option<Placement>> {
    conn.query_row(
        "SELECT id, student_id, company_id, teacher_id, start_date, end_date
         FROM placements
         WHERE id = ?",
        [id],
        placement_from_row,
    )
    .optional()
}

pub fn placement_for_student(
    conn: &Connection,
    student_id: &str,
) -> rusqlite::Result<Option<Placement>> {
    conn.query_row(
        "SELECT id, student_id, company_id, teacher_id, start_date, end_date
         FROM placements
         WHERE student_id = ?",
        [student_id],
        placement_from_row,
    )
    .optional()
}

pub struct PlacementFields<'a> {
    pub student_id: &'a str,
    pub company_id: &'a str,
    pub teacher_id: Option<&'a str>,
    pub start_date: &'a str,
    pub end_date: &'a str,
}

pub fn placement_insert(conn: &Connection, f: &PlacementFields<'_>) -> rusqlite::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO placements(
           id,
           student_id,
           company_id,
           teacher_id,
           start_date,
           end_date,
           created_at,
           updated_at
         ) VALUES(?, ?, ?, ?, ?, ?,
           strftime('%Y-%m-%dT%H:%M:%SZ','now'),
           strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        params![
            &id,
            f.student_id,
            f.company_id,
            f.teacher_id,
            f.start_date,
            f.end_date
        ],
    )?;
    Ok(id)
}

pub fn placement_update(
    conn: &Connection,
    id: &str,
    f: &PlacementFields<'_>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE placements
         SET student_id = ?,
             company_id = ?,
             teacher_id = ?,
             start_date = ?,
             end_date = ?,
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        params![
            f.student_id,
            f.company_id,
            f.teacher_id,
            f.start_date,
            f.end_date,
            id
        ],
    )
}

pub fn placement_delete(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM placements WHERE id = ?", [id])
}

/// `LIKE` pattern matching `needle` anywhere, with wildcards in the needle
/// taken literally. The needle is case-folded to match `fold_case` columns.
fn like_contains(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// Newest-first page of placements. A non-blank `search` keeps rows whose
/// student name or company name contains it, ignoring case.
/// `viewer_student_id` drives the per-row `can_edit_delete` flag.
pub fn placements_page(
    conn: &Connection,
    search: Option<&str>,
    page: u32,
    per_page: u32,
    viewer_student_id: Option<&str>,
) -> rusqlite::Result<PlacementPage> {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_contains);

    let total: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM placements p
         JOIN students s ON s.id = p.student_id
         JOIN companies c ON c.id = p.company_id
         WHERE ?1 IS NULL
            OR fold_case(s.name) LIKE ?1 ESCAPE '\\'
            OR fold_case(c.name) LIKE ?1 ESCAPE '\\'",
        params![pattern],
        |r| r.get(0),
    )?;

    // Out-of-range pages land past the end and come back empty.
    let offset = i64::try_from(u64::from(page - 1) * u64::from(per_page)).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(
        "SELECT
           p.id, p.student_id, p.company_id, p.teacher_id, p.start_date, p.end_date,
           s.name, c.name, t.name
         FROM placements p
         JOIN students s ON s.id = p.student_id
         JOIN companies c ON c.id = p.company_id
         LEFT JOIN teachers t ON t.id = p.teacher_id
         WHERE ?1 IS NULL
            OR fold_case(s.name) LIKE ?1 ESCAPE '\\'
            OR fold_case(c.name) LIKE ?1 ESCAPE '\\'
         ORDER BY p.created_at DESC, p.rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map(params![pattern, i64::from(per_page), offset], |r| {
            let placement = placement_from_row(r)?;
            let can_edit_delete = viewer_student_id == Some(placement.student_id.as_str());
            Ok(PlacementRow {
                placement,
                student_name: r.get(6)?,
                company_name: r.get(7)?,
                teacher_name: r.get(8)?,
                can_edit_delete,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let total = total.max(0) as u64;
    let last_page = (total.div_ceil(per_page as u64)).max(1) as u32;
    Ok(PlacementPage {
        rows,
        page,
        per_page,
        total,
        last_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        init_schema(&conn).expect("schema");
        conn
    }

    fn fields<'a>(student_id: &'a str, company_id: &'a str) -> PlacementFields<'a> {
        PlacementFields {
            student_id,
            company_id,
            teacher_id: None,
            start_date: "2025-07-01",
            end_date: "2025-09-28",
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_contains("ab"), "%ab%");
        assert_eq!(like_contains("50%_x\\"), "%50\\%\\_x\\\\%");
    }

    #[test]
    fn second_placement_for_student_hits_unique_index() {
        let conn = memory_db();
        let s = student_insert(&conn, "Ayu", "ayu@example.test").expect("student");
        let c = company_insert(&conn, "PT Maju").expect("company");
        placement_insert(&conn, &fields(&s.id, &c.id)).expect("first insert");

        let e = placement_insert(&conn, &fields(&s.id, &c.id)).expect_err("second insert");
        assert!(is_unique_violation(&e), "unexpected error: {e}");
    }

    #[test]
    fn search_matches_student_or_company_case_insensitive() {
        let conn = memory_db();
        let ayu = student_insert(&conn, "Ayu Lestari", "ayu@example.test").expect("student");
        let budi = student_insert(&conn, "Budi", "budi@example.test").expect("student");
        let maju = company_insert(&conn, "PT Maju Jaya").expect("company");
        let sinar = company_insert(&conn, "CV Sinar").expect("company");
        placement_insert(&conn, &fields(&ayu.id, &sinar.id)).expect("insert");
        placement_insert(&conn, &fields(&budi.id, &maju.id)).expect("insert");

        let by_student = placements_page(&conn, Some("lestari"), 1, 10, None).expect("page");
        assert_eq!(by_student.total, 1);
        assert_eq!(by_student.rows[0].student_name, "Ayu Lestari");

        let by_company = placements_page(&conn, Some("MAJU"), 1, 10, None).expect("page");
        assert_eq!(by_company.total, 1);
        assert_eq!(by_company.rows[0].company_name, "PT Maju Jaya");

        let blank = placements_page(&conn, Some("  "), 1, 10, None).expect("page");
        assert_eq!(blank.total, 2);

        let none = placements_page(&conn, Some("100%"), 1, 10, None).expect("page");
        assert_eq!(none.total, 0);
    }

    #[test]
    fn search_folds_case_beyond_ascii() {
        let conn = memory_db();
        let umit = student_insert(&conn, "Ümit Özdemir", "umit@example.test").expect("student");
        let budi = student_insert(&conn, "Budi", "budi@example.test").expect("student");
        let cafe = company_insert(&conn, "Café Éclair").expect("company");
        let maju = company_insert(&conn, "PT Maju").expect("company");
        placement_insert(&conn, &fields(&umit.id, &maju.id)).expect("insert");
        placement_insert(&conn, &fields(&budi.id, &cafe.id)).expect("insert");

        let by_student = placements_page(&conn, Some("ümit"), 1, 10, None).expect("page");
        assert_eq!(by_student.total, 1);
        assert_eq!(by_student.rows[0].student_name, "Ümit Özdemir");

        let upper = placements_page(&conn, Some("ÖZDEM"), 1, 10, None).expect("page");
        assert_eq!(upper.total, 1);

        let by_company = placements_page(&conn, Some("ÉCLAIR"), 1, 10, None).expect("page");
        assert_eq!(by_company.total, 1);
        assert_eq!(by_company.rows[0].company_name, "Café Éclair");
    }

    #[test]
    fn huge_page_numbers_return_an_empty_page() {
        let conn = memory_db();
        let s = student_insert(&conn, "Ayu", "ayu@example.test").expect("student");
        let c = company_insert(&conn, "PT Maju").expect("company");
        placement_insert(&conn, &fields(&s.id, &c.id)).expect("insert");

        let page = placements_page(&conn, None, u32::MAX, u32::MAX, None).expect("page");
        assert_eq!(page.total, 1);
        assert!(page.rows.is_empty());
        assert_eq!(page.page, u32::MAX);
        assert_eq!(page.per_page, u32::MAX);
        assert_eq!(page.last_page, 1);

        let past_end = placements_page(&conn, None, u32::MAX, 10, None).expect("page");
        assert!(past_end.rows.is_empty());
    }

    #[test]
    fn pages_are_newest_first_and_flag_owned_rows() {
        let conn = memory_db();
        let c = company_insert(&conn, "PT Maju").expect("company");
        let mut ids = Vec::new();
        for i in 0..3 {
            let s = student_insert(&conn, &format!("Student {i}"), &format!("s{i}@example.test"))
                .expect("student");
            placement_insert(&conn, &fields(&s.id, &c.id)).expect("insert");
            ids.push(s.id);
        }

        let first = placements_page(&conn, None, 1, 2, Some(&ids[2])).expect("page");
        assert_eq!(first.total, 3);
        assert_eq!(first.last_page, 2);
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.rows[0].placement.student_id, ids[2]);
        assert!(first.rows[0].can_edit_delete);
        assert!(!first.rows[1].can_edit_delete);

        let second = placements_page(&conn, None, 2, 2, None).expect("page");
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].placement.student_id, ids[0]);
    }
}
