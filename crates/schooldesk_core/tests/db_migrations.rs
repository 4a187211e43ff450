use rusqlite::Connection;
use schooldesk_core::db::migrations::latest_version;
use schooldesk_core::db::{open_db, open_db_in_memory, schema_version, table_exists, DbError};
use schooldesk_core::{LedgerError, SchoolRepoError, SqliteFeeRepository, SqliteSchoolRepository};

const ALL_TABLES: &[&str] = &[
    "classes",
    "teachers",
    "students",
    "parents",
    "subjects",
    "exams",
    "marks",
    "attendance",
    "timetable_slots",
    "fees",
    "payments",
];

#[test]
fn in_memory_store_is_fully_migrated() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in ALL_TABLES {
        assert!(table_exists(&conn, table).unwrap(), "missing table {table}");
    }
}

#[test]
fn reopening_a_file_store_does_not_rerun_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schooldesk.sqlite3");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO classes (name, section) VALUES ('Grade 1', NULL);",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second).unwrap(), latest_version());
    let classes: i64 = second
        .query_row("SELECT COUNT(*) FROM classes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(classes, 1);
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 42;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 42);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_are_enforced_on_opened_connections() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let orphan = conn.execute(
        "INSERT INTO fees (student_id, amount_due, amount_paid, payment_status)
         VALUES (404, '10.00', '0.00', 'unpaid');",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteFeeRepository::try_new(&conn) {
        Err(LedgerError::UninitializedConnection {
            expected_version,
            actual_version,
        }) => {
            assert_eq!(expected_version, latest_version());
            assert_eq!(actual_version, 0);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unmigrated connection must be rejected"),
    }

    assert!(matches!(
        SqliteSchoolRepository::try_new(&conn),
        Err(SchoolRepoError::UninitializedConnection { .. })
    ));
}

#[test]
fn repositories_reject_connections_missing_a_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE payments;").unwrap();

    assert!(matches!(
        SqliteFeeRepository::try_new(&conn),
        Err(LedgerError::MissingRequiredTable("payments"))
    ));
}
