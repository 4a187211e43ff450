//! School directory repository: classes, teachers, students, parents,
//! subjects, exams, marks, attendance and timetable slots.
//!
//! # Responsibility
//! - Plain CRUD over the school tables surrounding the fee ledger.
//! - Provide the `StudentDirectory` contract the ledger consumes.
//!
//! # Invariants
//! - Model `validate()` runs before every insert.
//! - Referenced rows are checked up front so callers get `NotFound` instead
//!   of a raw foreign-key failure.
//! - Marks and attendance are upserts keyed by their natural keys.
//! - One teacher never holds overlapping slots on the same weekday.

use crate::db::{DbError, DbResult};
use crate::model::school::{
    require_name, AttendanceEntry, Class, ClassId, Exam, ExamId, Mark, NewExam, NewParent,
    NewStudent, NewTeacher, NewTimetableSlot, Parent, SchoolValidationError, SlotId, Student,
    StudentId, Subject, Teacher, TeacherId, TimetableSlot,
};
use crate::repo::columns::{
    bool_to_int, date_to_db, parse_date, parse_flag, parse_time, time_to_db, weekday_to_db,
};
use crate::repo::{check_connection_ready, ConnectionNotReady};
use chrono::Weekday;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const SCHOOL_TABLES: &[&str] = &[
    "classes",
    "teachers",
    "students",
    "parents",
    "subjects",
    "exams",
    "marks",
    "attendance",
    "timetable_slots",
];

const STUDENT_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    date_of_birth,
    class_id,
    enrolled_on,
    is_active
FROM students";

pub type SchoolRepoResult<T> = Result<T, SchoolRepoError>;

/// Errors from school directory operations.
#[derive(Debug)]
pub enum SchoolRepoError {
    Validation(SchoolValidationError),
    /// Referenced row does not exist.
    NotFound {
        entity: &'static str,
        id: i64,
    },
    MarkOutOfRange {
        marks_obtained: i64,
        max_marks: i64,
    },
    /// Teacher already has an overlapping slot on that weekday.
    TimetableConflict {
        teacher_id: TeacherId,
        weekday: Weekday,
        existing_slot: SlotId,
    },
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    Db(DbError),
    InvalidData(String),
}

impl Display for SchoolRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::MarkOutOfRange {
                marks_obtained,
                max_marks,
            } => write!(f, "marks {marks_obtained} outside 0..={max_marks}"),
            Self::TimetableConflict {
                teacher_id,
                weekday,
                existing_slot,
            } => write!(
                f,
                "teacher {teacher_id} already teaches slot {existing_slot} at that time on {weekday}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "school repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "school repository requires table `{table}`")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid school data: {message}"),
        }
    }
}

impl Error for SchoolRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchoolValidationError> for SchoolRepoError {
    fn from(value: SchoolValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for SchoolRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SchoolRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Student lookups consumed by the fee ledger.
pub trait StudentDirectory {
    fn student_exists(&self, student_id: StudentId) -> DbResult<bool>;
    fn is_active(&self, student_id: StudentId) -> DbResult<bool>;
}

/// SQLite-backed student directory; also usable on an open transaction.
pub struct SqliteStudentDirectory<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteStudentDirectory<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl StudentDirectory for SqliteStudentDirectory<'_> {
    fn student_exists(&self, student_id: StudentId) -> DbResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM students WHERE id = ?1);",
            [student_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn is_active(&self, student_id: StudentId) -> DbResult<bool> {
        let flag: Option<i64> = self
            .conn
            .query_row(
                "SELECT is_active FROM students WHERE id = ?1;",
                [student_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag == Some(1))
    }
}

/// Repository interface for school directory operations.
pub trait SchoolRepository {
    fn create_class(&self, name: &str, section: Option<&str>) -> SchoolRepoResult<Class>;
    fn get_class(&self, class_id: ClassId) -> SchoolRepoResult<Option<Class>>;
    fn create_teacher(&self, teacher: &NewTeacher) -> SchoolRepoResult<Teacher>;
    fn get_teacher(&self, teacher_id: TeacherId) -> SchoolRepoResult<Option<Teacher>>;
    fn enroll_student(&self, student: &NewStudent) -> SchoolRepoResult<Student>;
    fn get_student(&self, student_id: StudentId) -> SchoolRepoResult<Option<Student>>;
    /// Lists students of one class by `last_name, first_name, id`.
    fn list_students_in_class(
        &self,
        class_id: ClassId,
        include_inactive: bool,
    ) -> SchoolRepoResult<Vec<Student>>;
    fn set_student_active(&self, student_id: StudentId, active: bool) -> SchoolRepoResult<()>;
    fn add_parent(&self, parent: &NewParent) -> SchoolRepoResult<Parent>;
    fn list_parents(&self, student_id: StudentId) -> SchoolRepoResult<Vec<Parent>>;
    fn create_subject(
        &self,
        name: &str,
        teacher_id: Option<TeacherId>,
    ) -> SchoolRepoResult<Subject>;
    fn create_exam(&self, exam: &NewExam) -> SchoolRepoResult<Exam>;
    /// Inserts or overwrites one mark; range-checked against the exam.
    fn record_mark(&self, mark: &Mark) -> SchoolRepoResult<()>;
    /// Inserts or overwrites one attendance entry.
    fn record_attendance(&self, entry: &AttendanceEntry) -> SchoolRepoResult<()>;
    /// Adds one slot, rejecting overlaps for the same teacher and weekday.
    fn add_timetable_slot(&self, slot: &NewTimetableSlot) -> SchoolRepoResult<TimetableSlot>;
}

/// SQLite-backed school directory repository.
pub struct SqliteSchoolRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSchoolRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> SchoolRepoResult<Self> {
        check_connection_ready(conn, SCHOOL_TABLES).map_err(|err| match err {
            ConnectionNotReady::Version { expected, actual } => {
                SchoolRepoError::UninitializedConnection {
                    expected_version: expected,
                    actual_version: actual,
                }
            }
            ConnectionNotReady::MissingTable(table) => SchoolRepoError::MissingRequiredTable(table),
            ConnectionNotReady::Db(err) => SchoolRepoError::Db(err),
        })?;
        Ok(Self { conn })
    }
}

impl StudentDirectory for SqliteSchoolRepository<'_> {
    fn student_exists(&self, student_id: StudentId) -> DbResult<bool> {
        SqliteStudentDirectory::new(self.conn).student_exists(student_id)
    }

    fn is_active(&self, student_id: StudentId) -> DbResult<bool> {
        SqliteStudentDirectory::new(self.conn).is_active(student_id)
    }
}

impl SchoolRepository for SqliteSchoolRepository<'_> {
    fn create_class(&self, name: &str, section: Option<&str>) -> SchoolRepoResult<Class> {
        require_name("name", name)?;
        let class = Class {
            id: 0,
            name: name.trim().to_string(),
            section: trimmed(section),
        };
        self.conn.execute(
            "INSERT INTO classes (name, section) VALUES (?1, ?2);",
            params![class.name, class.section],
        )?;
        Ok(Class {
            id: self.conn.last_insert_rowid(),
            ..class
        })
    }

    fn get_class(&self, class_id: ClassId) -> SchoolRepoResult<Option<Class>> {
        let class = self
            .conn
            .query_row(
                "SELECT id, name, section FROM classes WHERE id = ?1;",
                [class_id],
                |row| {
                    Ok(Class {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        section: row.get("section")?,
                    })
                },
            )
            .optional()?;
        Ok(class)
    }

    fn create_teacher(&self, teacher: &NewTeacher) -> SchoolRepoResult<Teacher> {
        teacher.validate()?;
        let record = Teacher {
            id: 0,
            first_name: teacher.first_name.trim().to_string(),
            last_name: teacher.last_name.trim().to_string(),
            email: trimmed(teacher.email.as_deref()),
            phone: trimmed(teacher.phone.as_deref()),
        };
        self.conn.execute(
            "INSERT INTO teachers (first_name, last_name, email, phone)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                record.first_name,
                record.last_name,
                record.email,
                record.phone
            ],
        )?;
        Ok(Teacher {
            id: self.conn.last_insert_rowid(),
            ..record
        })
    }

    fn get_teacher(&self, teacher_id: TeacherId) -> SchoolRepoResult<Option<Teacher>> {
        let teacher = self
            .conn
            .query_row(
                "SELECT id, first_name, last_name, email, phone
                 FROM teachers
                 WHERE id = ?1;",
                [teacher_id],
                |row| {
                    Ok(Teacher {
                        id: row.get("id")?,
                        first_name: row.get("first_name")?,
                        last_name: row.get("last_name")?,
                        email: row.get("email")?,
                        phone: row.get("phone")?,
                    })
                },
            )
            .optional()?;
        Ok(teacher)
    }

    fn enroll_student(&self, student: &NewStudent) -> SchoolRepoResult<Student> {
        student.validate()?;
        if let Some(class_id) = student.class_id {
            ensure_exists(self.conn, "classes", "class", class_id)?;
        }

        let record = Student {
            id: 0,
            first_name: student.first_name.trim().to_string(),
            last_name: student.last_name.trim().to_string(),
            date_of_birth: student.date_of_birth,
            class_id: student.class_id,
            enrolled_on: student.enrolled_on,
            is_active: true,
        };
        self.conn.execute(
            "INSERT INTO students (
                first_name,
                last_name,
                date_of_birth,
                class_id,
                enrolled_on,
                is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1);",
            params![
                record.first_name,
                record.last_name,
                record.date_of_birth.map(date_to_db),
                record.class_id,
                date_to_db(record.enrolled_on),
            ],
        )?;
        Ok(Student {
            id: self.conn.last_insert_rowid(),
            ..record
        })
    }

    fn get_student(&self, student_id: StudentId) -> SchoolRepoResult<Option<Student>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{STUDENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([student_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_student_row(row)?));
        }
        Ok(None)
    }

    fn list_students_in_class(
        &self,
        class_id: ClassId,
        include_inactive: bool,
    ) -> SchoolRepoResult<Vec<Student>> {
        let mut stmt = self.conn.prepare(&format!(
            "{STUDENT_SELECT_SQL}
             WHERE class_id = ?1
               AND (?2 = 1 OR is_active = 1)
             ORDER BY last_name COLLATE NOCASE ASC, first_name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query(params![class_id, bool_to_int(include_inactive)])?;
        let mut students = Vec::new();
        while let Some(row) = rows.next()? {
            students.push(parse_student_row(row)?);
        }
        Ok(students)
    }

    fn set_student_active(&self, student_id: StudentId, active: bool) -> SchoolRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE students SET is_active = ?2 WHERE id = ?1;",
            params![student_id, bool_to_int(active)],
        )?;
        if changed == 0 {
            return Err(SchoolRepoError::NotFound {
                entity: "student",
                id: student_id,
            });
        }
        Ok(())
    }

    fn add_parent(&self, parent: &NewParent) -> SchoolRepoResult<Parent> {
        parent.validate()?;
        ensure_exists(self.conn, "students", "student", parent.student_id)?;

        let record = Parent {
            id: 0,
            student_id: parent.student_id,
            first_name: parent.first_name.trim().to_string(),
            last_name: parent.last_name.trim().to_string(),
            relationship: parent.relationship.trim().to_lowercase(),
            email: trimmed(parent.email.as_deref()),
            phone: trimmed(parent.phone.as_deref()),
        };
        self.conn.execute(
            "INSERT INTO parents (
                student_id,
                first_name,
                last_name,
                relationship,
                email,
                phone
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.student_id,
                record.first_name,
                record.last_name,
                record.relationship,
                record.email,
                record.phone,
            ],
        )?;
        Ok(Parent {
            id: self.conn.last_insert_rowid(),
            ..record
        })
    }

    fn list_parents(&self, student_id: StudentId) -> SchoolRepoResult<Vec<Parent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, first_name, last_name, relationship, email, phone
             FROM parents
             WHERE student_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([student_id])?;
        let mut parents = Vec::new();
        while let Some(row) = rows.next()? {
            parents.push(Parent {
                id: row.get("id")?,
                student_id: row.get("student_id")?,
                first_name: row.get("first_name")?,
                last_name: row.get("last_name")?,
                relationship: row.get("relationship")?,
                email: row.get("email")?,
                phone: row.get("phone")?,
            });
        }
        Ok(parents)
    }

    fn create_subject(
        &self,
        name: &str,
        teacher_id: Option<TeacherId>,
    ) -> SchoolRepoResult<Subject> {
        require_name("name", name)?;
        if let Some(teacher_id) = teacher_id {
            ensure_exists(self.conn, "teachers", "teacher", teacher_id)?;
        }
        let name = name.trim().to_string();
        self.conn.execute(
            "INSERT INTO subjects (name, teacher_id) VALUES (?1, ?2);",
            params![name, teacher_id],
        )?;
        Ok(Subject {
            id: self.conn.last_insert_rowid(),
            name,
            teacher_id,
        })
    }

    fn create_exam(&self, exam: &NewExam) -> SchoolRepoResult<Exam> {
        exam.validate()?;
        ensure_exists(self.conn, "classes", "class", exam.class_id)?;
        let name = exam.name.trim().to_string();
        self.conn.execute(
            "INSERT INTO exams (class_id, name, held_on, max_marks) VALUES (?1, ?2, ?3, ?4);",
            params![exam.class_id, name, date_to_db(exam.held_on), exam.max_marks],
        )?;
        Ok(Exam {
            id: self.conn.last_insert_rowid(),
            class_id: exam.class_id,
            name,
            held_on: exam.held_on,
            max_marks: exam.max_marks,
        })
    }

    fn record_mark(&self, mark: &Mark) -> SchoolRepoResult<()> {
        let max_marks = exam_max_marks(self.conn, mark.exam_id)?;
        ensure_exists(self.conn, "students", "student", mark.student_id)?;
        ensure_exists(self.conn, "subjects", "subject", mark.subject_id)?;
        if !(0..=max_marks).contains(&mark.marks_obtained) {
            return Err(SchoolRepoError::MarkOutOfRange {
                marks_obtained: mark.marks_obtained,
                max_marks,
            });
        }

        self.conn.execute(
            "INSERT INTO marks (exam_id, student_id, subject_id, marks_obtained)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(exam_id, student_id, subject_id)
             DO UPDATE SET marks_obtained = excluded.marks_obtained;",
            params![
                mark.exam_id,
                mark.student_id,
                mark.subject_id,
                mark.marks_obtained
            ],
        )?;
        Ok(())
    }

    fn record_attendance(&self, entry: &AttendanceEntry) -> SchoolRepoResult<()> {
        ensure_exists(self.conn, "students", "student", entry.student_id)?;
        self.conn.execute(
            "INSERT INTO attendance (student_id, attended_on, status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(student_id, attended_on)
             DO UPDATE SET status = excluded.status;",
            params![
                entry.student_id,
                date_to_db(entry.date),
                entry.status.as_str()
            ],
        )?;
        Ok(())
    }

    fn add_timetable_slot(&self, slot: &NewTimetableSlot) -> SchoolRepoResult<TimetableSlot> {
        slot.validate()?;
        ensure_exists(self.conn, "classes", "class", slot.class_id)?;
        ensure_exists(self.conn, "subjects", "subject", slot.subject_id)?;
        ensure_exists(self.conn, "teachers", "teacher", slot.teacher_id)?;

        // Joins the caller's transaction when one is already open.
        let tx = if self.conn.is_autocommit() {
            Some(Transaction::new_unchecked(
                self.conn,
                TransactionBehavior::Immediate,
            )?)
        } else {
            None
        };
        if let Some(existing_slot) = find_overlapping_slot(self.conn, slot)? {
            return Err(SchoolRepoError::TimetableConflict {
                teacher_id: slot.teacher_id,
                weekday: slot.weekday,
                existing_slot,
            });
        }

        self.conn.execute(
            "INSERT INTO timetable_slots (
                class_id,
                subject_id,
                teacher_id,
                weekday,
                starts_at,
                ends_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                slot.class_id,
                slot.subject_id,
                slot.teacher_id,
                weekday_to_db(slot.weekday),
                time_to_db(slot.starts_at),
                time_to_db(slot.ends_at),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        if let Some(tx) = tx {
            tx.commit()?;
        }

        Ok(TimetableSlot {
            id,
            class_id: slot.class_id,
            subject_id: slot.subject_id,
            teacher_id: slot.teacher_id,
            weekday: slot.weekday,
            starts_at: slot.starts_at,
            ends_at: slot.ends_at,
        })
    }
}

fn find_overlapping_slot(
    conn: &Connection,
    slot: &NewTimetableSlot,
) -> SchoolRepoResult<Option<SlotId>> {
    let mut stmt = conn.prepare(
        "SELECT id, starts_at, ends_at
         FROM timetable_slots
         WHERE teacher_id = ?1
           AND weekday = ?2
         ORDER BY starts_at ASC, id ASC;",
    )?;
    let mut rows = stmt.query(params![slot.teacher_id, weekday_to_db(slot.weekday)])?;
    while let Some(row) = rows.next()? {
        let starts_text: String = row.get("starts_at")?;
        let ends_text: String = row.get("ends_at")?;
        let starts_at = parse_time(&starts_text, "timetable_slots.starts_at")
            .map_err(SchoolRepoError::InvalidData)?;
        let ends_at = parse_time(&ends_text, "timetable_slots.ends_at")
            .map_err(SchoolRepoError::InvalidData)?;
        if slot.overlaps(starts_at, ends_at) {
            return Ok(Some(row.get("id")?));
        }
    }
    Ok(None)
}

fn exam_max_marks(conn: &Connection, exam_id: ExamId) -> SchoolRepoResult<i64> {
    conn.query_row(
        "SELECT max_marks FROM exams WHERE id = ?1;",
        [exam_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(SchoolRepoError::NotFound {
        entity: "exam",
        id: exam_id,
    })
}

fn ensure_exists(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    id: i64,
) -> SchoolRepoResult<()> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id],
        |row| row.get(0),
    )?;
    if exists != 1 {
        return Err(SchoolRepoError::NotFound { entity, id });
    }
    Ok(())
}

fn parse_student_row(row: &Row<'_>) -> SchoolRepoResult<Student> {
    let date_of_birth = row
        .get::<_, Option<String>>("date_of_birth")?
        .map(|value| parse_date(&value, "students.date_of_birth"))
        .transpose()
        .map_err(SchoolRepoError::InvalidData)?;
    let enrolled_text: String = row.get("enrolled_on")?;

    Ok(Student {
        id: row.get("id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        date_of_birth,
        class_id: row.get("class_id")?,
        enrolled_on: parse_date(&enrolled_text, "students.enrolled_on")
            .map_err(SchoolRepoError::InvalidData)?,
        is_active: parse_flag(row.get("is_active")?, "students.is_active")
            .map_err(SchoolRepoError::InvalidData)?,
    })
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
