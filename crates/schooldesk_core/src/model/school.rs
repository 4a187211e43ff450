//! School directory entities: classes, teachers, students, parents,
//! subjects, exams, marks, attendance and timetable slots.
//!
//! # Responsibility
//! - Define the records surrounding the fee ledger.
//! - Validate user-entered fields before persistence.
//!
//! # Invariants
//! - Names are non-blank after trimming.
//! - Optional email/phone values must match their contact patterns.
//! - Timetable slots end strictly after they start.

use chrono::{NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StudentId = i64;
pub type ClassId = i64;
pub type TeacherId = i64;
pub type ParentId = i64;
pub type SubjectId = i64;
pub type ExamId = i64;
pub type SlotId = i64;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$").expect("valid phone regex"));

/// Field-level validation failures for school entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchoolValidationError {
    BlankField(&'static str),
    InvalidEmail(String),
    InvalidPhone(String),
    InvalidMaxMarks(i64),
    InvalidTimeWindow {
        starts_at: NaiveTime,
        ends_at: NaiveTime,
    },
}

impl Display for SchoolValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::InvalidEmail(value) => write!(f, "invalid email address `{value}`"),
            Self::InvalidPhone(value) => write!(f, "invalid phone number `{value}`"),
            Self::InvalidMaxMarks(value) => {
                write!(f, "max_marks must be positive, got {value}")
            }
            Self::InvalidTimeWindow { starts_at, ends_at } => write!(
                f,
                "slot end ({}) must be after start ({})",
                ends_at.format("%H:%M"),
                starts_at.format("%H:%M")
            ),
        }
    }
}

impl Error for SchoolValidationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub section: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Input for registering a teacher.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewTeacher {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewTeacher {
    pub fn validate(&self) -> Result<(), SchoolValidationError> {
        require_name("first_name", &self.first_name)?;
        require_name("last_name", &self.last_name)?;
        validate_contact(self.email.as_deref(), self.phone.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: Option<ClassId>,
    pub enrolled_on: NaiveDate,
    /// Inactive students keep their history but cannot make new payments.
    pub is_active: bool,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Input for enrolling a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub class_id: Option<ClassId>,
    pub enrolled_on: NaiveDate,
}

impl NewStudent {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        enrolled_on: NaiveDate,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: None,
            class_id: None,
            enrolled_on,
        }
    }

    pub fn in_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    pub fn validate(&self) -> Result<(), SchoolValidationError> {
        require_name("first_name", &self.first_name)?;
        require_name("last_name", &self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub id: ParentId,
    pub student_id: StudentId,
    pub first_name: String,
    pub last_name: String,
    /// Free text such as `mother`, `father`, `guardian`.
    pub relationship: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Input for linking a parent/guardian to a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParent {
    pub student_id: StudentId,
    pub first_name: String,
    pub last_name: String,
    pub relationship: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewParent {
    pub fn validate(&self) -> Result<(), SchoolValidationError> {
        require_name("first_name", &self.first_name)?;
        require_name("last_name", &self.last_name)?;
        require_name("relationship", &self.relationship)?;
        validate_contact(self.email.as_deref(), self.phone.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub teacher_id: Option<TeacherId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub class_id: ClassId,
    pub name: String,
    pub held_on: NaiveDate,
    pub max_marks: i64,
}

/// Input for scheduling an exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExam {
    pub class_id: ClassId,
    pub name: String,
    pub held_on: NaiveDate,
    pub max_marks: i64,
}

impl NewExam {
    pub fn validate(&self) -> Result<(), SchoolValidationError> {
        require_name("name", &self.name)?;
        if self.max_marks <= 0 {
            return Err(SchoolValidationError::InvalidMaxMarks(self.max_marks));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub subject_id: SubjectId,
    pub marks_obtained: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    /// Counts as attended in summaries.
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(Self::Present),
            "absent" => Some(Self::Absent),
            "late" => Some(Self::Late),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableSlot {
    pub id: SlotId,
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub weekday: Weekday,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
}

/// Input for adding a timetable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewTimetableSlot {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub weekday: Weekday,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
}

impl NewTimetableSlot {
    pub fn validate(&self) -> Result<(), SchoolValidationError> {
        if self.ends_at <= self.starts_at {
            return Err(SchoolValidationError::InvalidTimeWindow {
                starts_at: self.starts_at,
                ends_at: self.ends_at,
            });
        }
        Ok(())
    }

    /// Half-open overlap check: back-to-back slots do not overlap.
    pub fn overlaps(&self, starts_at: NaiveTime, ends_at: NaiveTime) -> bool {
        self.starts_at < ends_at && starts_at < self.ends_at
    }
}

/// Rejects names that are blank after trimming.
pub fn require_name(field: &'static str, value: &str) -> Result<(), SchoolValidationError> {
    if value.trim().is_empty() {
        return Err(SchoolValidationError::BlankField(field));
    }
    Ok(())
}

fn validate_contact(email: Option<&str>, phone: Option<&str>) -> Result<(), SchoolValidationError> {
    if let Some(email) = email {
        if !EMAIL_RE.is_match(email.trim()) {
            return Err(SchoolValidationError::InvalidEmail(email.to_string()));
        }
    }
    if let Some(phone) = phone {
        if !PHONE_RE.is_match(phone.trim()) {
            return Err(SchoolValidationError::InvalidPhone(phone.to_string()));
        }
    }
    Ok(())
}
