use chrono::{NaiveDate, NaiveTime, Weekday};
use schooldesk_core::db::open_db_in_memory;
use schooldesk_core::model::school::{
    AttendanceEntry, AttendanceStatus, Mark, NewExam, NewParent, NewStudent, NewTeacher,
    NewTimetableSlot, SchoolValidationError,
};
use schooldesk_core::{
    SchoolRepoError, SchoolRepository, SqliteSchoolRepository, SqliteStudentDirectory,
    StudentDirectory,
};

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn teacher(first_name: &str, email: Option<&str>) -> NewTeacher {
    NewTeacher {
        first_name: first_name.to_string(),
        last_name: "Teacher".to_string(),
        email: email.map(str::to_string),
        phone: None,
    }
}

#[test]
fn enrolled_student_roundtrips_with_trimmed_names() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let class = repo.create_class("Grade 3", Some("B")).unwrap();

    let mut input = NewStudent::new("  Ada ", "Lovelace", date(9, 1)).in_class(class.id);
    input.date_of_birth = Some(NaiveDate::from_ymd_opt(2015, 12, 10).unwrap());
    let student = repo.enroll_student(&input).unwrap();

    let loaded = repo.get_student(student.id).unwrap().unwrap();
    assert_eq!(loaded, student);
    assert_eq!(loaded.first_name, "Ada");
    assert_eq!(loaded.full_name(), "Ada Lovelace");
    assert!(loaded.is_active);
    assert_eq!(repo.get_class(class.id).unwrap(), Some(class));
}

#[test]
fn enrollment_validates_names_and_class() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();

    assert!(matches!(
        repo.enroll_student(&NewStudent::new("  ", "Blank", date(9, 1))),
        Err(SchoolRepoError::Validation(SchoolValidationError::BlankField("first_name")))
    ));
    assert!(matches!(
        repo.enroll_student(&NewStudent::new("No", "Class", date(9, 1)).in_class(12)),
        Err(SchoolRepoError::NotFound {
            entity: "class",
            id: 12
        })
    ));
}

#[test]
fn class_listing_is_ordered_and_filters_inactive() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let class = repo.create_class("Grade 4", None).unwrap();

    let zed = repo
        .enroll_student(&NewStudent::new("Zed", "Adams", date(9, 1)).in_class(class.id))
        .unwrap();
    let amy = repo
        .enroll_student(&NewStudent::new("Amy", "Brown", date(9, 1)).in_class(class.id))
        .unwrap();
    let bob = repo
        .enroll_student(&NewStudent::new("Bob", "adams", date(9, 1)).in_class(class.id))
        .unwrap();
    repo.set_student_active(amy.id, false).unwrap();

    let active = repo.list_students_in_class(class.id, false).unwrap();
    let active_ids = active.iter().map(|student| student.id).collect::<Vec<_>>();
    assert_eq!(active_ids, vec![bob.id, zed.id]);

    let everyone = repo.list_students_in_class(class.id, true).unwrap();
    assert_eq!(everyone.len(), 3);
    assert!(!everyone.iter().find(|s| s.id == amy.id).unwrap().is_active);
}

#[test]
fn student_directory_reports_existence_and_activity() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let student = repo
        .enroll_student(&NewStudent::new("Ivy", "Chen", date(9, 1)))
        .unwrap();

    let directory = SqliteStudentDirectory::new(&conn);
    assert!(directory.student_exists(student.id).unwrap());
    assert!(directory.is_active(student.id).unwrap());
    assert!(!directory.student_exists(999).unwrap());
    assert!(!directory.is_active(999).unwrap());

    repo.set_student_active(student.id, false).unwrap();
    assert!(directory.student_exists(student.id).unwrap());
    assert!(!repo.is_active(student.id).unwrap());

    assert!(matches!(
        repo.set_student_active(999, true),
        Err(SchoolRepoError::NotFound { entity: "student", .. })
    ));
}

#[test]
fn teacher_contact_details_are_validated() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();

    let saved = repo
        .create_teacher(&teacher("Grace", Some(" grace@school.example ")))
        .unwrap();
    assert_eq!(saved.email.as_deref(), Some("grace@school.example"));
    assert_eq!(repo.get_teacher(saved.id).unwrap(), Some(saved));

    assert!(matches!(
        repo.create_teacher(&teacher("Alan", Some("not-an-email"))),
        Err(SchoolRepoError::Validation(SchoolValidationError::InvalidEmail(_)))
    ));

    let mut bad_phone = teacher("Alan", None);
    bad_phone.phone = Some("call me".to_string());
    assert!(matches!(
        repo.create_teacher(&bad_phone),
        Err(SchoolRepoError::Validation(SchoolValidationError::InvalidPhone(_)))
    ));
}

#[test]
fn parents_are_linked_to_existing_students() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let student = repo
        .enroll_student(&NewStudent::new("Leo", "Park", date(9, 1)))
        .unwrap();

    let parent = NewParent {
        student_id: student.id,
        first_name: "Mina".to_string(),
        last_name: "Park".to_string(),
        relationship: "Mother".to_string(),
        email: Some("mina@home.example".to_string()),
        phone: Some("+44 20 7946 0958".to_string()),
    };
    let saved = repo.add_parent(&parent).unwrap();
    assert_eq!(saved.relationship, "mother");
    assert_eq!(repo.list_parents(student.id).unwrap(), vec![saved]);

    let orphan = NewParent {
        student_id: 404,
        ..parent
    };
    assert!(matches!(
        repo.add_parent(&orphan),
        Err(SchoolRepoError::NotFound { entity: "student", id: 404 })
    ));
}

#[test]
fn marks_are_range_checked_and_upserted() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let class = repo.create_class("Grade 7", None).unwrap();
    let subject = repo.create_subject("History", None).unwrap();
    let student = repo
        .enroll_student(&NewStudent::new("Sam", "Reed", date(9, 1)).in_class(class.id))
        .unwrap();
    let exam = repo
        .create_exam(&NewExam {
            class_id: class.id,
            name: "Quiz 1".to_string(),
            held_on: date(10, 2),
            max_marks: 50,
        })
        .unwrap();

    let mut mark = Mark {
        exam_id: exam.id,
        student_id: student.id,
        subject_id: subject.id,
        marks_obtained: 51,
    };
    assert!(matches!(
        repo.record_mark(&mark),
        Err(SchoolRepoError::MarkOutOfRange {
            marks_obtained: 51,
            max_marks: 50
        })
    ));

    mark.marks_obtained = 30;
    repo.record_mark(&mark).unwrap();
    mark.marks_obtained = 45;
    repo.record_mark(&mark).unwrap();

    let stored: (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), MAX(marks_obtained) FROM marks WHERE exam_id = ?1;",
            [exam.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(stored, (1, 45));

    assert!(matches!(
        repo.create_exam(&NewExam {
            class_id: class.id,
            name: "Broken".to_string(),
            held_on: date(10, 3),
            max_marks: 0,
        }),
        Err(SchoolRepoError::Validation(SchoolValidationError::InvalidMaxMarks(0)))
    ));
}

#[test]
fn attendance_is_one_entry_per_student_and_day() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let student = repo
        .enroll_student(&NewStudent::new("Kai", "Moss", date(9, 1)))
        .unwrap();

    let mut entry = AttendanceEntry {
        student_id: student.id,
        date: date(9, 2),
        status: AttendanceStatus::Absent,
    };
    repo.record_attendance(&entry).unwrap();
    entry.status = AttendanceStatus::Late;
    repo.record_attendance(&entry).unwrap();

    let status: String = conn
        .query_row(
            "SELECT status FROM attendance WHERE student_id = ?1;",
            [student.id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(AttendanceStatus::parse(&status), Some(AttendanceStatus::Late));
}

#[test]
fn overlapping_slots_for_one_teacher_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let class_a = repo.create_class("Grade 8", Some("A")).unwrap();
    let class_b = repo.create_class("Grade 8", Some("B")).unwrap_err();
    assert!(matches!(class_b, SchoolRepoError::Db(_)));
    let class_b = repo.create_class("Grade 9", None).unwrap();
    let math_teacher = repo.create_teacher(&teacher("Emmy", None)).unwrap();
    let math = repo.create_subject("Algebra", Some(math_teacher.id)).unwrap();

    let slot = NewTimetableSlot {
        class_id: class_a.id,
        subject_id: math.id,
        teacher_id: math_teacher.id,
        weekday: Weekday::Mon,
        starts_at: at(9, 0),
        ends_at: at(10, 0),
    };
    let first = repo.add_timetable_slot(&slot).unwrap();

    let clash = NewTimetableSlot {
        class_id: class_b.id,
        starts_at: at(9, 30),
        ends_at: at(10, 30),
        ..slot
    };
    match repo.add_timetable_slot(&clash).unwrap_err() {
        SchoolRepoError::TimetableConflict {
            teacher_id,
            weekday,
            existing_slot,
        } => {
            assert_eq!(teacher_id, math_teacher.id);
            assert_eq!(weekday, Weekday::Mon);
            assert_eq!(existing_slot, first.id);
        }
        other => panic!("unexpected error: {other}"),
    }

    let back_to_back = NewTimetableSlot {
        class_id: class_b.id,
        starts_at: at(10, 0),
        ends_at: at(11, 0),
        ..slot
    };
    repo.add_timetable_slot(&back_to_back).unwrap();

    let other_day = NewTimetableSlot {
        weekday: Weekday::Tue,
        ..slot
    };
    repo.add_timetable_slot(&other_day).unwrap();

    let inverted = NewTimetableSlot {
        starts_at: at(14, 0),
        ends_at: at(13, 0),
        ..other_day
    };
    assert!(matches!(
        repo.add_timetable_slot(&inverted),
        Err(SchoolRepoError::Validation(SchoolValidationError::InvalidTimeWindow { .. }))
    ));
}
