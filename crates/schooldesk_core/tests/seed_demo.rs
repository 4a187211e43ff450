use chrono::NaiveDate;
use rust_decimal_macros::dec;
use schooldesk_core::db::open_db_in_memory;
use schooldesk_core::report::school_reports::{
    attendance_summary, outstanding_fees, teacher_timetable, top_exam_performers,
};
use schooldesk_core::model::school::{NewStudent, NewTeacher};
use schooldesk_core::seed::{first_teacher, has_students};
use schooldesk_core::{
    seed_demo_school, FeeLedgerService, FeeStatus, SchoolRepository, SeedError,
    SqliteSchoolRepository,
};

#[test]
fn demo_school_yields_documented_fee_statuses() {
    let conn = open_db_in_memory().unwrap();
    let school = seed_demo_school(&conn).unwrap();

    assert_eq!(school.class_ids.len(), 2);
    assert_eq!(school.teacher_ids.len(), 3);
    assert_eq!(school.subject_ids.len(), 3);
    assert_eq!(school.student_ids, vec![1, 2, 3, 4, 5]);

    let ledger = FeeLedgerService::sqlite(&conn).unwrap();
    let statuses = ledger
        .fee_records()
        .unwrap()
        .into_iter()
        .map(|record| (record.student_id, record.amount_paid, record.status))
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            (1, dec!(20000), FeeStatus::Paid),
            (2, dec!(15000), FeeStatus::PartiallyPaid),
            (3, dec!(0), FeeStatus::Unpaid),
            (4, dec!(5000), FeeStatus::PartiallyPaid),
            (5, dec!(20000), FeeStatus::Paid),
        ]
    );

    let installments = ledger.payments(5).unwrap();
    assert_eq!(installments.len(), 2);
    assert!(installments
        .iter()
        .all(|payment| payment.amount == dec!(10000)));
}

#[test]
fn demo_school_feeds_every_report() {
    let conn = open_db_in_memory().unwrap();
    let school = seed_demo_school(&conn).unwrap();

    let outstanding = outstanding_fees(&conn).unwrap();
    let order = outstanding
        .iter()
        .map(|row| (row.student_id, row.balance))
        .collect::<Vec<_>>();
    assert_eq!(
        order,
        vec![(3, dec!(20000)), (4, dec!(15000)), (2, dec!(5000))]
    );

    let week = attendance_summary(
        &conn,
        school.class_ids[0],
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 7).unwrap(),
    )
    .unwrap();
    let rates = week
        .iter()
        .map(|row| (row.student_id, row.attendance_rate))
        .collect::<Vec<_>>();
    assert_eq!(
        rates,
        vec![(1, dec!(100)), (2, dec!(80)), (3, dec!(60))]
    );

    let ranking = top_exam_performers(&conn, school.exam_id, 3).unwrap();
    let ranked_ids = ranking.iter().map(|row| row.student_id).collect::<Vec<_>>();
    assert_eq!(ranked_ids, vec![1, 2, 3]);
    assert_eq!(ranking[0].average_marks, dec!(86.33));
    assert_eq!(ranking[1].average_marks, ranking[2].average_marks);

    let timetable = teacher_timetable(&conn, school.teacher_ids[0]).unwrap();
    assert_eq!(timetable.len(), 3);
    assert!(timetable
        .iter()
        .all(|entry| entry.subject_name == "Mathematics"));
}

#[test]
fn seeding_twice_is_refused() {
    let conn = open_db_in_memory().unwrap();
    assert!(!has_students(&conn).unwrap());
    seed_demo_school(&conn).unwrap();
    assert!(has_students(&conn).unwrap());

    let payments_before: i64 = conn
        .query_row("SELECT COUNT(*) FROM payments;", [], |row| row.get(0))
        .unwrap();
    assert!(matches!(
        seed_demo_school(&conn),
        Err(SeedError::AlreadySeeded)
    ));
    let payments_after: i64 = conn
        .query_row("SELECT COUNT(*) FROM payments;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(payments_before, payments_after);
}

#[test]
fn first_teacher_is_the_lowest_id() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(first_teacher(&conn).unwrap(), None);

    let school = seed_demo_school(&conn).unwrap();
    assert_eq!(first_teacher(&conn).unwrap(), Some(school.teacher_ids[0]));

    conn.execute("DELETE FROM teachers WHERE id = ?1;", [school.teacher_ids[0]])
        .unwrap();
    assert_eq!(first_teacher(&conn).unwrap(), Some(school.teacher_ids[1]));

    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    let newcomer = repo
        .create_teacher(&NewTeacher {
            first_name: "Ines".to_string(),
            last_name: "Varga".to_string(),
            email: None,
            phone: None,
        })
        .unwrap();
    assert!(newcomer.id > school.teacher_ids[1]);
    assert_eq!(first_teacher(&conn).unwrap(), Some(school.teacher_ids[1]));
}

#[test]
fn students_without_fees_still_block_seeding() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSchoolRepository::try_new(&conn).unwrap();
    repo.enroll_student(&NewStudent::new(
        "Orphan",
        "Row",
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
    ))
    .unwrap();

    assert!(matches!(
        seed_demo_school(&conn),
        Err(SeedError::AlreadySeeded)
    ));
    let ledger = FeeLedgerService::sqlite(&conn).unwrap();
    assert!(ledger.fee_records().unwrap().is_empty());
    assert_eq!(first_teacher(&conn).unwrap(), None);
}
