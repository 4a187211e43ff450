use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schooldesk_core::db::open_db;
use schooldesk_core::model::school::NewStudent;
use schooldesk_core::{FeeLedgerService, FeeStatus, SchoolRepository, SqliteSchoolRepository};
use std::thread;

const WRITERS: usize = 4;
const PAYMENTS_PER_WRITER: usize = 25;

#[test]
fn concurrent_payments_from_separate_connections_all_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.sqlite3");
    let date = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();

    let setup = open_db(&path).unwrap();
    let school = SqliteSchoolRepository::try_new(&setup).unwrap();
    let shared = school
        .enroll_student(&NewStudent::new("Shared", "Student", date))
        .unwrap()
        .id;
    let other = school
        .enroll_student(&NewStudent::new("Other", "Student", date))
        .unwrap()
        .id;
    let ledger = FeeLedgerService::sqlite(&setup).unwrap();
    ledger.assign_fee(shared, dec!(150)).unwrap();
    ledger.assign_fee(other, dec!(150)).unwrap();

    let handles = (0..WRITERS)
        .map(|writer| {
            let path = path.clone();
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let ledger = FeeLedgerService::sqlite(&conn).unwrap();
                let student = if writer % 2 == 0 { shared } else { other };
                for _ in 0..PAYMENTS_PER_WRITER {
                    ledger.record_payment(student, dec!(1.50), date).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let per_student = Decimal::from(WRITERS / 2 * PAYMENTS_PER_WRITER) * dec!(1.50);
    for student in [shared, other] {
        let record = ledger.fee_record(student).unwrap();
        let payments = ledger.payments(student).unwrap();
        let logged = payments
            .iter()
            .fold(Decimal::ZERO, |total, payment| total + payment.amount);

        assert_eq!(payments.len(), WRITERS / 2 * PAYMENTS_PER_WRITER);
        assert_eq!(record.amount_paid, logged);
        assert_eq!(record.amount_paid, per_student);
        assert_eq!(record.status, FeeStatus::PartiallyPaid);
    }
}
