//! Column encoders/decoders shared by the SQLite repositories.
//!
//! Decoders return a message string; each repository wraps it into its own
//! `InvalidData` variant.

use crate::model::money::to_canonical;
use chrono::{NaiveDate, NaiveTime, Weekday};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

pub(crate) fn money_to_db(amount: Decimal) -> String {
    to_canonical(amount).to_string()
}

pub(crate) fn parse_money(value: &str, column: &'static str) -> Result<Decimal, String> {
    Decimal::from_str(value).map_err(|_| format!("invalid amount `{value}` in {column}"))
}

pub(crate) fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(value: &str, column: &'static str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| format!("invalid date `{value}` in {column}"))
}

pub(crate) fn time_to_db(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub(crate) fn parse_time(value: &str, column: &'static str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| format!("invalid time `{value}` in {column}"))
}

pub(crate) fn weekday_to_db(weekday: Weekday) -> i64 {
    i64::from(weekday.number_from_monday())
}

pub(crate) fn parse_weekday(value: i64, column: &'static str) -> Result<Weekday, String> {
    match value {
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        7 => Ok(Weekday::Sun),
        other => Err(format!("invalid weekday `{other}` in {column}")),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("invalid uuid `{value}` in {column}"))
}

pub(crate) fn parse_flag(value: i64, column: &'static str) -> Result<bool, String> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("invalid flag value `{other}` in {column}")),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_money, parse_weekday, time_to_db, weekday_to_db};
    use chrono::{NaiveTime, Weekday};

    #[test]
    fn weekday_numbers_start_on_monday() {
        assert_eq!(weekday_to_db(Weekday::Mon), 1);
        assert_eq!(weekday_to_db(Weekday::Sun), 7);
        assert_eq!(parse_weekday(3, "t.weekday"), Ok(Weekday::Wed));
        assert!(parse_weekday(0, "t.weekday").is_err());
    }

    #[test]
    fn time_is_stored_without_seconds() {
        let time = NaiveTime::from_hms_opt(9, 5, 42).unwrap();
        assert_eq!(time_to_db(time), "09:05");
    }

    #[test]
    fn bad_money_text_names_the_column() {
        let message = parse_money("abc", "fees.amount_due").unwrap_err();
        assert!(message.contains("fees.amount_due"));
    }
}
