use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Shortest allowed placement, counted inclusively (start and end day both count).
pub const MIN_DURATION_DAYS: i64 = 90;

/// Raw form input as the UI sends it. Blank strings mean "not filled in".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementForm {
    pub student_id: String,
    pub company_id: String,
    pub teacher_id: String,
    pub start: String,
    pub end: String,
}

/// A form that passed validation, with dates parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidForm {
    pub student_id: String,
    pub company_id: String,
    pub teacher_id: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn parse_form_date(text: &str) -> Option<NaiveDate> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(t, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Earliest legal start date: July 1 of `today`'s year.
///
/// Once July 1 has passed the cutoff stays on July 1 of the current year, so
/// a start anywhere later in the year (including the past) is accepted. It
/// never rolls over to next year's July 1.
pub fn start_cutoff(today: NaiveDate) -> NaiveDate {
    july_first(today.year())
}

fn july_first(year: i32) -> NaiveDate {
    // July 1 exists in every year chrono can represent.
    NaiveDate::from_ymd_opt(year, 7, 1).unwrap_or(NaiveDate::MIN)
}

pub fn check_start(start: NaiveDate, today: NaiveDate) -> Result<(), String> {
    let cutoff = start_cutoff(today);
    if start < cutoff {
        return Err(format!(
            "Start date must be on or after July 1 {}.",
            cutoff.year()
        ));
    }
    Ok(())
}

/// Date-picker hint: July 1 before the cutoff, today afterwards.
pub fn min_start_hint(today: NaiveDate) -> NaiveDate {
    let cutoff = start_cutoff(today);
    if today < cutoff {
        cutoff
    } else {
        today
    }
}

/// End date that gives exactly the minimum inclusive span.
pub fn suggested_end(start: NaiveDate) -> NaiveDate {
    start + Duration::days(MIN_DURATION_DAYS - 1)
}

pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().abs() + 1
}

pub fn check_duration(start: NaiveDate, end: NaiveDate) -> Result<(), String> {
    let days = inclusive_days(start, end);
    if days < MIN_DURATION_DAYS {
        return Err(format!(
            "Placement must last at least {MIN_DURATION_DAYS} days. Current duration is {days} days."
        ));
    }
    Ok(())
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

/// Checks the form top to bottom and stops at the first problem.
///
/// `teacher_exists` is only consulted when a teacher was picked; a lookup
/// failure surfaces as `Err(Err(_))` so callers can tell it apart from a bad
/// form.
pub fn validate<E>(
    form: &PlacementForm,
    today: NaiveDate,
    teacher_exists: impl FnOnce(&str) -> Result<bool, E>,
) -> Result<Result<ValidForm, FieldError>, E> {
    let Some(student_id) = non_blank(&form.student_id) else {
        return Ok(Err(FieldError::new("studentId", "A student must be selected.")));
    };
    let Some(company_id) = non_blank(&form.company_id) else {
        return Ok(Err(FieldError::new("companyId", "A company must be selected.")));
    };

    let teacher_id = non_blank(&form.teacher_id);
    if let Some(tid) = teacher_id {
        if !teacher_exists(tid)? {
            return Ok(Err(FieldError::new(
                "teacherId",
                "The selected teacher is not valid.",
            )));
        }
    }

    if non_blank(&form.start).is_none() {
        return Ok(Err(FieldError::new("start", "Start date is required.")));
    }
    let Some(start) = parse_form_date(&form.start) else {
        return Ok(Err(FieldError::new("start", "Start date is not a valid date.")));
    };
    if let Err(message) = check_start(start, today) {
        return Ok(Err(FieldError::new("start", message)));
    }

    if non_blank(&form.end).is_none() {
        return Ok(Err(FieldError::new("end", "End date is required.")));
    }
    let Some(end) = parse_form_date(&form.end) else {
        return Ok(Err(FieldError::new("end", "End date is not a valid date.")));
    };
    if end < start {
        return Ok(Err(FieldError::new(
            "end",
            "End date must be on or after the start date.",
        )));
    }
    if let Err(message) = check_duration(start, end) {
        return Ok(Err(FieldError::new("end", message)));
    }

    Ok(Ok(ValidForm {
        student_id: student_id.to_string(),
        company_id: company_id.to_string(),
        teacher_id: teacher_id.map(str::to_string),
        start,
        end,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    fn form(start: &str, end: &str) -> PlacementForm {
        PlacementForm {
            student_id: "s1".into(),
            company_id: "c1".into(),
            teacher_id: String::new(),
            start: start.into(),
            end: end.into(),
        }
    }

    fn run(f: &PlacementForm, today: &str) -> Result<ValidForm, FieldError> {
        validate(f, d(today), |_| Ok::<_, Infallible>(true)).expect("infallible")
    }

    #[test]
    fn suggested_end_spans_ninety_days_inclusive() {
        assert_eq!(suggested_end(d("2025-07-01")), d("2025-09-28"));
        assert_eq!(inclusive_days(d("2025-07-01"), d("2025-09-28")), 90);
    }

    #[test]
    fn duration_message_reports_actual_days() {
        let e = check_duration(d("2025-07-01"), d("2025-09-27")).expect_err("89 days");
        assert!(e.contains("89"), "message was: {e}");
        assert!(check_duration(d("2025-07-01"), d("2025-09-28")).is_ok());
    }

    #[test]
    fn cutoff_is_july_first_of_current_year_either_side() {
        assert!(check_start(d("2025-06-15"), d("2025-05-01")).is_err());
        assert!(check_start(d("2025-06-15"), d("2025-08-01")).is_err());
        assert!(check_start(d("2025-07-01"), d("2025-08-01")).is_ok());
        assert!(check_start(d("2025-07-01"), d("2025-05-01")).is_ok());
        // Past the cutoff, an earlier date in the same year is still fine.
        assert!(check_start(d("2025-07-10"), d("2025-11-20")).is_ok());
        assert_eq!(start_cutoff(d("2025-12-31")), d("2025-07-01"));
    }

    #[test]
    fn min_start_hint_switches_to_today_after_cutoff() {
        assert_eq!(min_start_hint(d("2025-05-01")), d("2025-07-01"));
        assert_eq!(min_start_hint(d("2025-07-01")), d("2025-07-01"));
        assert_eq!(min_start_hint(d("2025-08-15")), d("2025-08-15"));
    }

    #[test]
    fn parse_accepts_date_and_datetime() {
        assert_eq!(parse_form_date(" 2025-07-01 "), Some(d("2025-07-01")));
        assert_eq!(parse_form_date("2025-07-01 00:00:00"), Some(d("2025-07-01")));
        assert_eq!(parse_form_date("01/07/2025"), None);
        assert_eq!(parse_form_date("2025-02-30"), None);
        assert_eq!(parse_form_date(""), None);
    }

    #[test]
    fn validation_stops_at_first_problem_in_field_order() {
        let mut f = form("", "");
        f.student_id = " ".into();
        f.company_id = String::new();
        assert_eq!(run(&f, "2025-08-01").expect_err("student").field, "studentId");

        f.student_id = "s1".into();
        assert_eq!(run(&f, "2025-08-01").expect_err("company").field, "companyId");

        f.company_id = "c1".into();
        assert_eq!(run(&f, "2025-08-01").expect_err("start").field, "start");

        f.start = "not-a-date".into();
        let e = run(&f, "2025-08-01").expect_err("bad start");
        assert_eq!(e.message, "Start date is not a valid date.");

        f.start = "2025-07-01".into();
        assert_eq!(run(&f, "2025-08-01").expect_err("end").field, "end");

        f.end = "2025-06-30".into();
        let e = run(&f, "2025-08-01").expect_err("order");
        assert!(e.message.contains("on or after the start"));
    }

    #[test]
    fn unknown_teacher_is_rejected_and_blank_teacher_is_none() {
        let mut f = form("2025-07-01", "2025-09-28");
        let ok = run(&f, "2025-08-01").expect("valid");
        assert_eq!(ok.teacher_id, None);

        f.teacher_id = "t-missing".into();
        let res = validate(&f, d("2025-08-01"), |_| Ok::<_, Infallible>(false)).expect("infallible");
        assert_eq!(res.expect_err("teacher").field, "teacherId");
    }

    #[test]
    fn teacher_lookup_failure_is_passed_through() {
        let mut f = form("2025-07-01", "2025-09-28");
        f.teacher_id = "t1".into();
        let res = validate(&f, d("2025-08-01"), |_| Err("db down"));
        assert_eq!(res, Err("db down"));
    }
}
