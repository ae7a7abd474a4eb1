use chrono::NaiveDate;

/// Date stamped on every record of a monthly sheet: the first day of
/// `month` (1-based) in `year`. The sheets carry no day of their own.
pub fn month_stamp(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_of_month() {
        let d = month_stamp(2024, 8).expect("valid month");
        assert_eq!(d.format("%Y-%m-%d").to_string(), "2024-08-01");
        assert!(month_stamp(2024, 13).is_none());
        assert!(month_stamp(2024, 0).is_none());
    }
}
