use chrono::NaiveDate;

/// Two-digit years at or above this value belong to the 1900s.
const CENTURY_PIVOT: i32 = 69;

/// Fast parse of a `"M/D/YY"` (or `"M/D/YYYY"`) column label into a date.
pub fn parse_date_label(s: &str) -> Option<NaiveDate> {
    let mut parts = s.trim().split('/');
    let month = parts.next()?;
    let day = parts.next()?;
    let year = parts.next()?;
    if parts.next().is_some() || !(1..=2).contains(&month.len()) || !(1..=2).contains(&day.len())
    {
        return None;
    }

    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    let year: i32 = match year.len() {
        2 => {
            let yy: i32 = year.parse().ok()?;
            if yy >= CENTURY_PIVOT {
                1900 + yy
            } else {
                2000 + yy
            }
        }
        4 => year.parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}
