//! Date range for listing stored events.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::constants::DEFAULT_LIST_DAYS;

/// Date range for filtering events.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl Default for DateRange {
    /// Default range: ±DEFAULT_LIST_DAYS from now
    fn default() -> Self {
        Self::around(Utc::now())
    }
}

impl DateRange {
    /// ±DEFAULT_LIST_DAYS around `now`.
    pub fn around(now: DateTime<Utc>) -> Self {
        DateRange {
            from: Some(now - Duration::days(DEFAULT_LIST_DAYS)),
            to: Some(now + Duration::days(DEFAULT_LIST_DAYS)),
        }
    }

    /// Build a range from command-line arguments.
    /// - `from`: "start" for unbounded, or YYYY-MM-DD (start of day)
    /// - `to`: "end" for unbounded, or YYYY-MM-DD (end of day)
    ///
    /// Missing bounds default to ±DEFAULT_LIST_DAYS from now.
    pub fn from_args(from: Option<&str>, to: Option<&str>) -> Result<Self, String> {
        let default = Self::default();

        let from_dt = match from {
            Some("start") => None,
            Some(s) => Some(parse_date(s, NaiveTime::MIN)?),
            None => default.from,
        };

        let to_dt = match to {
            Some("end") => None,
            Some(s) => Some(parse_date(s, end_of_day())?),
            None => default.to,
        };

        if let (Some(from), Some(to)) = (from_dt, to_dt)
            && from > to
        {
            return Err(format!(
                "Start date {} is after end date {}",
                from.date_naive(),
                to.date_naive()
            ));
        }

        Ok(DateRange {
            from: from_dt,
            to: to_dt,
        })
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

/// Parse YYYY-MM-DD at the given time of day in UTC
fn parse_date(s: &str, time: NaiveTime) -> Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Expected YYYY-MM-DD", s))?;
    Ok(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_explicit_bounds_cover_whole_days() {
        let range = DateRange::from_args(Some("2024-03-01"), Some("2024-03-31")).unwrap();
        assert_eq!(range.from, Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(range.to, Some(Utc.with_ymd_and_hms(2024, 3, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_unbounded_keywords() {
        let range = DateRange::from_args(Some("start"), Some("end")).unwrap();
        assert!(range.from.is_none());
        assert!(range.to.is_none());
    }

    #[test]
    fn test_defaults_span_list_window() {
        let range = DateRange::from_args(None, None).unwrap();
        let (from, to) = (range.from.unwrap(), range.to.unwrap());
        assert_eq!((to - from).num_days(), 2 * DEFAULT_LIST_DAYS);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(DateRange::from_args(Some("03/01/2024"), None).is_err());
        assert!(DateRange::from_args(Some("2024-03-10"), Some("2024-03-01")).is_err());
    }
}
