//! ICS feed parsing using the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};
use tracing::debug;

use crate::constants::UNTITLED_EVENT;
use crate::error::{CoreError, CoreResult};
use crate::event::{EventStatus, ParsedEvent};

const PARSE_FAILED: &str = "Failed to parse calendar data";

/// Parse a whole ICS document into its events, in document order.
///
/// VEVENTs without a UID or a start time are skipped. A document that is not
/// a calendar at all fails with [`CoreError::Parse`].
pub fn parse_ics(content: &str) -> CoreResult<Vec<ParsedEvent>> {
    let content = content.trim_start_matches('\u{feff}');
    if !content
        .trim_start()
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"))
    {
        return Err(CoreError::Parse(PARSE_FAILED.to_string()));
    }

    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| {
        debug!(error = %e, "ics document rejected by parser");
        CoreError::Parse(PARSE_FAILED.to_string())
    })?;

    let mut vevents = Vec::new();
    collect_vevents(&calendar.components, &mut vevents);

    let events = vevents.into_iter().filter_map(parse_vevent).collect();
    Ok(events)
}

/// Walk the component tree depth-first, keeping document order.
fn collect_vevents<'a, 'c>(components: &'c [Component<'a>], out: &mut Vec<&'c Component<'a>>) {
    for component in components {
        if component.name.as_ref().eq_ignore_ascii_case("VEVENT") {
            out.push(component);
        } else {
            collect_vevents(&component.components, out);
        }
    }
}

fn parse_vevent(vevent: &Component<'_>) -> Option<ParsedEvent> {
    // Required fields
    let Some(uid) = prop(vevent, "UID")
        .map(|p| p.val.as_ref().to_string())
        .filter(|uid| !uid.trim().is_empty())
    else {
        debug!("skipping VEVENT without UID");
        return None;
    };

    let Some(start) = prop(vevent, "DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
    else {
        debug!(uid, "skipping VEVENT without a usable DTSTART");
        return None;
    };

    let all_day = matches!(start, DatePerhapsTime::Date(_));
    let start_time = to_utc(start);

    let end_time = prop(vevent, "DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_utc)
        .or_else(|| {
            prop(vevent, "DURATION")
                .and_then(|p| parse_duration(p.val.as_ref()))
                .map(|d| start_time + d)
        })
        .unwrap_or(start_time);

    let title = text_prop(vevent, "SUMMARY").unwrap_or_else(|| UNTITLED_EVENT.to_string());
    let description = text_prop(vevent, "DESCRIPTION");
    let location = text_prop(vevent, "LOCATION");

    let status = prop(vevent, "STATUS")
        .and_then(|p| EventStatus::from_ics_str(p.val.as_ref()));

    let recurrence_rule = prop(vevent, "RRULE")
        .map(|p| p.val.as_ref().trim().to_string())
        .filter(|r| !r.is_empty());

    Some(ParsedEvent {
        uid,
        title,
        description,
        location,
        start_time,
        end_time,
        all_day,
        status,
        recurrence_rule,
    })
}

/// First property called `name`. Property names are case-insensitive.
fn prop<'c, 'a>(component: &'c Component<'a>, name: &str) -> Option<&'c Property<'a>> {
    component
        .properties
        .iter()
        .find(|p| p.name.as_ref().eq_ignore_ascii_case(name))
}

/// Read a TEXT property, unescaped. Empty values count as absent.
///
/// The parser already unescapes TEXT values of upper-case property names,
/// so only the other spellings are unescaped here.
fn text_prop(vevent: &Component<'_>, name: &str) -> Option<String> {
    prop(vevent, name)
        .map(|p| {
            let val = p.val.as_ref();
            if p.name.as_ref().chars().any(char::is_lowercase) {
                unescape_text(val)
            } else {
                val.to_string()
            }
        })
        .filter(|v| !v.trim().is_empty())
}

/// Convert icalendar's DatePerhapsTime to a UTC instant.
///
/// Dates become midnight UTC, floating times are read as UTC, and zoned
/// times are resolved through the IANA database when the TZID is known.
fn to_utc(dpt: DatePerhapsTime) -> DateTime<Utc> {
    match dpt {
        DatePerhapsTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => dt,
            CalendarDateTime::Floating(naive) => naive.and_utc(),
            CalendarDateTime::WithTimezone { date_time, tzid } => resolve_zoned(date_time, &tzid),
        },
    }
}

fn resolve_zoned(naive: NaiveDateTime, tzid: &str) -> DateTime<Utc> {
    let Ok(tz) = tzid.trim().trim_matches('"').parse::<Tz>() else {
        debug!(tzid, "unknown TZID, reading time as UTC");
        return naive.and_utc();
    };

    // A wall time inside a DST gap does not exist; shift past the gap.
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// Parse a DURATION value (P1D, PT1H30M). Negative durations are ignored.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.starts_with('-') {
        return None;
    }

    let duration = iso8601::duration(value.trim_start_matches('+')).ok()?;
    let std_duration: std::time::Duration = duration.into();
    Duration::from_std(std_duration).ok()
}

/// Undo RFC 5545 TEXT escaping (`\n`, `\,`, `\;`, `\\`).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
