//! ICS feed fetching and parsing.
//!
//! This module turns a published iCalendar feed (RFC 5545) into
//! [`ParsedEvent`](crate::event::ParsedEvent)s.

mod fetch;
mod parse;

pub use fetch::{HttpFetcher, IcsFetcher, fetch_and_parse_ics};
pub use parse::parse_ics;
