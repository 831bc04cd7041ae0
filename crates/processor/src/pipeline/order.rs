//! Timestamp ordering of events

use chrono::{DateTime, FixedOffset};
use ingest_types::Event;
use serde_json::Value;
use std::cmp::Ordering;

/// Total order on the `ts` field
///
/// Events without a timestamp sort first, then epoch-millisecond numbers,
/// then RFC 3339 strings by instant, then any other strings lexicographically.
/// Use with a stable sort so ties keep arrival order.
pub fn compare_by_time(a: &Event, b: &Event) -> Ordering {
    let (a, b) = (TimeKey::of(a), TimeKey::of(b));
    match (&a, &b) {
        (TimeKey::Millis(x), TimeKey::Millis(y)) => x.total_cmp(y),
        (TimeKey::Instant(x), TimeKey::Instant(y)) => x.cmp(y),
        (TimeKey::Text(x), TimeKey::Text(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    }
}

enum TimeKey<'a> {
    Missing,
    Millis(f64),
    Instant(DateTime<FixedOffset>),
    Text(&'a str),
}

impl<'a> TimeKey<'a> {
    fn of(event: &'a Event) -> Self {
        match event.ts() {
            Some(Value::Number(n)) => n.as_f64().map_or(TimeKey::Missing, TimeKey::Millis),
            Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
                Ok(instant) => TimeKey::Instant(instant),
                Err(_) => TimeKey::Text(s),
            },
            _ => TimeKey::Missing,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TimeKey::Missing => 0,
            TimeKey::Millis(_) => 1,
            TimeKey::Instant(_) => 2,
            TimeKey::Text(_) => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_types::fields;

    fn at(ts: Value) -> Event {
        Event::new("smbg").with(fields::TS, ts)
    }

    #[test]
    fn test_numbers_ascending() {
        assert_eq!(compare_by_time(&at(100.into()), &at(200.into())), Ordering::Less);
        assert_eq!(compare_by_time(&at(200.into()), &at(200.into())), Ordering::Equal);
    }

    #[test]
    fn test_rfc3339_compared_as_instants() {
        // 01:00 at +02:00 is 23:00 UTC the previous day
        let early = at("2015-03-02T01:00:00+02:00".into());
        let late = at("2015-03-01T23:30:00Z".into());
        assert_eq!(compare_by_time(&early, &late), Ordering::Less);
    }

    #[test]
    fn test_kind_ranking() {
        let missing = Event::new("smbg");
        let number = at(5.into());
        let instant = at("2015-03-01T00:00:00Z".into());
        let text = at("yesterday".into());

        let mut events = vec![text.clone(), instant.clone(), number.clone(), missing.clone()];
        events.sort_by(compare_by_time);
        assert_eq!(events, vec![missing, number, instant, text]);
    }
}
