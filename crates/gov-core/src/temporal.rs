//! # Temporal Helpers
//!
//! Timestamps are stored and compared in UTC. Local time only matters for
//! one thing: the scheduler fires at *local* midnight of the tenant's zone,
//! so that arithmetic is done on the zone's calendar, never as a fixed
//! offset from UTC. A day in a DST zone can last 23 or 25 hours, and
//! some zones have historically skipped midnight itself.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::TimezoneError;

/// Upper bound on how far past 00:00 a DST gap can push the first
/// existing local instant of a day.
const MAX_GAP_MINUTES: i64 = 180;

/// Resolve an IANA timezone identifier.
pub fn parse_timezone(zone: &str) -> Result<Tz, TimezoneError> {
    zone.parse::<Tz>()
        .map_err(|_| TimezoneError::Unknown(zone.to_string()))
}

/// Accept only resolvable IANA identifiers.
pub fn validate_timezone(zone: &str) -> Result<(), TimezoneError> {
    parse_timezone(zone).map(|_| ())
}

/// Parse an RFC 3339 timestamp into UTC. Returns `None` on malformed input.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The local calendar date of `now` in `tz`.
pub fn local_date(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Return the next local 00:00:00 instant in `tz` strictly after `now`.
///
/// If midnight is skipped on that date (DST gap at 00:00), the first local
/// instant that exists on the date is returned. If midnight occurs twice
/// (fall-back at 00:00), the earlier instant is returned.
pub fn next_midnight(tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimezoneError> {
    let today = local_date(tz, now);
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| unresolvable(tz, today))?;
    first_instant_of(tz, tomorrow)
}

/// [`next_midnight`] for a zone given by identifier.
pub fn next_midnight_in(zone: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimezoneError> {
    next_midnight(parse_timezone(zone)?, now)
}

fn first_instant_of(tz: Tz, date: NaiveDate) -> Result<DateTime<Utc>, TimezoneError> {
    let midnight: NaiveDateTime = date.and_time(chrono::NaiveTime::MIN);
    for minutes in 0..=MAX_GAP_MINUTES {
        let candidate = midnight + Duration::minutes(minutes);
        if let Some(local) = tz.from_local_datetime(&candidate).earliest() {
            return Ok(local.with_timezone(&Utc));
        }
    }
    Err(unresolvable(tz, date))
}

fn unresolvable(tz: Tz, date: NaiveDate) -> TimezoneError {
    TimezoneError::Unresolvable {
        zone: tz.name().to_string(),
        date: date.to_string(),
    }
}
