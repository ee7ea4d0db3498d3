use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};

/// PTT renders every timestamp in Asia/Taipei, which has no DST.
const SITE_UTC_OFFSET_HOURS: i64 = 8;

/// Current site-local wall-clock time, truncated to whole seconds.
pub fn site_now() -> NaiveDateTime {
    let now = to_site(Utc::now());
    now.with_nanosecond(0).unwrap_or(now)
}

/// Site-local time for a Unix timestamp (the one embedded in article slugs).
pub fn site_time_from_unix(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(to_site)
}

fn to_site(t: DateTime<Utc>) -> NaiveDateTime {
    t.naive_utc() + Duration::hours(SITE_UTC_OFFSET_HOURS)
}
