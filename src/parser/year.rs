use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// A push timestamp as rendered: month/day hour:minute, no year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialStamp {
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl FromStr for PartialStamp {
    type Err = ();

    /// Accepts `M{1,2}/D{1,2} H{1,2}:M{1,2}`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (date, time) = s.trim().split_once(char::is_whitespace).ok_or(())?;
        let (month, day) = date.split_once('/').ok_or(())?;
        let (hour, minute) = time.trim().split_once(':').ok_or(())?;
        let stamp = PartialStamp {
            month: month.parse().map_err(|_| ())?,
            day: day.parse().map_err(|_| ())?,
            hour: hour.parse().map_err(|_| ())?,
            minute: minute.parse().map_err(|_| ())?,
        };
        let valid = (1..=12).contains(&stamp.month)
            && (1..=31).contains(&stamp.day)
            && stamp.hour < 24
            && stamp.minute < 60;
        if valid {
            Ok(stamp)
        } else {
            Err(())
        }
    }
}

impl PartialStamp {
    /// None when the day does not exist in that year (e.g. 02/29 off a leap year).
    pub fn with_year(&self, year: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)?.and_hms_opt(self.hour, self.minute, 0)
    }
}

/// Back-fills years onto pushes, fed strictly in on-page order.
///
/// Starts at the post's own year and month. A month going backwards means a
/// New Year passed between two pushes, so the year advances, but never past
/// the year the page was crawled in. Long silent gaps (a year or more
/// between pushes) are invisible to this and resolve one year short.
#[derive(Debug, Clone)]
pub struct YearResolver {
    year: i32,
    latest_month: u32,
    current_year: i32,
}

impl YearResolver {
    pub fn new(published: NaiveDateTime, crawled: NaiveDateTime) -> Self {
        YearResolver {
            year: published.year(),
            latest_month: published.month(),
            current_year: crawled.year(),
        }
    }

    pub fn resolve(&mut self, stamp: PartialStamp) -> Option<NaiveDateTime> {
        if stamp.month < self.latest_month && self.year < self.current_year {
            self.year += 1;
        }
        self.latest_month = stamp.month;
        stamp.with_year(self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn stamp(s: &str) -> PartialStamp {
        s.parse().unwrap()
    }

    #[test]
    fn parses_partial_stamps() {
        assert_eq!(
            stamp("11/06 22:04"),
            PartialStamp { month: 11, day: 6, hour: 22, minute: 4 }
        );
        assert_eq!(stamp("1/2 3:4"), PartialStamp { month: 1, day: 2, hour: 3, minute: 4 });
        assert!("06/22".parse::<PartialStamp>().is_err());
        assert!("13/01 10:00".parse::<PartialStamp>().is_err());
        assert!("12/01 24:00".parse::<PartialStamp>().is_err());
    }

    #[test]
    fn december_to_february_rolls_over() {
        let mut r = YearResolver::new(at(2019, 12, 20, 10, 0), at(2021, 1, 1, 0, 0));
        assert_eq!(r.resolve(stamp("12/20 10:05")), Some(at(2019, 12, 20, 10, 5)));
        assert_eq!(r.resolve(stamp("12/31 23:59")), Some(at(2019, 12, 31, 23, 59)));
        assert_eq!(r.resolve(stamp("02/01 08:00")), Some(at(2020, 2, 1, 8, 0)));
        assert_eq!(r.resolve(stamp("02/03 08:00")), Some(at(2020, 2, 3, 8, 0)));
    }

    #[test]
    fn never_past_crawl_year() {
        let mut r = YearResolver::new(at(2020, 12, 30, 10, 0), at(2020, 12, 31, 12, 0));
        assert_eq!(r.resolve(stamp("01/01 00:01")), Some(at(2020, 1, 1, 0, 1)));
    }

    #[test]
    fn monotonic_across_several_years() {
        let mut r = YearResolver::new(at(2017, 11, 1, 0, 0), at(2020, 6, 1, 0, 0));
        let years: Vec<i32> = ["11/02 00:00", "03/01 00:00", "10/01 00:00", "01/05 00:00"]
            .iter()
            .map(|s| r.resolve(stamp(s)).unwrap().year())
            .collect();
        assert_eq!(years, vec![2017, 2018, 2018, 2019]);
    }

    #[test]
    fn impossible_day_is_none() {
        let mut r = YearResolver::new(at(2019, 2, 1, 0, 0), at(2019, 3, 1, 0, 0));
        assert_eq!(r.resolve(stamp("02/29 12:00")), None);
        // state still advanced to February
        assert_eq!(r.resolve(stamp("02/28 12:00")), Some(at(2019, 2, 28, 12, 0)));
    }
}
