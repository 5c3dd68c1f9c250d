//! Clock-time representation for computed zmanim.
//!
//! Every formula result is a [`ClockTime`]: an instant at millisecond
//! resolution, carried in the location's timezone. The astronomy engine
//! works in fractional minutes from UTC midnight; conversion to a
//! `ClockTime` happens once, at the boundary, by rounding to the nearest
//! millisecond so repeated evaluations stay bit-identical.

use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Milliseconds in one minute.
pub const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Convert fractional minutes to a millisecond-resolution duration.
///
/// `None` when the value is not finite or does not fit a `TimeDelta`.
pub fn minutes(value: f64) -> Option<TimeDelta> {
    from_millis(value * MILLIS_PER_MINUTE)
}

/// Express a duration as fractional minutes.
pub fn as_minutes(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / MILLIS_PER_MINUTE
}

/// Scale a duration by a real factor, rounding to the millisecond.
pub fn scale(delta: TimeDelta, factor: f64) -> Option<TimeDelta> {
    from_millis(delta.num_milliseconds() as f64 * factor)
}

fn from_millis(millis: f64) -> Option<TimeDelta> {
    let millis = millis.round();
    // 2^63 is the first f64 that no longer fits an i64.
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
}

/// A zoned instant produced by evaluating a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    instant: DateTime<Tz>,
}

impl ClockTime {
    /// Wrap an instant that is already in the target timezone.
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self { instant }
    }

    /// Build a time from fractional minutes after UTC midnight of `date`.
    ///
    /// The value may be negative or exceed a day; far-east and far-west
    /// longitudes put local events on the neighbouring UTC day.
    pub fn from_utc_minutes(date: NaiveDate, offset_minutes: f64, tz: Tz) -> Option<Self> {
        let midnight = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        let instant = midnight.checked_add_signed(minutes(offset_minutes)?)?;
        Some(Self {
            instant: instant.with_timezone(&tz),
        })
    }

    /// The underlying zoned instant.
    pub fn instant(&self) -> DateTime<Tz> {
        self.instant
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.instant.timestamp_millis()
    }

    /// Halfway between two times, in the timezone of `self`.
    pub fn midpoint(self, other: ClockTime) -> Option<ClockTime> {
        let half = TimeDelta::try_milliseconds((other - self).num_milliseconds() / 2)?;
        self.checked_add(half)
    }

    /// `self + delta`, or `None` past the representable range.
    pub fn checked_add(self, delta: TimeDelta) -> Option<ClockTime> {
        self.instant
            .checked_add_signed(delta)
            .map(|instant| ClockTime { instant })
    }

    /// `self - delta`, or `None` past the representable range.
    pub fn checked_sub(self, delta: TimeDelta) -> Option<ClockTime> {
        self.instant
            .checked_sub_signed(delta)
            .map(|instant| ClockTime { instant })
    }

    /// Local wall-clock time as `HH:MM:SS`.
    pub fn format_exact(&self) -> String {
        self.instant.format("%H:%M:%S").to_string()
    }

    /// Local wall-clock time as `HH:MM`, rounded with `mode`.
    pub fn format_rounded(&self, mode: RoundingMode) -> String {
        self.rounded(mode).instant.format("%H:%M").to_string()
    }

    /// Round to a whole minute.
    pub fn rounded(&self, mode: RoundingMode) -> ClockTime {
        let sub_minute = TimeDelta::seconds(self.instant.second() as i64)
            + TimeDelta::nanoseconds(self.instant.nanosecond() as i64);
        let Some(floor) = self.instant.checked_sub_signed(sub_minute) else {
            return *self;
        };
        let up = match mode {
            RoundingMode::Floor => false,
            RoundingMode::Ceil => sub_minute > TimeDelta::zero(),
            RoundingMode::Math => self.instant.second() >= 30,
        };
        let instant = if up {
            floor.checked_add_signed(TimeDelta::minutes(1)).unwrap_or(floor)
        } else {
            floor
        };
        ClockTime { instant }
    }
}

impl Sub for ClockTime {
    type Output = TimeDelta;

    fn sub(self, rhs: ClockTime) -> TimeDelta {
        self.instant.signed_duration_since(rhs.instant)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instant.format("%Y-%m-%d %H:%M:%S%.3f %Z"))
    }
}

/// How a computed time is rounded for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    /// Drop the seconds.
    Floor,
    /// Any seconds push to the next minute.
    Ceil,
    /// Thirty seconds or more rounds up.
    #[default]
    Math,
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "floor" => Ok(Self::Floor),
            "ceil" => Ok(Self::Ceil),
            "math" => Ok(Self::Math),
            other => Err(format!(
                "unknown rounding mode '{other}' (expected floor, ceil or math)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> ClockTime {
        let tz: Tz = "Asia/Jerusalem".parse().unwrap();
        ClockTime::new(tz.with_ymd_and_hms(2025, 6, 21, h, m, s).unwrap())
    }

    #[test]
    fn minutes_round_to_millis() {
        assert_eq!(minutes(1.5).unwrap().num_milliseconds(), 90_000);
        assert_eq!(minutes(-0.25).unwrap().num_milliseconds(), -15_000);
        assert!((as_minutes(minutes(72.0).unwrap()) - 72.0).abs() < 1e-9);
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert_eq!(minutes(999_999_999_999_999.0), None);
        assert_eq!(minutes(f64::NAN), None);
        assert_eq!(minutes(f64::NEG_INFINITY), None);
        assert_eq!(scale(TimeDelta::minutes(10), 1e20), None);
        assert_eq!(scale(TimeDelta::minutes(10), -1e20), None);
        assert_eq!(scale(TimeDelta::minutes(10), 0.5), Some(TimeDelta::minutes(5)));
    }

    #[test]
    fn checked_arithmetic_stops_at_range_end() {
        let a = at(12, 0, 0);
        let huge = TimeDelta::try_milliseconds(i64::MAX / 2).unwrap();
        assert_eq!(a.checked_add(huge), None);
        assert_eq!(a.checked_sub(huge), None);
        assert_eq!(
            a.checked_add(TimeDelta::minutes(1)).unwrap().format_exact(),
            "12:01:00"
        );
    }

    #[test]
    fn from_utc_minutes_localizes() {
        let tz: Tz = "Asia/Jerusalem".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 21).unwrap();
        // 16:00 UTC is 19:00 IDT
        let t = ClockTime::from_utc_minutes(date, 960.0, tz).unwrap();
        assert_eq!(t.format_exact(), "19:00:00");
    }

    #[test]
    fn negative_offset_lands_on_previous_utc_day() {
        let tz: Tz = "Australia/Sydney".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let t = ClockTime::from_utc_minutes(date, -300.0, tz).unwrap();
        assert_eq!(t.instant().with_timezone(&Utc).format("%d %H:%M").to_string(), "09 19:00");
    }

    #[test]
    fn time_arithmetic() {
        let a = at(19, 30, 0);
        let b = a.checked_sub(TimeDelta::minutes(18)).unwrap();
        assert_eq!(b.format_exact(), "19:12:00");
        assert_eq!(a - b, TimeDelta::minutes(18));
        assert!(b < a);
    }

    #[test]
    fn midpoint_is_mean() {
        let a = at(19, 0, 0);
        let b = at(20, 0, 1);
        let mid = a.midpoint(b).unwrap();
        assert_eq!(mid.format_exact(), "19:30:00");
        assert_eq!(a.midpoint(b), b.midpoint(a));
    }

    #[test]
    fn rounding_modes() {
        let t = at(5, 41, 30);
        assert_eq!(t.format_rounded(RoundingMode::Floor), "05:41");
        assert_eq!(t.format_rounded(RoundingMode::Ceil), "05:42");
        assert_eq!(t.format_rounded(RoundingMode::Math), "05:42");

        let t = at(5, 41, 29);
        assert_eq!(t.format_rounded(RoundingMode::Math), "05:41");

        let exact = at(5, 41, 0);
        assert_eq!(exact.format_rounded(RoundingMode::Ceil), "05:41");
    }

    #[test]
    fn rounding_mode_from_str() {
        assert_eq!("floor".parse::<RoundingMode>(), Ok(RoundingMode::Floor));
        assert_eq!("math".parse::<RoundingMode>(), Ok(RoundingMode::Math));
        assert!("nearest".parse::<RoundingMode>().is_err());
    }
}
