//! The location and date a formula is evaluated against.

use std::fmt;

use chrono::{Datelike, NaiveDate, TimeDelta};
use chrono_tz::Tz;

use super::error::ContextError;
use crate::astro::{Observer, SolarDay};
use crate::time::{self, ClockTime};

/// Meteorological season, by month and hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Northern months Mar-May are spring; the south is shifted by six months.
    pub fn for_month(month: u32, latitude: f64) -> Self {
        let north = match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Autumn,
            _ => Season::Winter,
        };
        if latitude >= 0.0 {
            north
        } else {
            match north {
                Season::Spring => Season::Autumn,
                Season::Summer => Season::Winter,
                Season::Autumn => Season::Spring,
                Season::Winter => Season::Summer,
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Calendar values derived from the context for use in conditions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionVars {
    pub month: u32,
    pub day: u32,
    pub day_of_year: u32,
    pub season: Season,
    /// Visible sunrise to visible sunset; `None` in polar day or night.
    pub day_length: Option<TimeDelta>,
}

/// Immutable inputs for one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    date: NaiveDate,
    latitude: f64,
    longitude: f64,
    elevation: f64,
    timezone: Tz,
}

impl EvaluationContext {
    pub fn new(
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        elevation: f64,
        timezone: Tz,
    ) -> Result<Self, ContextError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(ContextError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(ContextError::Longitude(longitude));
        }
        Ok(Self {
            date,
            latitude,
            longitude,
            elevation: elevation.max(0.0),
            timezone,
        })
    }

    /// Same as [`EvaluationContext::new`] with an IANA timezone name.
    pub fn with_timezone_name(
        date: NaiveDate,
        latitude: f64,
        longitude: f64,
        elevation: f64,
        timezone: &str,
    ) -> Result<Self, ContextError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| ContextError::UnknownTimezone(timezone.to_string()))?;
        Self::new(date, latitude, longitude, elevation, tz)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn elevation(&self) -> f64 {
        self.elevation
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn observer(&self) -> Observer {
        Observer::new(self.latitude, self.longitude, self.elevation)
    }

    pub fn solar_day(&self) -> SolarDay {
        SolarDay::new(self.date, self.observer())
    }

    /// Localize minutes after UTC midnight of the context date.
    pub fn clock(&self, minutes: f64) -> Option<ClockTime> {
        ClockTime::from_utc_minutes(self.date, minutes, self.timezone)
    }

    pub fn season(&self) -> Season {
        Season::for_month(self.date.month(), self.latitude)
    }

    pub fn condition_vars(&self) -> ConditionVars {
        ConditionVars {
            month: self.date.month(),
            day: self.date.day(),
            day_of_year: self.date.ordinal(),
            season: self.season(),
            day_length: self.solar_day().day_length(true).and_then(time::minutes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn seasons_by_hemisphere() {
        assert_eq!(Season::for_month(1, 40.7), Season::Winter);
        assert_eq!(Season::for_month(4, 40.7), Season::Spring);
        assert_eq!(Season::for_month(7, 31.7), Season::Summer);
        assert_eq!(Season::for_month(10, 31.7), Season::Autumn);
        assert_eq!(Season::for_month(1, -33.9), Season::Summer);
        assert_eq!(Season::for_month(7, -33.9), Season::Winter);
    }

    #[test]
    fn rejects_bad_coordinates() {
        assert_eq!(
            EvaluationContext::with_timezone_name(date(2025, 1, 1), 91.0, 0.0, 0.0, "UTC"),
            Err(ContextError::Latitude(91.0))
        );
        assert_eq!(
            EvaluationContext::with_timezone_name(date(2025, 1, 1), 0.0, 181.0, 0.0, "UTC"),
            Err(ContextError::Longitude(181.0))
        );
        assert_eq!(
            EvaluationContext::with_timezone_name(date(2025, 1, 1), 0.0, 0.0, 0.0, "Mars/Olympus"),
            Err(ContextError::UnknownTimezone("Mars/Olympus".into()))
        );
    }

    #[test]
    fn condition_vars_new_york_january() {
        let ctx = EvaluationContext::with_timezone_name(
            date(2025, 1, 15),
            40.7128,
            -74.006,
            0.0,
            "America/New_York",
        )
        .unwrap();
        let vars = ctx.condition_vars();
        assert_eq!(vars.month, 1);
        assert_eq!(vars.day, 15);
        assert_eq!(vars.day_of_year, 15);
        assert_eq!(vars.season, Season::Winter);
        let hours = vars.day_length.unwrap().num_minutes() as f64 / 60.0;
        assert!(hours > 9.0 && hours < 10.0, "{hours}");
    }

    #[test]
    fn polar_night_has_no_day_length() {
        let ctx =
            EvaluationContext::with_timezone_name(date(2025, 12, 21), 78.22, 15.65, 0.0, "Arctic/Longyearbyen")
                .unwrap();
        assert!(ctx.condition_vars().day_length.is_none());
    }
}
