//! The closed vocabulary of the formula language.
//!
//! Every name a formula may use is one of these enums. The parser turns
//! words into variants; anything that fails to resolve is reported by the
//! validator instead of surfacing as a lookup miss at evaluation time.

use std::fmt;

pub use crate::astro::SolarEvent as Primitive;
use crate::astro::Horizon;

/// How many arguments a function accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{k}"),
            Arity::Range(lo, hi) => write!(f, "{lo} to {hi}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
        }
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Solar,
    SeasonalSolar,
    ProportionalHours,
    ProportionalMinutes,
    Midpoint,
    FirstValid,
    EarlierOf,
    LaterOf,
}

impl Function {
    pub const ALL: [Function; 8] = [
        Function::Solar,
        Function::SeasonalSolar,
        Function::ProportionalHours,
        Function::ProportionalMinutes,
        Function::Midpoint,
        Function::FirstValid,
        Function::EarlierOf,
        Function::LaterOf,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Solar => "solar",
            Function::SeasonalSolar => "seasonal_solar",
            Function::ProportionalHours => "proportional_hours",
            Function::ProportionalMinutes => "proportional_minutes",
            Function::Midpoint => "midpoint",
            Function::FirstValid => "first_valid",
            Function::EarlierOf => "earlier_of",
            Function::LaterOf => "later_of",
        }
    }

    pub fn arity(self) -> Arity {
        match self {
            Function::ProportionalMinutes => Arity::Range(2, 3),
            Function::FirstValid => Arity::AtLeast(2),
            _ => Arity::Exact(2),
        }
    }

    /// Call signature shown in reference listings.
    pub fn signature(self) -> &'static str {
        match self {
            Function::Solar => "solar(degrees, direction)",
            Function::SeasonalSolar => "seasonal_solar(degrees, direction)",
            Function::ProportionalHours => "proportional_hours(hours, base)",
            Function::ProportionalMinutes => "proportional_minutes(minutes, direction[, base])",
            Function::Midpoint => "midpoint(time, time)",
            Function::FirstValid => "first_valid(time, time, ...)",
            Function::EarlierOf => "earlier_of(time, time)",
            Function::LaterOf => "later_of(time, time)",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Function::Solar => "time the sun is the given degrees below the horizon",
            Function::SeasonalSolar => {
                "equinox offset of a solar angle, scaled by today's day length"
            }
            Function::ProportionalHours => "start of day plus temporal hours of the base's day",
            Function::ProportionalMinutes => {
                "minutes scaled by day length over 720, before sunrise or after sunset"
            }
            Function::Midpoint => "halfway between two times",
            Function::FirstValid => "first argument whose solar events exist",
            Function::EarlierOf => "the earlier of two times",
            Function::LaterOf => "the later of two times",
        }
    }

    /// Functions whose direction argument is limited to the four sunrise/sunset anchors.
    pub fn restricts_direction(self) -> bool {
        matches!(self, Function::SeasonalSolar | Function::ProportionalMinutes)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anchor and polarity for angle and offset functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    BeforeVisibleSunrise,
    AfterVisibleSunrise,
    BeforeVisibleSunset,
    AfterVisibleSunset,
    BeforeGeometricSunrise,
    AfterGeometricSunrise,
    BeforeGeometricSunset,
    AfterGeometricSunset,
    BeforeNoon,
    AfterNoon,
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::BeforeVisibleSunrise,
        Direction::AfterVisibleSunrise,
        Direction::BeforeVisibleSunset,
        Direction::AfterVisibleSunset,
        Direction::BeforeGeometricSunrise,
        Direction::AfterGeometricSunrise,
        Direction::BeforeGeometricSunset,
        Direction::AfterGeometricSunset,
        Direction::BeforeNoon,
        Direction::AfterNoon,
    ];

    /// Resolve a direction; the short forms alias the visible anchors.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "before_sunrise" => Some(Direction::BeforeVisibleSunrise),
            "after_sunrise" => Some(Direction::AfterVisibleSunrise),
            "after_sunset" => Some(Direction::AfterVisibleSunset),
            _ => Self::ALL.into_iter().find(|d| d.name() == name),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::BeforeVisibleSunrise => "before_visible_sunrise",
            Direction::AfterVisibleSunrise => "after_visible_sunrise",
            Direction::BeforeVisibleSunset => "before_visible_sunset",
            Direction::AfterVisibleSunset => "after_visible_sunset",
            Direction::BeforeGeometricSunrise => "before_geometric_sunrise",
            Direction::AfterGeometricSunrise => "after_geometric_sunrise",
            Direction::BeforeGeometricSunset => "before_geometric_sunset",
            Direction::AfterGeometricSunset => "after_geometric_sunset",
            Direction::BeforeNoon => "before_noon",
            Direction::AfterNoon => "after_noon",
        }
    }

    /// Morning or evening half of the day this direction points into.
    pub fn horizon(self) -> Horizon {
        match self {
            Direction::BeforeVisibleSunrise
            | Direction::AfterVisibleSunrise
            | Direction::BeforeGeometricSunrise
            | Direction::AfterGeometricSunrise
            | Direction::BeforeNoon => Horizon::Rising,
            Direction::BeforeVisibleSunset
            | Direction::AfterVisibleSunset
            | Direction::BeforeGeometricSunset
            | Direction::AfterGeometricSunset
            | Direction::AfterNoon => Horizon::Setting,
        }
    }

    /// Whether the anchor is the refraction-corrected sunrise/sunset.
    pub fn is_visible(self) -> bool {
        !matches!(
            self,
            Direction::BeforeGeometricSunrise
                | Direction::AfterGeometricSunrise
                | Direction::BeforeGeometricSunset
                | Direction::AfterGeometricSunset
        )
    }

    /// Allowed for `seasonal_solar` and `proportional_minutes`.
    pub fn is_outer_anchor(self) -> bool {
        matches!(
            self,
            Direction::BeforeVisibleSunrise
                | Direction::AfterVisibleSunset
                | Direction::BeforeGeometricSunrise
                | Direction::AfterGeometricSunset
        )
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a base's day starts and ends relative to sunrise and sunset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayBounds {
    /// Fixed minutes before visible sunrise and after visible sunset.
    Offset { before: f64, after: f64 },
    /// A fraction of the visible day before sunrise and after sunset.
    Proportional { fraction: f64 },
    /// Sun the given degrees below the horizon, morning and evening.
    Depression { degrees: f64 },
}

/// Named day-boundary opinions used by `proportional_hours`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Base {
    Gra,
    Mga60,
    Mga72,
    Mga90,
    Mga96,
    Mga120,
    Mga72Zmanis,
    Mga90Zmanis,
    Mga96Zmanis,
    Mga16_1,
    Mga18,
    Mga19_8,
    Mga26,
    BaalHatanya,
    AteretTorah,
}

impl Base {
    pub const ALL: [Base; 15] = [
        Base::Gra,
        Base::Mga60,
        Base::Mga72,
        Base::Mga90,
        Base::Mga96,
        Base::Mga120,
        Base::Mga72Zmanis,
        Base::Mga90Zmanis,
        Base::Mga96Zmanis,
        Base::Mga16_1,
        Base::Mga18,
        Base::Mga19_8,
        Base::Mga26,
        Base::BaalHatanya,
        Base::AteretTorah,
    ];

    /// Resolve a base name; plain `mga` is `mga_72`.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "mga" {
            return Some(Base::Mga72);
        }
        Self::ALL.into_iter().find(|b| b.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Base::Gra => "gra",
            Base::Mga60 => "mga_60",
            Base::Mga72 => "mga_72",
            Base::Mga90 => "mga_90",
            Base::Mga96 => "mga_96",
            Base::Mga120 => "mga_120",
            Base::Mga72Zmanis => "mga_72_zmanis",
            Base::Mga90Zmanis => "mga_90_zmanis",
            Base::Mga96Zmanis => "mga_96_zmanis",
            Base::Mga16_1 => "mga_16_1",
            Base::Mga18 => "mga_18",
            Base::Mga19_8 => "mga_19_8",
            Base::Mga26 => "mga_26",
            Base::BaalHatanya => "baal_hatanya",
            Base::AteretTorah => "ateret_torah",
        }
    }

    pub fn bounds(self) -> DayBounds {
        let fixed = |m: f64| DayBounds::Offset {
            before: m,
            after: m,
        };
        match self {
            Base::Gra => fixed(0.0),
            Base::Mga60 => fixed(60.0),
            Base::Mga72 => fixed(72.0),
            Base::Mga90 => fixed(90.0),
            Base::Mga96 => fixed(96.0),
            Base::Mga120 => fixed(120.0),
            Base::Mga72Zmanis => DayBounds::Proportional { fraction: 1.0 / 10.0 },
            Base::Mga90Zmanis => DayBounds::Proportional { fraction: 1.0 / 8.0 },
            Base::Mga96Zmanis => DayBounds::Proportional { fraction: 1.0 / 7.5 },
            Base::Mga16_1 => DayBounds::Depression { degrees: 16.1 },
            Base::Mga18 => DayBounds::Depression { degrees: 18.0 },
            Base::Mga19_8 => DayBounds::Depression { degrees: 19.8 },
            Base::Mga26 => DayBounds::Depression { degrees: 26.0 },
            Base::BaalHatanya => DayBounds::Depression { degrees: 1.583 },
            Base::AteretTorah => DayBounds::Offset {
                before: 0.0,
                after: 40.0,
            },
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Base::Gra => "sunrise to sunset",
            Base::Mga60 => "60 minutes before sunrise to 60 after sunset",
            Base::Mga72 => "72 minutes before sunrise to 72 after sunset (alias: mga)",
            Base::Mga90 => "90 minutes before sunrise to 90 after sunset",
            Base::Mga96 => "96 minutes before sunrise to 96 after sunset",
            Base::Mga120 => "120 minutes before sunrise to 120 after sunset",
            Base::Mga72Zmanis => "a tenth of the day before sunrise and after sunset",
            Base::Mga90Zmanis => "an eighth of the day before sunrise and after sunset",
            Base::Mga96Zmanis => "day length over 7.5 before sunrise and after sunset",
            Base::Mga16_1 => "sun 16.1 degrees below the horizon, morning to evening",
            Base::Mga18 => "sun 18 degrees below the horizon, morning to evening",
            Base::Mga19_8 => "sun 19.8 degrees below the horizon, morning to evening",
            Base::Mga26 => "sun 26 degrees below the horizon, morning to evening",
            Base::BaalHatanya => "sun 1.583 degrees below the horizon, morning to evening",
            Base::AteretTorah => "sunrise to 40 minutes after sunset",
        }
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Variables available inside conditional guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionVar {
    Latitude,
    Longitude,
    DayLength,
    Month,
    Day,
    DayOfYear,
    Date,
    Season,
}

impl ConditionVar {
    pub const ALL: [ConditionVar; 8] = [
        ConditionVar::Latitude,
        ConditionVar::Longitude,
        ConditionVar::DayLength,
        ConditionVar::Month,
        ConditionVar::Day,
        ConditionVar::DayOfYear,
        ConditionVar::Date,
        ConditionVar::Season,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            ConditionVar::Latitude => "latitude",
            ConditionVar::Longitude => "longitude",
            ConditionVar::DayLength => "day_length",
            ConditionVar::Month => "month",
            ConditionVar::Day => "day",
            ConditionVar::DayOfYear => "day_of_year",
            ConditionVar::Date => "date",
            ConditionVar::Season => "season",
        }
    }
}

impl fmt::Display for ConditionVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Month number for an English month name or three-letter abbreviation.
pub fn month_from_name(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];
    let lower = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower || (lower.len() == 3 && m.starts_with(lower.as_str())))
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_lookup() {
        assert_eq!(Function::from_name("first_valid"), Some(Function::FirstValid));
        assert_eq!(Function::from_name("min"), None);
        assert!(Function::FirstValid.arity().accepts(5));
        assert!(!Function::Solar.arity().accepts(3));
        assert!(Function::ProportionalMinutes.arity().accepts(3));
    }

    #[test]
    fn direction_aliases() {
        assert_eq!(
            Direction::from_name("before_sunrise"),
            Some(Direction::BeforeVisibleSunrise)
        );
        assert_eq!(
            Direction::from_name("after_sunset"),
            Some(Direction::AfterVisibleSunset)
        );
        assert_eq!(Direction::from_name("before_sunset"), None);
        assert_eq!(Direction::AfterNoon.horizon(), Horizon::Setting);
        assert!(!Direction::AfterGeometricSunset.is_visible());
    }

    #[test]
    fn outer_anchor_directions() {
        let outer: Vec<_> = Direction::ALL
            .into_iter()
            .filter(|d| d.is_outer_anchor())
            .collect();
        assert_eq!(outer.len(), 4);
    }

    #[test]
    fn base_lookup() {
        assert_eq!(Base::from_name("mga"), Some(Base::Mga72));
        assert_eq!(Base::from_name("mga_19_8"), Some(Base::Mga19_8));
        assert_eq!(Base::from_name("custom"), None);
        assert_eq!(
            Base::AteretTorah.bounds(),
            DayBounds::Offset {
                before: 0.0,
                after: 40.0
            }
        );
    }

    #[test]
    fn month_names() {
        assert_eq!(month_from_name("May"), Some(5));
        assert_eq!(month_from_name("sep"), Some(9));
        assert_eq!(month_from_name("SEPTEMBER"), Some(9));
        assert_eq!(month_from_name("sept"), None);
        assert_eq!(month_from_name("xyz"), None);
    }
}
