//! Astronomical primitives engine.
//!
//! Pure functions of `(date, latitude, longitude, elevation)` that locate
//! solar events. Results are fractional minutes after UTC midnight of the
//! requested calendar date; callers localize them. Events that do not
//! happen on a date (polar day or night) come back as `None`, never as an
//! approximation.

pub mod noaa;

use std::fmt;

use chrono::{Datelike, NaiveDate};

/// Zenith of the sun's centre on a flat horizon.
pub const GEOMETRIC_ZENITH: f64 = 90.0;
/// Zenith at first/last visible limb: refraction plus semi-diameter.
pub const VISIBLE_ZENITH: f64 = 90.833;
pub const CIVIL_ZENITH: f64 = 96.0;
pub const NAUTICAL_ZENITH: f64 = 102.0;
pub const ASTRONOMICAL_ZENITH: f64 = 108.0;

/// Polar radius used for the horizon dip of an elevated observer.
const EARTH_RADIUS_KM: f64 = 6356.9;

const MINUTES_PER_DAY: f64 = 1440.0;

/// Where on Earth the sun is observed from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observer {
    /// Degrees, north positive.
    pub latitude: f64,
    /// Degrees, east positive.
    pub longitude: f64,
    /// Metres above sea level.
    pub elevation: f64,
}

impl Observer {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }
}

/// Morning or evening half of the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    Rising,
    Setting,
}

/// Extra zenith distance of the visible horizon seen from `elevation` metres.
pub fn elevation_adjustment(elevation: f64) -> f64 {
    if elevation <= 0.0 {
        return 0.0;
    }
    (EARTH_RADIUS_KM / (EARTH_RADIUS_KM + elevation / 1000.0))
        .acos()
        .to_degrees()
}

/// The named solar events the formula language exposes as primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolarEvent {
    VisibleSunrise,
    VisibleSunset,
    GeometricSunrise,
    GeometricSunset,
    SolarNoon,
    SolarMidnight,
    CivilDawn,
    CivilDusk,
    NauticalDawn,
    NauticalDusk,
    AstronomicalDawn,
    AstronomicalDusk,
}

impl SolarEvent {
    pub const ALL: [SolarEvent; 12] = [
        SolarEvent::VisibleSunrise,
        SolarEvent::VisibleSunset,
        SolarEvent::GeometricSunrise,
        SolarEvent::GeometricSunset,
        SolarEvent::SolarNoon,
        SolarEvent::SolarMidnight,
        SolarEvent::CivilDawn,
        SolarEvent::CivilDusk,
        SolarEvent::NauticalDawn,
        SolarEvent::NauticalDusk,
        SolarEvent::AstronomicalDawn,
        SolarEvent::AstronomicalDusk,
    ];

    /// Resolve a primitive name. `sunrise` and `sunset` alias the visible events.
    pub fn from_name(name: &str) -> Option<Self> {
        let event = match name {
            "visible_sunrise" | "sunrise" => Self::VisibleSunrise,
            "visible_sunset" | "sunset" => Self::VisibleSunset,
            "geometric_sunrise" => Self::GeometricSunrise,
            "geometric_sunset" => Self::GeometricSunset,
            "solar_noon" => Self::SolarNoon,
            "solar_midnight" => Self::SolarMidnight,
            "civil_dawn" => Self::CivilDawn,
            "civil_dusk" => Self::CivilDusk,
            "nautical_dawn" => Self::NauticalDawn,
            "nautical_dusk" => Self::NauticalDusk,
            "astronomical_dawn" => Self::AstronomicalDawn,
            "astronomical_dusk" => Self::AstronomicalDusk,
            _ => return None,
        };
        Some(event)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VisibleSunrise => "visible_sunrise",
            Self::VisibleSunset => "visible_sunset",
            Self::GeometricSunrise => "geometric_sunrise",
            Self::GeometricSunset => "geometric_sunset",
            Self::SolarNoon => "solar_noon",
            Self::SolarMidnight => "solar_midnight",
            Self::CivilDawn => "civil_dawn",
            Self::CivilDusk => "civil_dusk",
            Self::NauticalDawn => "nautical_dawn",
            Self::NauticalDusk => "nautical_dusk",
            Self::AstronomicalDawn => "astronomical_dawn",
            Self::AstronomicalDusk => "astronomical_dusk",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::VisibleSunrise => "upper limb appears, with refraction (alias: sunrise)",
            Self::VisibleSunset => "upper limb disappears, with refraction (alias: sunset)",
            Self::GeometricSunrise => "centre of the sun on the geometric horizon, morning",
            Self::GeometricSunset => "centre of the sun on the geometric horizon, evening",
            Self::SolarNoon => "sun crosses the local meridian",
            Self::SolarMidnight => "sun crosses the lower meridian after solar noon",
            Self::CivilDawn => "sun 6 degrees below the horizon, morning",
            Self::CivilDusk => "sun 6 degrees below the horizon, evening",
            Self::NauticalDawn => "sun 12 degrees below the horizon, morning",
            Self::NauticalDusk => "sun 12 degrees below the horizon, evening",
            Self::AstronomicalDawn => "sun 18 degrees below the horizon, morning",
            Self::AstronomicalDusk => "sun 18 degrees below the horizon, evening",
        }
    }
}

impl fmt::Display for SolarEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Solar geometry for one observer on one calendar date.
#[derive(Debug, Clone, Copy)]
pub struct SolarDay {
    date: NaiveDate,
    observer: Observer,
    jd: f64,
}

impl SolarDay {
    pub fn new(date: NaiveDate, observer: Observer) -> Self {
        Self {
            date,
            observer,
            jd: noaa::julian_day(date),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn observer(&self) -> Observer {
        self.observer
    }

    /// Minutes after UTC midnight of the local meridian transit.
    pub fn noon(&self) -> f64 {
        self.transit(720.0)
    }

    /// Lower transit following solar noon.
    pub fn midnight(&self) -> f64 {
        self.transit(MINUTES_PER_DAY)
    }

    /// Transit at `mean` local mean time, corrected by the equation of
    /// time evaluated at the transit itself.
    fn transit(&self, mean: f64) -> f64 {
        let lon = self.observer.longitude;
        let mut minutes = mean - 4.0 * lon;
        for _ in 0..2 {
            let t = noaa::julian_century(self.jd + minutes / MINUTES_PER_DAY);
            minutes = mean - 4.0 * lon - noaa::equation_of_time(t);
        }
        minutes
    }

    /// Time the sun's centre reaches `zenith`, or `None` if it never does.
    pub fn crossing(&self, zenith: f64, horizon: Horizon) -> Option<f64> {
        let lat = self.observer.latitude;
        let lon = self.observer.longitude;
        let mut minutes = self.noon();
        // One estimate plus two refinements at the event time.
        for _ in 0..3 {
            let t = noaa::julian_century(self.jd + minutes / MINUTES_PER_DAY);
            let ha = noaa::hour_angle(lat, noaa::declination(t), zenith)?;
            let signed = match horizon {
                Horizon::Rising => ha,
                Horizon::Setting => -ha,
            };
            minutes = 720.0 - 4.0 * (lon + signed) - noaa::equation_of_time(t);
        }
        Some(minutes)
    }

    /// Zenith of sunrise/sunset, visible or geometric.
    pub fn horizon_zenith(&self, visible: bool) -> f64 {
        if visible {
            VISIBLE_ZENITH + elevation_adjustment(self.observer.elevation)
        } else {
            GEOMETRIC_ZENITH
        }
    }

    /// Sunrise (`Rising`) or sunset (`Setting`).
    pub fn sun(&self, horizon: Horizon, visible: bool) -> Option<f64> {
        self.crossing(self.horizon_zenith(visible), horizon)
    }

    /// Depression-angle crossing: `degrees` below the horizon.
    pub fn depression(&self, degrees: f64, horizon: Horizon) -> Option<f64> {
        self.crossing(GEOMETRIC_ZENITH + degrees, horizon)
    }

    pub fn event(&self, event: SolarEvent) -> Option<f64> {
        match event {
            SolarEvent::VisibleSunrise => self.sun(Horizon::Rising, true),
            SolarEvent::VisibleSunset => self.sun(Horizon::Setting, true),
            SolarEvent::GeometricSunrise => self.sun(Horizon::Rising, false),
            SolarEvent::GeometricSunset => self.sun(Horizon::Setting, false),
            SolarEvent::SolarNoon => Some(self.noon()),
            SolarEvent::SolarMidnight => Some(self.midnight()),
            SolarEvent::CivilDawn => self.crossing(CIVIL_ZENITH, Horizon::Rising),
            SolarEvent::CivilDusk => self.crossing(CIVIL_ZENITH, Horizon::Setting),
            SolarEvent::NauticalDawn => self.crossing(NAUTICAL_ZENITH, Horizon::Rising),
            SolarEvent::NauticalDusk => self.crossing(NAUTICAL_ZENITH, Horizon::Setting),
            SolarEvent::AstronomicalDawn => self.crossing(ASTRONOMICAL_ZENITH, Horizon::Rising),
            SolarEvent::AstronomicalDusk => self.crossing(ASTRONOMICAL_ZENITH, Horizon::Setting),
        }
    }

    /// Minutes between sunrise and sunset.
    pub fn day_length(&self, visible: bool) -> Option<f64> {
        let rise = self.sun(Horizon::Rising, visible)?;
        let set = self.sun(Horizon::Setting, visible)?;
        Some(set - rise)
    }

    /// Equinox closest to this date (20 March or 22 September).
    pub fn nearest_equinox(&self) -> NaiveDate {
        let year = self.date.year();
        [
            (year - 1, 9, 22),
            (year, 3, 20),
            (year, 9, 22),
            (year + 1, 3, 20),
        ]
        .into_iter()
        .filter_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .min_by_key(|eq| (*eq - self.date).num_days().abs())
        .unwrap_or(self.date)
    }

    /// Depression-angle time scaled to the season.
    ///
    /// The gap between sunrise and the `degrees` crossing is measured on
    /// the nearest equinox, then stretched by today's day length over the
    /// equinox day length and applied to today's sunrise (or sunset).
    pub fn seasonal_depression(&self, degrees: f64, horizon: Horizon, visible: bool) -> Option<f64> {
        let equinox = SolarDay::new(self.nearest_equinox(), self.observer);
        let eq_rise = equinox.sun(Horizon::Rising, visible)?;
        let eq_set = equinox.sun(Horizon::Setting, visible)?;
        let eq_event = equinox.depression(degrees, horizon)?;
        let offset = match horizon {
            Horizon::Rising => eq_rise - eq_event,
            Horizon::Setting => eq_event - eq_set,
        };

        let rise = self.sun(Horizon::Rising, visible)?;
        let set = self.sun(Horizon::Setting, visible)?;
        let ratio = (set - rise) / (eq_set - eq_rise);

        Some(match horizon {
            Horizon::Rising => rise - offset * ratio,
            Horizon::Setting => set + offset * ratio,
        })
    }
}
