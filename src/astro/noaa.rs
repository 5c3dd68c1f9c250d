//! NOAA / Meeus low-precision solar position.
//!
//! All functions take time as Julian centuries since J2000.0 and return
//! degrees unless noted otherwise. Accuracy is about one minute of time
//! for latitudes within the polar circles.

use chrono::{Datelike, NaiveDate};

/// Julian day of the proleptic Gregorian day 0001-01-01 at 0h UT, minus one.
const JD_CE_EPOCH: f64 = 1_721_424.5;

/// Julian day of J2000.0.
const J2000: f64 = 2_451_545.0;

/// Julian day at 0h UT of `date`.
pub fn julian_day(date: NaiveDate) -> f64 {
    JD_CE_EPOCH + date.num_days_from_ce() as f64
}

/// Julian centuries since J2000.0.
pub fn julian_century(jd: f64) -> f64 {
    (jd - J2000) / 36_525.0
}

fn geom_mean_longitude(t: f64) -> f64 {
    (280.466_46 + t * (36_000.769_83 + 0.000_303_2 * t)).rem_euclid(360.0)
}

fn geom_mean_anomaly(t: f64) -> f64 {
    357.529_11 + t * (35_999.050_29 - 0.000_153_7 * t)
}

fn orbit_eccentricity(t: f64) -> f64 {
    0.016_708_634 - t * (0.000_042_037 + 0.000_000_126_7 * t)
}

fn equation_of_center(t: f64) -> f64 {
    let m = geom_mean_anomaly(t).to_radians();
    m.sin() * (1.914_602 - t * (0.004_817 + 0.000_014 * t))
        + (2.0 * m).sin() * (0.019_993 - 0.000_101 * t)
        + (3.0 * m).sin() * 0.000_289
}

fn true_longitude(t: f64) -> f64 {
    geom_mean_longitude(t) + equation_of_center(t)
}

fn node_longitude(t: f64) -> f64 {
    125.04 - 1_934.136 * t
}

fn apparent_longitude(t: f64) -> f64 {
    true_longitude(t) - 0.005_69 - 0.004_78 * node_longitude(t).to_radians().sin()
}

fn mean_obliquity(t: f64) -> f64 {
    let seconds = 21.448 - t * (46.815 + t * (0.000_59 - t * 0.001_813));
    23.0 + (26.0 + seconds / 60.0) / 60.0
}

fn obliquity_correction(t: f64) -> f64 {
    mean_obliquity(t) + 0.002_56 * node_longitude(t).to_radians().cos()
}

/// Solar declination.
pub fn declination(t: f64) -> f64 {
    let e = obliquity_correction(t).to_radians();
    let lambda = apparent_longitude(t).to_radians();
    (e.sin() * lambda.sin()).asin().to_degrees()
}

/// Equation of time in minutes (apparent minus mean solar time).
pub fn equation_of_time(t: f64) -> f64 {
    let epsilon = obliquity_correction(t).to_radians();
    let l0 = geom_mean_longitude(t).to_radians();
    let e = orbit_eccentricity(t);
    let m = geom_mean_anomaly(t).to_radians();

    let y = (epsilon / 2.0).tan().powi(2);

    let eq = y * (2.0 * l0).sin() - 2.0 * e * m.sin()
        + 4.0 * e * y * m.sin() * (2.0 * l0).cos()
        - 0.5 * y * y * (4.0 * l0).sin()
        - 1.25 * e * e * (2.0 * m).sin();

    4.0 * eq.to_degrees()
}

/// Hour angle at which the sun reaches `zenith`, or `None` if it never does.
pub fn hour_angle(latitude: f64, declination: f64, zenith: f64) -> Option<f64> {
    let lat = latitude.to_radians();
    let dec = declination.to_radians();
    let cos_ha = zenith.to_radians().cos() / (lat.cos() * dec.cos()) - lat.tan() * dec.tan();
    if !(-1.0..=1.0).contains(&cos_ha) {
        return None;
    }
    Some(cos_ha.acos().to_degrees())
}
