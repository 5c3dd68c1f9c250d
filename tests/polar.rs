//! High-latitude behaviour: missing solar events and `first_valid` fallbacks.

use chrono::{NaiveDate, TimeDelta};
use zmanim::dsl::{compile, evaluate, EvalError, EvaluationContext, NoReferences};
use zmanim::ClockTime;

/// 70°N in northern Norway.
fn north(month: u32, day: u32) -> EvaluationContext {
    EvaluationContext::with_timezone_name(
        NaiveDate::from_ymd_opt(2025, month, day).unwrap(),
        70.0,
        25.0,
        0.0,
        "Europe/Oslo",
    )
    .unwrap()
}

fn run(source: &str, ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
    evaluate(&compile(source).unwrap(), ctx, &NoReferences)
}

#[test]
fn deep_twilight_missing_in_white_nights() {
    // In early May the sun never sinks 16.1 degrees at 70N but still rises.
    let ctx = north(5, 1);
    match run("solar(16.1, before_sunrise)", &ctx) {
        Err(EvalError::NoSolarEvent { primitive, lat, .. }) => {
            assert!(primitive.starts_with("solar(16.1"));
            assert_eq!(lat, 70.0);
        }
        other => panic!("expected NoSolarEvent, got {other:?}"),
    }
    assert!(run("visible_sunrise", &ctx).is_ok());
}

#[test]
fn first_valid_falls_back_to_fixed_offset() {
    let ctx = north(5, 1);
    let fallback = run(
        "first_valid(solar(16.1, before_sunrise), visible_sunrise - 72min)",
        &ctx,
    )
    .unwrap();
    let sunrise = run("visible_sunrise", &ctx).unwrap();
    assert_eq!(sunrise - fallback, TimeDelta::minutes(72));
}

#[test]
fn polar_night_has_no_sunrise() {
    let ctx = north(12, 21);
    assert!(matches!(
        run("visible_sunrise", &ctx),
        Err(EvalError::NoSolarEvent { .. })
    ));
    assert!(matches!(
        run("sunrise - 72min", &ctx),
        Err(EvalError::NoSolarEvent { .. })
    ));
    // Civil twilight still happens around noon.
    let dawn = run("civil_dawn", &ctx).unwrap();
    assert!(dawn < run("solar_noon", &ctx).unwrap());
    assert_eq!(
        run("first_valid(visible_sunrise, civil_dawn)", &ctx).unwrap(),
        dawn
    );
}

#[test]
fn first_valid_propagates_last_error() {
    let ctx = north(12, 21);
    match run("first_valid(visible_sunrise, visible_sunset)", &ctx) {
        Err(EvalError::NoSolarEvent { primitive, .. }) => assert_eq!(primitive, "visible_sunset"),
        other => panic!("expected NoSolarEvent, got {other:?}"),
    }
}

#[test]
fn first_valid_does_not_hide_other_errors() {
    let ctx = north(12, 21);
    assert_eq!(
        run("first_valid(civil_dawn + 10min / 0, civil_dawn)", &ctx),
        Err(EvalError::DivisionByZero)
    );
}

#[test]
fn proportional_hours_fail_without_sunrise() {
    let ctx = north(12, 21);
    assert!(matches!(
        run("proportional_hours(3, gra)", &ctx),
        Err(EvalError::NoSolarEvent { .. })
    ));
    // A custom day built from events that exist still works.
    let t = run("proportional_hours(6, custom(civil_dawn, civil_dusk))", &ctx).unwrap();
    let noon = run("solar_noon", &ctx).unwrap();
    assert!((t - noon).num_minutes().abs() <= 2);
}

#[test]
fn day_length_condition_fails_in_polar_night() {
    let ctx = north(12, 21);
    assert!(matches!(
        run("if (day_length > 8h) { sunrise } else { civil_dawn }", &ctx),
        Err(EvalError::NoSolarEvent { .. })
    ));
}

#[test]
fn southern_hemisphere_winter_in_june() {
    let ctx = EvaluationContext::with_timezone_name(
        NaiveDate::from_ymd_opt(2025, 6, 21).unwrap(),
        -33.8688,
        151.2093,
        0.0,
        "Australia/Sydney",
    )
    .unwrap();
    let winter = run(r#"if (season == "winter") { sunset + 30min } else { sunset }"#, &ctx).unwrap();
    assert_eq!(winter - run("sunset", &ctx).unwrap(), TimeDelta::minutes(30));
}
