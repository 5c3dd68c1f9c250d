//! Randomized property sweeps over locations and dates, with a fixed seed.

use chrono::{Days, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use zmanim::dsl::{compile, evaluate, CompiledFormula, EvaluationContext, NoReferences};

const SEED: u64 = 42;
const SAMPLES: usize = 200;

/// Random contexts between 60S and 60N, where sunrise always exists.
fn contexts() -> Vec<EvaluationContext> {
    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let jan1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    (0..SAMPLES)
        .map(|_| {
            let date = jan1 + Days::new(rng.gen_range(0..365));
            let lat = rng.gen_range(-60.0..60.0);
            let lon = rng.gen_range(-180.0..180.0);
            let elevation = rng.gen_range(0.0..2000.0);
            EvaluationContext::with_timezone_name(date, lat, lon, elevation, "UTC").unwrap()
        })
        .collect()
}

fn formula(source: &str) -> CompiledFormula {
    compile(source).unwrap()
}

#[test]
fn evaluation_is_deterministic() {
    let f = formula("first_valid(proportional_hours(3, mga_16_1), proportional_hours(3, gra))");
    for ctx in contexts() {
        let a = evaluate(&f, &ctx, &NoReferences);
        let b = evaluate(&f, &ctx, &NoReferences);
        assert_eq!(a, b);
    }
}

#[test]
fn sunrise_aliases_visible_sunrise() {
    let pairs = [
        (formula("sunrise"), formula("visible_sunrise")),
        (formula("sunset"), formula("visible_sunset")),
        (
            formula("solar(12, before_sunrise)"),
            formula("solar(12, before_visible_sunrise)"),
        ),
        (
            formula("proportional_hours(3, mga)"),
            formula("proportional_hours(3, mga_72)"),
        ),
    ];
    for ctx in contexts() {
        for (alias, canonical) in &pairs {
            assert_eq!(
                evaluate(alias, &ctx, &NoReferences).unwrap(),
                evaluate(canonical, &ctx, &NoReferences).unwrap(),
                "{} on {}",
                alias.source,
                ctx.date()
            );
        }
    }
}

#[test]
fn larger_depression_is_earlier() {
    let angles = [4.0, 6.0, 8.5, 11.5, 16.1, 18.0, 19.8];
    let formulas: Vec<_> = angles
        .iter()
        .map(|a| formula(&format!("solar({a}, before_sunrise)")))
        .collect();
    for ctx in contexts() {
        let times: Vec<_> = formulas
            .iter()
            .map(|f| evaluate(f, &ctx, &NoReferences).ok())
            .collect();
        for pair in times.windows(2) {
            if let [Some(shallow), Some(deep)] = pair {
                assert!(deep < shallow, "on {} at {}", ctx.date(), ctx.latitude());
            }
        }
    }
}

#[test]
fn temporal_hours_partition_the_day() {
    let start = formula("proportional_hours(0, gra)");
    let end = formula("proportional_hours(12, gra)");
    let sunrise = formula("sunrise");
    let sunset = formula("sunset");
    for ctx in contexts() {
        assert_eq!(
            evaluate(&start, &ctx, &NoReferences).unwrap(),
            evaluate(&sunrise, &ctx, &NoReferences).unwrap()
        );
        assert_eq!(
            evaluate(&end, &ctx, &NoReferences).unwrap(),
            evaluate(&sunset, &ctx, &NoReferences).unwrap()
        );
    }
}

#[test]
fn temporal_hours_increase_through_the_day() {
    let hours: Vec<_> = (0..=12)
        .map(|h| formula(&format!("proportional_hours({h}, gra)")))
        .collect();
    for ctx in contexts() {
        let times: Vec<_> = hours
            .iter()
            .map(|f| evaluate(f, &ctx, &NoReferences).unwrap())
            .collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn fallback_returns_second_when_first_missing() {
    let first = formula("solar(19.8, before_sunrise)");
    let second = formula("sunrise - 90min");
    let both = formula("first_valid(solar(19.8, before_sunrise), sunrise - 90min)");
    for ctx in contexts() {
        let expected = match evaluate(&first, &ctx, &NoReferences) {
            Ok(t) => t,
            Err(_) => evaluate(&second, &ctx, &NoReferences).unwrap(),
        };
        assert_eq!(evaluate(&both, &ctx, &NoReferences).unwrap(), expected);
    }
}

#[test]
fn noon_sits_between_sunrise_and_sunset() {
    let rise = formula("sunrise");
    let noon = formula("solar_noon");
    let set = formula("sunset");
    let midnight = formula("solar_midnight");
    for ctx in contexts() {
        let r = evaluate(&rise, &ctx, &NoReferences).unwrap();
        let n = evaluate(&noon, &ctx, &NoReferences).unwrap();
        let s = evaluate(&set, &ctx, &NoReferences).unwrap();
        let m = evaluate(&midnight, &ctx, &NoReferences).unwrap();
        assert!(r < n && n < s && s < m);
        // Noon is close to the midpoint of sunrise and sunset.
        assert!((r.midpoint(s).unwrap() - n).num_minutes().abs() <= 2);
    }
}
