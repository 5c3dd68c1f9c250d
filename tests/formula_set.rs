//! Formula sets: linking, cycle rejection and batch evaluation through references.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeDelta};
use zmanim::catalog::Catalog;
use zmanim::dsl::{resolve, EvalError, EvaluationContext, Formula, FormulaSet, ResolveError};

fn ctx(lat: f64, lon: f64, tz: &str, month: u32, day: u32) -> EvaluationContext {
    EvaluationContext::with_timezone_name(
        NaiveDate::from_ymd_opt(2025, month, day).unwrap(),
        lat,
        lon,
        0.0,
        tz,
    )
    .unwrap()
}

fn jerusalem() -> EvaluationContext {
    ctx(31.7767, 35.2345, "Asia/Jerusalem", 6, 21)
}

#[test]
fn two_formula_cycle_is_rejected_before_evaluation() {
    let formulas: HashMap<String, Formula> = [("a", "@b + 1min"), ("b", "@a - 1min")]
        .into_iter()
        .map(|(k, src)| (k.to_string(), Formula::compile(k, src).unwrap()))
        .collect();
    assert!(matches!(
        resolve(&formulas, "a"),
        Err(ResolveError::Cycle { .. })
    ));

    let mut set = FormulaSet::new();
    set.insert("a", "@b + 1min").unwrap();
    set.insert("b", "@a - 1min").unwrap();
    let errors = set.evaluate_all(&jerusalem()).unwrap_err();
    assert_eq!(
        errors,
        vec![ResolveError::Cycle {
            path: vec!["a".into(), "b".into(), "a".into()]
        }]
    );
}

#[test]
fn references_evaluate_against_the_same_context() {
    let mut set = FormulaSet::new();
    set.insert("alos_hashachar", "solar(16.1, before_sunrise)").unwrap();
    set.insert("misheyakir", "@alos_hashachar + 30min").unwrap();
    set.insert("alos_or_fixed", "first_valid(@alos_hashachar, sunrise - 72min)").unwrap();

    let batch = set.evaluate_all(&jerusalem()).unwrap();
    assert!(batch.is_complete());
    assert_eq!(
        batch.times["misheyakir"] - batch.times["alos_hashachar"],
        TimeDelta::minutes(30)
    );
    assert_eq!(batch.times["alos_or_fixed"], batch.times["alos_hashachar"]);
}

#[test]
fn overflowing_formula_fails_alone() {
    let mut set = FormulaSet::new();
    set.insert("netz", "sunrise").unwrap();
    set.insert("far_future", "@netz + 10min * 100000000000000000000").unwrap();
    set.insert("after_far_future", "@far_future + 1min").unwrap();
    set.insert("shkia", "sunset").unwrap();

    let batch = set.evaluate_all(&jerusalem()).unwrap();
    let out_of_range = EvalError::Domain("time out of range".into());
    assert_eq!(batch.errors["far_future"], out_of_range);
    assert_eq!(batch.errors["after_far_future"], out_of_range);
    assert!(batch.times.contains_key("netz"));
    assert!(batch.times.contains_key("shkia"));
}

#[test]
fn missing_event_propagates_and_first_valid_recovers() {
    let mut set = FormulaSet::new();
    set.insert("alos_hashachar", "solar(16.1, before_sunrise)").unwrap();
    set.insert("misheyakir", "@alos_hashachar + 30min").unwrap();
    set.insert("alos_or_fixed", "first_valid(@alos_hashachar, sunrise - 72min)").unwrap();
    set.insert("netz", "sunrise").unwrap();

    // White nights at 70N: no 16.1 degree dawn.
    let batch = set.evaluate_all(&ctx(70.0, 25.0, "Europe/Oslo", 5, 1)).unwrap();
    assert!(matches!(
        batch.errors["alos_hashachar"],
        EvalError::NoSolarEvent { .. }
    ));
    assert_eq!(batch.errors["misheyakir"], batch.errors["alos_hashachar"]);
    assert_eq!(
        batch.times["netz"] - batch.times["alos_or_fixed"],
        TimeDelta::minutes(72)
    );
    assert_eq!(batch.times.len() + batch.errors.len(), set.len());
}

#[test]
fn lookup_matches_batch() {
    let set = Catalog::standard().to_formula_set().unwrap();
    let ctx = jerusalem();
    let batch = set.evaluate_all(&ctx).unwrap();
    for formula in set.iter() {
        assert_eq!(
            set.evaluate(&formula.key, &ctx).ok(),
            batch.times.get(&formula.key).copied(),
            "{}",
            formula.key
        );
    }
}

#[test]
fn standard_catalog_in_order() {
    let set = Catalog::standard().to_formula_set().unwrap();
    let batch = set.evaluate_all(&jerusalem()).unwrap();
    assert!(batch.is_complete(), "{:?}", batch.errors);
    let t = |k: &str| batch.times[k];
    assert!(t("alos_hashachar") < t("misheyakir"));
    assert!(t("misheyakir") < t("sunrise"));
    assert!(t("sof_zman_shma_mga") < t("sof_zman_shma_gra"));
    assert!(t("sof_zman_shma_gra") < t("sof_zman_tfila_gra"));
    assert!(t("chatzos") < t("mincha_gedola"));
    assert!(t("mincha_gedola") < t("mincha_ketana"));
    assert!(t("plag_hamincha") < t("candle_lighting"));
    assert!(t("candle_lighting") < t("sunset"));
    assert!(t("sunset") < t("tzeis_hakochavim"));
    assert_eq!(t("sunset") - t("candle_lighting"), TimeDelta::minutes(18));
}

#[test]
fn recompiling_a_formula_changes_dependents() {
    let mut set = FormulaSet::new();
    set.insert("shkia", "sunset").unwrap();
    set.insert("candles", "@shkia - 18min").unwrap();
    let ctx = jerusalem();
    let before = set.evaluate("candles", &ctx).unwrap();
    set.insert("shkia", "sunset + 10min").unwrap();
    let after = set.evaluate("candles", &ctx).unwrap();
    assert_eq!(after - before, TimeDelta::minutes(10));
}
