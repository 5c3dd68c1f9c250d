//! Zmanim: a formula language for halachic times computed from the sun's position.

pub mod astro;
pub mod catalog;
pub mod config;
pub mod dsl;
pub mod time;

pub use dsl::{compile, evaluate, CompiledFormula, EvaluationContext, FormulaSet};
pub use time::{ClockTime, RoundingMode};
