//! Formula catalogs: ordered lists of named formulas stored as YAML.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dsl::{CompileError, FormulaSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: String,
    pub formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zmanim: Vec<CatalogEntry>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate key '{0}'")]
    DuplicateKey(String),

    #[error("'{key}': {}", summarize(.errors))]
    Compile {
        key: String,
        errors: Vec<CompileError>,
    },
}

fn summarize(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

const STANDARD: &[(&str, &str, &str)] = &[
    ("alos_hashachar", "solar(16.1, before_sunrise)", "dawn, sun 16.1 degrees below the horizon"),
    ("alos_72", "sunrise - 72min", "dawn, 72 fixed minutes before sunrise"),
    ("misheyakir", "solar(11.5, before_sunrise)", "earliest tallis and tefillin"),
    ("sunrise", "visible_sunrise", "netz hachama"),
    ("sof_zman_shma_mga", "proportional_hours(3, mga)", "latest shema, Magen Avraham"),
    ("sof_zman_shma_gra", "proportional_hours(3, gra)", "latest shema, Gra"),
    ("sof_zman_tfila_gra", "proportional_hours(4, gra)", "latest shacharis, Gra"),
    ("chatzos", "solar_noon", "midday"),
    ("mincha_gedola", "later_of(proportional_hours(6.5, gra), solar_noon + 30min)", "earliest mincha"),
    ("mincha_ketana", "proportional_hours(9.5, gra)", "preferred earliest mincha"),
    ("plag_hamincha", "proportional_hours(10.75, gra)", "plag hamincha"),
    ("candle_lighting", "@sunset - 18min", "Shabbos candles"),
    ("sunset", "visible_sunset", "shkiah"),
    ("tzeis_hakochavim", "first_valid(solar(8.5, after_sunset), @sunset + 50min)", "nightfall"),
    ("tzeis_72", "@sunset + 72min", "nightfall, Rabbeinu Tam"),
];

impl Catalog {
    /// A catalog of commonly published zmanim.
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            zmanim: STANDARD
                .iter()
                .map(|(key, formula, description)| CatalogEntry {
                    key: key.to_string(),
                    formula: formula.to_string(),
                    description: Some(description.to_string()),
                })
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn save(&self, path: &Path) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self).map_err(io::Error::other)?;
        std::fs::write(path, yaml)
    }

    /// Compile every entry. Reports every entry that fails, not just the first.
    pub fn to_formula_set(&self) -> Result<FormulaSet, Vec<CatalogError>> {
        let mut set = FormulaSet::new();
        let mut seen = HashSet::new();
        let mut errors = Vec::new();

        for entry in &self.zmanim {
            if !seen.insert(entry.key.as_str()) {
                errors.push(CatalogError::DuplicateKey(entry.key.clone()));
                continue;
            }
            if let Err(compile_errors) = set.insert(&entry.key, &entry.formula) {
                errors.push(CatalogError::Compile {
                    key: entry.key.clone(),
                    errors: compile_errors,
                });
            }
        }

        if errors.is_empty() {
            Ok(set)
        } else {
            Err(errors)
        }
    }
}
