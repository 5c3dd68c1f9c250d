//! Reference resolution across a set of formulas.
//!
//! Formulas live in an arena indexed by [`FormulaId`]; references become
//! edges between indices and linking is a depth-first walk with a
//! visit-state array. A set that fails to link is never evaluated.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::ast::Node;
use super::context::EvaluationContext;
use super::error::{CompileError, EvalError, ResolveError};
use super::eval::{self, ReferenceLookup};
use super::Compiler;
use crate::time::ClockTime;

/// A named, compiled formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub key: String,
    pub source: String,
    pub ast: Node,
    pub compiled_at: DateTime<Utc>,
}

impl Formula {
    pub fn compile(key: impl Into<String>, source: &str) -> Result<Self, Vec<CompileError>> {
        let compiled = Compiler::compile(source)?;
        Ok(Self {
            key: key.into(),
            source: compiled.source,
            ast: compiled.ast,
            compiled_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

/// Check that everything reachable from `start` exists and is acyclic.
pub fn resolve(formulas: &HashMap<String, Formula>, start: &str) -> Result<(), ResolveError> {
    let mut states = HashMap::new();
    let mut path = Vec::new();
    visit(formulas, start, &mut states, &mut path)
}

fn visit<'a>(
    formulas: &'a HashMap<String, Formula>,
    key: &'a str,
    states: &mut HashMap<&'a str, Visit>,
    path: &mut Vec<&'a str>,
) -> Result<(), ResolveError> {
    match states.get(key) {
        Some(Visit::Done) => return Ok(()),
        Some(Visit::InProgress) => return Err(cycle_error(path, key)),
        None => {}
    }
    let formula = formulas.get(key).ok_or_else(|| ResolveError::Unknown {
        name: key.to_string(),
    })?;

    states.insert(key, Visit::InProgress);
    path.push(key);
    for reference in formula.ast.references() {
        visit(formulas, reference, states, path)?;
    }
    path.pop();
    states.insert(key, Visit::Done);
    Ok(())
}

/// The cycle is the tail of the DFS path starting at the revisited key.
fn cycle_error(path: &[&str], key: &str) -> ResolveError {
    let from = path.iter().position(|k| *k == key).unwrap_or(0);
    let mut cycle: Vec<String> = path[from..].iter().map(|k| k.to_string()).collect();
    cycle.push(key.to_string());
    ResolveError::Cycle { path: cycle }
}

/// Index of a formula inside a [`FormulaSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormulaId(usize);

/// Outcome of evaluating a whole set; failures never hide successes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub times: BTreeMap<String, ClockTime>,
    pub errors: BTreeMap<String, EvalError>,
}

impl BatchResult {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A keyed collection of compiled formulas that may reference each other.
#[derive(Debug, Clone, Default)]
pub struct FormulaSet {
    formulas: Vec<Formula>,
    index: HashMap<String, FormulaId>,
}

impl FormulaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and add a formula, replacing any previous one with the same key.
    pub fn insert(&mut self, key: &str, source: &str) -> Result<FormulaId, Vec<CompileError>> {
        let formula = Formula::compile(key, source)?;
        debug!(key, "inserted formula");
        if let Some(&id) = self.index.get(key) {
            self.formulas[id.0] = formula;
            return Ok(id);
        }
        let id = FormulaId(self.formulas.len());
        self.formulas.push(formula);
        self.index.insert(key.to_string(), id);
        Ok(id)
    }

    pub fn id(&self, key: &str) -> Option<FormulaId> {
        self.index.get(key).copied()
    }

    pub fn get(&self, key: &str) -> Option<&Formula> {
        self.id(key).map(|id| &self.formulas[id.0])
    }

    pub fn formula(&self, id: FormulaId) -> &Formula {
        &self.formulas[id.0]
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Formulas in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.iter()
    }

    /// Check every reference in the set and return keys in calculation order,
    /// dependencies before dependents.
    pub fn link(&self) -> Result<Vec<String>, Vec<ResolveError>> {
        let order = self.calculation_order()?;
        debug!(formulas = order.len(), "linked formula set");
        Ok(order
            .into_iter()
            .map(|id| self.formulas[id.0].key.clone())
            .collect())
    }

    fn calculation_order(&self) -> Result<Vec<FormulaId>, Vec<ResolveError>> {
        let mut errors = Vec::new();

        let mut edges: Vec<Vec<FormulaId>> = Vec::with_capacity(self.formulas.len());
        for formula in &self.formulas {
            let mut deps = Vec::new();
            for name in formula.ast.references() {
                match self.index.get(name) {
                    Some(&id) => deps.push(id),
                    None => errors.push(ResolveError::Unknown {
                        name: name.to_string(),
                    }),
                }
            }
            edges.push(deps);
        }

        let mut linker = Linker {
            set: self,
            edges: &edges,
            states: vec![None; self.formulas.len()],
            path: Vec::new(),
            order: Vec::with_capacity(self.formulas.len()),
            errors: &mut errors,
        };
        for id in 0..self.formulas.len() {
            linker.visit(FormulaId(id));
        }
        let order = linker.order;

        if errors.is_empty() {
            Ok(order)
        } else {
            Err(errors)
        }
    }

    /// Evaluate one formula by key, following references through the set.
    pub fn evaluate(&self, key: &str, ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
        self.lookup(key, ctx)
    }

    /// Evaluate every formula once, in dependency order.
    ///
    /// A formula that fails is recorded in `errors`; formulas referencing it
    /// receive its error unchanged unless `first_valid` recovers.
    pub fn evaluate_all(&self, ctx: &EvaluationContext) -> Result<BatchResult, Vec<ResolveError>> {
        let order = self.calculation_order()?;
        let mut memo = Memo::default();

        for id in order {
            let formula = &self.formulas[id.0];
            let result = eval::evaluate(&formula.ast, ctx, &memo);
            if let Err(e) = &result {
                warn!(
                    zman_key = %formula.key,
                    formula = %formula.source,
                    error = %e,
                    "formula evaluation failed"
                );
            }
            memo.results.insert(formula.key.clone(), result);
        }

        let mut batch = BatchResult::default();
        for (key, result) in memo.results {
            match result {
                Ok(t) => {
                    batch.times.insert(key, t);
                }
                Err(e) => {
                    batch.errors.insert(key, e);
                }
            }
        }
        Ok(batch)
    }
}

struct Linker<'a> {
    set: &'a FormulaSet,
    edges: &'a [Vec<FormulaId>],
    states: Vec<Option<Visit>>,
    path: Vec<FormulaId>,
    order: Vec<FormulaId>,
    errors: &'a mut Vec<ResolveError>,
}

impl Linker<'_> {
    fn visit(&mut self, id: FormulaId) {
        let set = self.set;
        let edges = self.edges;
        match self.states[id.0] {
            Some(Visit::Done) => return,
            Some(Visit::InProgress) => {
                let keys: Vec<&str> = self
                    .path
                    .iter()
                    .map(|p| set.formulas[p.0].key.as_str())
                    .collect();
                let key = set.formulas[id.0].key.as_str();
                self.errors.push(cycle_error(&keys, key));
                return;
            }
            None => {}
        }

        self.states[id.0] = Some(Visit::InProgress);
        self.path.push(id);
        for &dep in &edges[id.0] {
            self.visit(dep);
        }
        self.path.pop();
        self.states[id.0] = Some(Visit::Done);
        self.order.push(id);
    }
}

/// Results computed so far in a batch.
#[derive(Default)]
struct Memo {
    results: BTreeMap<String, Result<ClockTime, EvalError>>,
}

impl ReferenceLookup for Memo {
    fn lookup(&self, name: &str, _ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
        match self.results.get(name) {
            Some(result) => result.clone(),
            None => Err(EvalError::UndefinedReference(name.to_string())),
        }
    }
}

impl ReferenceLookup for FormulaSet {
    fn lookup(&self, name: &str, ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
        Chain { set: self, depth: 0 }.lookup(name, ctx)
    }
}

/// Recursive lookup that stops if an unlinked set loops.
struct Chain<'a> {
    set: &'a FormulaSet,
    depth: usize,
}

impl ReferenceLookup for Chain<'_> {
    fn lookup(&self, name: &str, ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
        let formula = self
            .set
            .get(name)
            .ok_or_else(|| EvalError::UndefinedReference(name.to_string()))?;
        if self.depth > self.set.len() {
            return Err(EvalError::Domain(format!(
                "reference cycle through '@{name}'"
            )));
        }
        let next = Chain {
            set: self.set,
            depth: self.depth + 1,
        };
        eval::evaluate(&formula.ast, ctx, &next)
    }
}
