//! Formula executor.
//!
//! Walks a validated AST against an [`EvaluationContext`]. Every failure is
//! a typed [`EvalError`] that aborts the formula; `first_valid` is the only
//! construct that recovers, and only from [`EvalError::NoSolarEvent`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{NaiveDate, TimeDelta};
use tracing::trace;

use super::ast::{BaseRef, BinaryOp, Callee, Expr, Literal, Node, UnaryOp};
use super::context::EvaluationContext;
use super::error::EvalError;
use super::names::{Base, ConditionVar, DayBounds, Direction, Function, Primitive};
use crate::astro::{Horizon, SolarDay};
use crate::time::{self, ClockTime};

/// Runtime value of a sub-expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Time(ClockTime),
    Duration(TimeDelta),
    Number(f64),
    Bool(bool),
    String(String),
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Time(_) => ValueType::Time,
            Value::Duration(_) => ValueType::Duration,
            Value::Number(_) => ValueType::Number,
            Value::Bool(_) => ValueType::Boolean,
            Value::String(_) => ValueType::String,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Time(t) => f.write_str(&t.format_exact()),
            Value::Duration(d) => write!(f, "{}min", time::as_minutes(*d)),
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Static type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Time,
    Duration,
    Number,
    Boolean,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Time => "time",
            ValueType::Duration => "duration",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
        })
    }
}

/// Resolves `@name` references during evaluation.
pub trait ReferenceLookup {
    fn lookup(&self, name: &str, ctx: &EvaluationContext) -> Result<ClockTime, EvalError>;
}

/// A lookup for formulas that reference nothing.
pub struct NoReferences;

impl ReferenceLookup for NoReferences {
    fn lookup(&self, name: &str, _ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
        Err(EvalError::UndefinedReference(name.to_string()))
    }
}

/// Already-computed times, keyed by formula name.
impl ReferenceLookup for HashMap<String, ClockTime> {
    fn lookup(&self, name: &str, _ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
        self.get(name)
            .copied()
            .ok_or_else(|| EvalError::UndefinedReference(name.to_string()))
    }
}

impl ReferenceLookup for BTreeMap<String, ClockTime> {
    fn lookup(&self, name: &str, _ctx: &EvaluationContext) -> Result<ClockTime, EvalError> {
        self.get(name)
            .copied()
            .ok_or_else(|| EvalError::UndefinedReference(name.to_string()))
    }
}

/// One intermediate value recorded while evaluating.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationStep {
    pub step: String,
    pub value: String,
}

/// Evaluate a formula to a clock time.
pub fn evaluate(
    ast: &Node,
    ctx: &EvaluationContext,
    refs: &dyn ReferenceLookup,
) -> Result<ClockTime, EvalError> {
    Executor::new(ctx, refs).run(ast)
}

/// Evaluate and also return each primitive, function and reference value computed.
pub fn evaluate_with_breakdown(
    ast: &Node,
    ctx: &EvaluationContext,
    refs: &dyn ReferenceLookup,
) -> (Result<ClockTime, EvalError>, Vec<CalculationStep>) {
    let mut exec = Executor::new(ctx, refs);
    exec.steps = Some(Vec::new());
    let result = exec.run(ast);
    (result, exec.steps.unwrap_or_default())
}

pub struct Executor<'a> {
    ctx: &'a EvaluationContext,
    refs: &'a dyn ReferenceLookup,
    day: SolarDay,
    steps: Option<Vec<CalculationStep>>,
}

impl<'a> Executor<'a> {
    pub fn new(ctx: &'a EvaluationContext, refs: &'a dyn ReferenceLookup) -> Self {
        Self {
            ctx,
            refs,
            day: ctx.solar_day(),
            steps: None,
        }
    }

    pub fn run(&mut self, ast: &Node) -> Result<ClockTime, EvalError> {
        match self.eval(ast)? {
            Value::Time(t) => Ok(t),
            other => Err(EvalError::TypeMismatch(format!(
                "formula produced a {}, expected a time",
                other.ty()
            ))),
        }
    }

    fn record(&mut self, step: impl FnOnce() -> String, value: &ClockTime) {
        if let Some(steps) = self.steps.as_mut() {
            steps.push(CalculationStep {
                step: step(),
                value: value.format_exact(),
            });
        }
    }

    pub fn eval(&mut self, node: &Node) -> Result<Value, EvalError> {
        match &node.expr {
            Expr::Literal(lit) => self.literal(lit),
            Expr::Primitive(p) => self.primitive(*p).map(Value::Time),
            Expr::Ident(name) => Err(EvalError::Domain(format!("unknown name '{name}'"))),
            Expr::Call { callee, args } => match callee {
                Callee::Builtin(function) => self.call(*function, args).map(Value::Time),
                Callee::Unknown(name) => {
                    Err(EvalError::Domain(format!("unknown function '{name}'")))
                }
            },
            Expr::Reference(name) => {
                let t = self.refs.lookup(name, self.ctx)?;
                self.record(|| format!("@{name}"), &t);
                Ok(Value::Time(t))
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Neg, Value::Duration(d)) => Ok(Value::Duration(-d)),
                    (UnaryOp::Not, v) => Err(mismatch(format!("'!' needs a boolean, got {}", v.ty()))),
                    (UnaryOp::Neg, v) => Err(mismatch(format!("cannot negate a {}", v.ty()))),
                }
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => match self.eval(cond)? {
                Value::Bool(true) => self.eval(then),
                Value::Bool(false) => self.eval(otherwise),
                v => Err(mismatch(format!("condition must be boolean, got {}", v.ty()))),
            },
            Expr::Base(_) => Err(mismatch("a base is only valid as a function argument".into())),
            Expr::Direction(d) => Err(mismatch(format!(
                "direction '{d}' is only valid as a function argument"
            ))),
            Expr::Condition(var) => self.condition(*var),
        }
    }

    fn literal(&self, lit: &Literal) -> Result<Value, EvalError> {
        Ok(match lit {
            Literal::Number(n) => Value::Number(*n),
            Literal::Duration(d) => Value::Duration(*d),
            Literal::Date { day, month } => Value::Number(self.day_of_year(*day, *month)? as f64),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
        })
    }

    /// Day-of-year of a `D-Mon` literal in the context's year.
    fn day_of_year(&self, day: u32, month: u32) -> Result<u32, EvalError> {
        let year = chrono::Datelike::year(&self.ctx.date());
        NaiveDate::from_ymd_opt(year, month, day)
            .map(|d| chrono::Datelike::ordinal(&d))
            .ok_or(EvalError::InvalidDate { day, month, year })
    }

    fn condition(&self, var: ConditionVar) -> Result<Value, EvalError> {
        let vars = self.ctx.condition_vars();
        Ok(match var {
            ConditionVar::Latitude => Value::Number(self.ctx.latitude()),
            ConditionVar::Longitude => Value::Number(self.ctx.longitude()),
            ConditionVar::DayLength => match vars.day_length {
                Some(d) => Value::Duration(d),
                None => return Err(self.no_event("day_length")),
            },
            ConditionVar::Month => Value::Number(vars.month as f64),
            ConditionVar::Day => Value::Number(vars.day as f64),
            ConditionVar::DayOfYear | ConditionVar::Date => Value::Number(vars.day_of_year as f64),
            ConditionVar::Season => Value::String(vars.season.name().to_string()),
        })
    }

    fn no_event(&self, what: &str) -> EvalError {
        EvalError::NoSolarEvent {
            primitive: what.to_string(),
            date: self.ctx.date(),
            lat: self.ctx.latitude(),
        }
    }

    /// Localize an engine result, or fail with `NoSolarEvent` named by `what`.
    fn localize(&self, minutes: Option<f64>, what: impl FnOnce() -> String) -> Result<ClockTime, EvalError> {
        match minutes {
            Some(m) => self.ctx.clock(m).ok_or_else(out_of_range),
            None => Err(self.no_event(&what())),
        }
    }

    fn primitive(&mut self, p: Primitive) -> Result<ClockTime, EvalError> {
        let t = self.localize(self.day.event(p), || p.name().to_string())?;
        trace!(primitive = %p, time = %t, "primitive");
        self.record(|| p.name().to_string(), &t);
        Ok(t)
    }

    fn sun(&self, horizon: Horizon, visible: bool) -> Result<ClockTime, EvalError> {
        let name = match (horizon, visible) {
            (Horizon::Rising, true) => "visible_sunrise",
            (Horizon::Setting, true) => "visible_sunset",
            (Horizon::Rising, false) => "geometric_sunrise",
            (Horizon::Setting, false) => "geometric_sunset",
        };
        self.localize(self.day.sun(horizon, visible), || name.to_string())
    }

    fn call(&mut self, function: Function, args: &[Node]) -> Result<ClockTime, EvalError> {
        let label = || format!("{function}()");
        let t = match function {
            Function::Solar => {
                let (angle, dir) = pair(args, function)?;
                let degrees = self.angle(angle, function)?;
                let dir = direction_arg(dir, function)?;
                self.localize(self.day.depression(degrees, dir.horizon()), || {
                    format!("solar({degrees}, {dir})")
                })?
            }
            Function::SeasonalSolar => {
                let (angle, dir) = pair(args, function)?;
                let degrees = self.angle(angle, function)?;
                let dir = outer_direction(dir, function)?;
                self.localize(
                    self.day
                        .seasonal_depression(degrees, dir.horizon(), dir.is_visible()),
                    || format!("seasonal_solar({degrees}, {dir})"),
                )?
            }
            Function::ProportionalHours => {
                let (hours, base) = pair(args, function)?;
                let hours = self.number(hours)?;
                if !(0.0..=12.0).contains(&hours) {
                    return Err(EvalError::Domain(format!(
                        "proportional_hours(): hours {hours} is outside 0..=12"
                    )));
                }
                let (start, end) = self.day_bounds(base, function)?;
                scaled(end - start, hours / 12.0).and_then(|d| later(start, d))?
            }
            Function::ProportionalMinutes => {
                let (minutes, dir, base) = match args {
                    [minutes, dir] => (minutes, dir, None),
                    [minutes, dir, base] => (minutes, dir, Some(base)),
                    _ => return Err(arity(function, args.len())),
                };
                let minutes = self.number(minutes)?;
                if !(minutes > 0.0 && minutes <= 200.0) {
                    return Err(EvalError::Domain(format!(
                        "proportional_minutes(): minutes {minutes} is outside (0, 200]"
                    )));
                }
                let dir = outer_direction(dir, function)?;
                let (start, end) = match base {
                    Some(base) => self.day_bounds(base, function)?,
                    None => self.named_bounds(Base::Gra)?,
                };
                let offset = scaled(end - start, minutes / 720.0)?;
                let anchor = self.sun(dir.horizon(), dir.is_visible())?;
                match dir.horizon() {
                    Horizon::Rising => earlier(anchor, offset)?,
                    Horizon::Setting => later(anchor, offset)?,
                }
            }
            Function::Midpoint => {
                let (a, b) = self.time_pair(args, function)?;
                a.midpoint(b).ok_or_else(out_of_range)?
            }
            Function::EarlierOf => {
                let (a, b) = self.time_pair(args, function)?;
                a.min(b)
            }
            Function::LaterOf => {
                let (a, b) = self.time_pair(args, function)?;
                a.max(b)
            }
            Function::FirstValid => self.first_valid(args)?,
        };
        trace!(function = %function, time = %t, "function");
        self.record(label, &t);
        Ok(t)
    }

    fn time_pair(&mut self, args: &[Node], function: Function) -> Result<(ClockTime, ClockTime), EvalError> {
        let (a, b) = pair(args, function)?;
        Ok((self.time_arg(a)?, self.time_arg(b)?))
    }

    fn first_valid(&mut self, args: &[Node]) -> Result<ClockTime, EvalError> {
        let Some((last, rest)) = args.split_last() else {
            return Err(EvalError::Domain("first_valid() needs arguments".into()));
        };
        for arg in rest {
            match self.time_arg(arg) {
                Ok(t) => return Ok(t),
                Err(EvalError::NoSolarEvent { primitive, .. }) => {
                    trace!(%primitive, "first_valid skipping missing solar event");
                }
                Err(other) => return Err(other),
            }
        }
        self.time_arg(last)
    }

    fn day_bounds(&mut self, arg: &Node, function: Function) -> Result<(ClockTime, ClockTime), EvalError> {
        let (start, end) = match &arg.expr {
            Expr::Base(BaseRef::Named(base)) => self.named_bounds(*base)?,
            Expr::Base(BaseRef::Custom(a, b)) => (self.time_arg(a)?, self.time_arg(b)?),
            Expr::Ident(name) => return Err(EvalError::UndefinedBase(name.clone())),
            _ => {
                return Err(mismatch(format!(
                    "{function}() expects a base as its day definition"
                )))
            }
        };
        if end <= start {
            return Err(EvalError::InvalidInterval {
                start: start.format_exact(),
                end: end.format_exact(),
            });
        }
        Ok((start, end))
    }

    fn named_bounds(&self, base: Base) -> Result<(ClockTime, ClockTime), EvalError> {
        match base.bounds() {
            DayBounds::Offset { before, after } => {
                let rise = self.sun(Horizon::Rising, true)?;
                let set = self.sun(Horizon::Setting, true)?;
                let before = time::minutes(before).ok_or_else(out_of_range)?;
                let after = time::minutes(after).ok_or_else(out_of_range)?;
                Ok((earlier(rise, before)?, later(set, after)?))
            }
            DayBounds::Proportional { fraction } => {
                let rise = self.sun(Horizon::Rising, true)?;
                let set = self.sun(Horizon::Setting, true)?;
                let offset = scaled(set - rise, fraction)?;
                Ok((earlier(rise, offset)?, later(set, offset)?))
            }
            DayBounds::Depression { degrees } => {
                let start = self.localize(self.day.depression(degrees, Horizon::Rising), || {
                    format!("{base} day start")
                })?;
                let end = self.localize(self.day.depression(degrees, Horizon::Setting), || {
                    format!("{base} day end")
                })?;
                Ok((start, end))
            }
        }
    }

    fn number(&mut self, node: &Node) -> Result<f64, EvalError> {
        match self.eval(node)? {
            Value::Number(n) => Ok(n),
            v => Err(mismatch(format!("expected a number, got {}", v.ty()))),
        }
    }

    fn angle(&mut self, node: &Node, function: Function) -> Result<f64, EvalError> {
        let degrees = self.number(node)?;
        if !(0.0..=90.0).contains(&degrees) {
            return Err(EvalError::Domain(format!(
                "{function}(): angle {degrees} is outside 0..=90"
            )));
        }
        Ok(degrees)
    }

    fn time_arg(&mut self, node: &Node) -> Result<ClockTime, EvalError> {
        match self.eval(node)? {
            Value::Time(t) => Ok(t),
            v => Err(mismatch(format!("expected a time, got {}", v.ty()))),
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node) -> Result<Value, EvalError> {
        if op.is_logical() {
            let left = self.boolean(lhs, op)?;
            return match (op, left) {
                (BinaryOp::And, false) => Ok(Value::Bool(false)),
                (BinaryOp::Or, true) => Ok(Value::Bool(true)),
                _ => self.boolean(rhs, op).map(Value::Bool),
            };
        }

        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;

        if op.is_comparison() {
            return compare(op, &left, &right).map(Value::Bool);
        }
        arithmetic(op, left, right)
    }

    fn boolean(&mut self, node: &Node, op: BinaryOp) -> Result<bool, EvalError> {
        match self.eval(node)? {
            Value::Bool(b) => Ok(b),
            v => Err(mismatch(format!(
                "'{}' needs boolean operands, got {}",
                op.symbol(),
                v.ty()
            ))),
        }
    }
}

fn mismatch(message: String) -> EvalError {
    EvalError::TypeMismatch(message)
}

fn out_of_range() -> EvalError {
    EvalError::Domain("time out of range".into())
}

fn arity(function: Function, got: usize) -> EvalError {
    EvalError::Domain(format!(
        "{function}() takes {} arguments, got {got}",
        function.arity()
    ))
}

fn pair(args: &[Node], function: Function) -> Result<(&Node, &Node), EvalError> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(arity(function, args.len())),
    }
}

fn later(t: ClockTime, d: TimeDelta) -> Result<ClockTime, EvalError> {
    t.checked_add(d).ok_or_else(out_of_range)
}

fn earlier(t: ClockTime, d: TimeDelta) -> Result<ClockTime, EvalError> {
    t.checked_sub(d).ok_or_else(out_of_range)
}

fn scaled(d: TimeDelta, factor: f64) -> Result<TimeDelta, EvalError> {
    time::scale(d, factor).ok_or_else(out_of_range)
}

fn direction_arg(node: &Node, function: Function) -> Result<Direction, EvalError> {
    match &node.expr {
        Expr::Direction(d) => Ok(*d),
        _ => Err(mismatch(format!("{function}() expects a direction"))),
    }
}

fn outer_direction(node: &Node, function: Function) -> Result<Direction, EvalError> {
    let dir = direction_arg(node, function)?;
    if dir.is_outer_anchor() {
        Ok(dir)
    } else {
        Err(EvalError::Domain(format!(
            "{function}() does not accept direction '{dir}'"
        )))
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering;

    let ordering: Option<Ordering> = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) =>
        {
            Some(a.cmp(b))
        }
        (Value::Bool(a), Value::Bool(b)) if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) => {
            Some(a.cmp(b))
        }
        _ => {
            return Err(mismatch(format!(
                "cannot compare {} {} {}",
                left.ty(),
                op.symbol(),
                right.ty()
            )))
        }
    };

    // NaN compares false under every operator.
    let Some(ord) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Ge => ord != Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::NotEq => ord != Ordering::Equal,
        _ => false,
    })
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    use Value::{Duration, Number, Time};

    Ok(match (op, left, right) {
        (BinaryOp::Add, Time(t), Duration(d)) | (BinaryOp::Add, Duration(d), Time(t)) => {
            Time(later(t, d)?)
        }
        (BinaryOp::Sub, Time(t), Duration(d)) => Time(earlier(t, d)?),
        (BinaryOp::Sub, Time(a), Time(b)) => Duration(a - b),
        (BinaryOp::Add, Duration(a), Duration(b)) => {
            Duration(a.checked_add(&b).ok_or_else(out_of_range)?)
        }
        (BinaryOp::Sub, Duration(a), Duration(b)) => {
            Duration(a.checked_sub(&b).ok_or_else(out_of_range)?)
        }
        (BinaryOp::Mul, Duration(d), Number(n)) | (BinaryOp::Mul, Number(n), Duration(d)) => {
            Duration(scaled(d, n)?)
        }
        (BinaryOp::Div, Duration(d), Number(n)) => {
            if n == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Duration(scaled(d, 1.0 / n)?)
        }
        (BinaryOp::Div, Duration(a), Duration(b)) => {
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Number(a.num_milliseconds() as f64 / b.num_milliseconds() as f64)
        }
        (BinaryOp::Add, Number(a), Number(b)) => Number(a + b),
        (BinaryOp::Sub, Number(a), Number(b)) => Number(a - b),
        (BinaryOp::Mul, Number(a), Number(b)) => Number(a * b),
        (BinaryOp::Div, Number(a), Number(b)) => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Number(a / b)
        }
        (op, l, r) => {
            return Err(mismatch(format!(
                "cannot apply {} {} {}",
                l.ty(),
                op.symbol(),
                r.ty()
            )))
        }
    })
}
