//! Static checks over a parsed formula.
//!
//! Infers a [`ValueType`] for every node and reports every problem it finds
//! rather than stopping at the first one.

use super::ast::{BaseRef, BinaryOp, Callee, Expr, Literal, Node, UnaryOp};
use super::error::ValidationError;
use super::eval::ValueType;
use super::names::{ConditionVar, Function};

/// Check a formula's names, argument kinds, literal ranges and types.
pub fn validate(ast: &Node) -> Result<(), Vec<ValidationError>> {
    let mut validator = Validator::default();
    if let Some(ty) = validator.infer(ast) {
        if ty != ValueType::Time {
            validator.errors.push(ValidationError::NotATime {
                found: ty.to_string(),
            });
        }
    }
    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(validator.errors)
    }
}

/// Check `@references` against the keys a formula set knows about.
pub fn validate_references(
    ast: &Node,
    key: &str,
    exists: impl Fn(&str) -> bool,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    ast.walk(&mut |node| {
        if let Expr::Reference(name) = &node.expr {
            if name == key {
                errors.push(ValidationError::SelfReference {
                    name: name.clone(),
                    pos: node.pos,
                });
            } else if !exists(name) {
                errors.push(ValidationError::UnknownReference {
                    name: name.clone(),
                    pos: node.pos,
                });
            }
        }
    });
    errors
}

#[derive(Default)]
struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    /// `None` means the type is unknown because an error was already reported.
    fn infer(&mut self, node: &Node) -> Option<ValueType> {
        match &node.expr {
            Expr::Literal(lit) => Some(match lit {
                Literal::Number(_) | Literal::Date { .. } => ValueType::Number,
                Literal::Duration(_) => ValueType::Duration,
                Literal::String(_) => ValueType::String,
                Literal::Bool(_) => ValueType::Boolean,
            }),
            Expr::Primitive(_) | Expr::Reference(_) => Some(ValueType::Time),
            Expr::Ident(name) => {
                self.errors.push(ValidationError::UnknownPrimitive {
                    name: name.clone(),
                    pos: node.pos,
                });
                None
            }
            Expr::Condition(var) => Some(match var {
                ConditionVar::DayLength => ValueType::Duration,
                ConditionVar::Season => ValueType::String,
                _ => ValueType::Number,
            }),
            Expr::Direction(d) => {
                self.errors.push(ValidationError::MisplacedDirection {
                    name: d.to_string(),
                    pos: node.pos,
                });
                None
            }
            Expr::Base(base) => {
                let name = match base {
                    BaseRef::Named(b) => b.to_string(),
                    BaseRef::Custom(..) => "custom".to_string(),
                };
                self.errors
                    .push(ValidationError::MisplacedBase { name, pos: node.pos });
                None
            }
            Expr::Unary { op, operand } => {
                let ty = self.infer(operand)?;
                match (op, ty) {
                    (UnaryOp::Not, ValueType::Boolean) => Some(ValueType::Boolean),
                    (UnaryOp::Neg, ValueType::Number | ValueType::Duration) => Some(ty),
                    (UnaryOp::Not, _) => self.mismatch(node, format!("'!' needs a boolean, got {ty}")),
                    (UnaryOp::Neg, _) => self.mismatch(node, format!("cannot negate a {ty}")),
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = self.infer(lhs);
                let right = self.infer(rhs);
                let (left, right) = (left?, right?);
                match binary_type(*op, left, right) {
                    Some(ty) => Some(ty),
                    None => self.mismatch(
                        node,
                        format!("cannot apply {left} {} {right}", op.symbol()),
                    ),
                }
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if let Some(ty) = self.infer(cond) {
                    if ty != ValueType::Boolean {
                        self.mismatch::<()>(cond, format!("condition must be boolean, got {ty}"));
                    }
                }
                let then_ty = self.infer(then);
                let else_ty = self.infer(otherwise);
                match (then_ty, else_ty) {
                    (Some(a), Some(b)) if a == b => Some(a),
                    (Some(a), Some(b)) => {
                        self.errors.push(ValidationError::BranchMismatch {
                            then_type: a.to_string(),
                            else_type: b.to_string(),
                            pos: node.pos,
                        });
                        None
                    }
                    _ => None,
                }
            }
            Expr::Call { callee, args } => match callee {
                Callee::Builtin(function) => {
                    self.call(node, *function, args);
                    Some(ValueType::Time)
                }
                Callee::Unknown(name) => {
                    self.errors.push(ValidationError::UnknownFunction {
                        name: name.clone(),
                        pos: node.pos,
                    });
                    for arg in args {
                        self.infer(arg);
                    }
                    None
                }
            },
        }
    }

    fn mismatch<T>(&mut self, node: &Node, message: String) -> Option<T> {
        self.errors.push(ValidationError::TypeMismatch {
            message,
            pos: node.pos,
        });
        None
    }

    fn call(&mut self, node: &Node, function: Function, args: &[Node]) {
        if !function.arity().accepts(args.len()) {
            self.mismatch::<()>(
                node,
                format!(
                    "{function}() takes {} arguments, got {}",
                    function.arity(),
                    args.len()
                ),
            );
            return;
        }
        match (function, args) {
            (Function::Solar | Function::SeasonalSolar, [angle, dir]) => {
                self.number_arg(function, angle, "angle", "0..=90", |v| {
                    (0.0..=90.0).contains(&v)
                });
                self.direction_arg(function, dir);
            }
            (Function::ProportionalHours, [hours, base]) => {
                self.number_arg(function, hours, "hours", "0..=12", |v| {
                    (0.0..=12.0).contains(&v)
                });
                self.base_arg(function, base);
            }
            (Function::ProportionalMinutes, [minutes, dir, base @ ..]) => {
                self.number_arg(function, minutes, "minutes", "(0, 200]", |v| {
                    v > 0.0 && v <= 200.0
                });
                self.direction_arg(function, dir);
                for base in base {
                    self.base_arg(function, base);
                }
            }
            _ => {
                for arg in args {
                    self.time_arg(function, arg);
                }
            }
        }
    }

    fn number_arg(
        &mut self,
        function: Function,
        arg: &Node,
        what: &'static str,
        range: &'static str,
        in_range: impl Fn(f64) -> bool,
    ) {
        if let Expr::Literal(Literal::Number(value)) = &arg.expr {
            let value = *value;
            if !in_range(value) {
                self.errors.push(ValidationError::OutOfRange {
                    function: function.to_string(),
                    what,
                    value,
                    range,
                    pos: arg.pos,
                });
            }
            return;
        }
        if let Some(ty) = self.infer(arg) {
            if ty != ValueType::Number {
                self.mismatch::<()>(arg, format!("{function}() {what} must be a number, got {ty}"));
            }
        }
    }

    fn time_arg(&mut self, function: Function, arg: &Node) {
        if let Some(ty) = self.infer(arg) {
            if ty != ValueType::Time {
                self.mismatch::<()>(arg, format!("{function}() expects times, got {ty}"));
            }
        }
    }

    fn direction_arg(&mut self, function: Function, arg: &Node) {
        match &arg.expr {
            Expr::Direction(dir) => {
                if function.restricts_direction() && !dir.is_outer_anchor() {
                    self.errors.push(ValidationError::DirectionNotAllowed {
                        direction: dir.to_string(),
                        function: function.to_string(),
                        pos: arg.pos,
                    });
                }
            }
            Expr::Ident(name) => self.errors.push(ValidationError::UnknownDirection {
                name: name.clone(),
                function: function.to_string(),
                pos: arg.pos,
            }),
            _ => {
                self.mismatch::<()>(arg, format!("{function}() expects a direction"));
            }
        }
    }

    fn base_arg(&mut self, function: Function, arg: &Node) {
        match &arg.expr {
            Expr::Base(BaseRef::Named(_)) => {}
            Expr::Base(BaseRef::Custom(start, end)) => {
                self.time_arg(function, start);
                self.time_arg(function, end);
            }
            Expr::Ident(name) => self.errors.push(ValidationError::UnknownBase {
                name: name.clone(),
                function: function.to_string(),
                pos: arg.pos,
            }),
            _ => {
                self.mismatch::<()>(arg, format!("{function}() expects a base"));
            }
        }
    }
}

/// Result type of a binary operator, or `None` if the operands don't fit.
pub fn binary_type(op: BinaryOp, left: ValueType, right: ValueType) -> Option<ValueType> {
    use ValueType::{Boolean, Duration, Number, Time};

    match op {
        BinaryOp::And | BinaryOp::Or => (left == Boolean && right == Boolean).then_some(Boolean),
        BinaryOp::Eq | BinaryOp::NotEq => (left == right).then_some(Boolean),
        BinaryOp::Gt | BinaryOp::Lt | BinaryOp::Ge | BinaryOp::Le => {
            (left == right && matches!(left, Number | Duration | Time)).then_some(Boolean)
        }
        BinaryOp::Add => match (left, right) {
            (Time, Duration) | (Duration, Time) => Some(Time),
            (Duration, Duration) => Some(Duration),
            (Number, Number) => Some(Number),
            _ => None,
        },
        BinaryOp::Sub => match (left, right) {
            (Time, Duration) => Some(Time),
            (Time, Time) | (Duration, Duration) => Some(Duration),
            (Number, Number) => Some(Number),
            _ => None,
        },
        BinaryOp::Mul => match (left, right) {
            (Duration, Number) | (Number, Duration) => Some(Duration),
            (Number, Number) => Some(Number),
            _ => None,
        },
        BinaryOp::Div => match (left, right) {
            (Duration, Number) => Some(Duration),
            (Duration, Duration) | (Number, Number) => Some(Number),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::lexer::tokenize;
    use crate::dsl::parser::parse;

    fn check(src: &str) -> Result<(), Vec<ValidationError>> {
        validate(&parse(tokenize(src).unwrap()).unwrap())
    }

    fn errors(src: &str) -> Vec<ValidationError> {
        check(src).unwrap_err()
    }

    #[test]
    fn accepts_common_formulas() {
        for src in [
            "sunrise",
            "sunset - 18min",
            "solar(16.1, before_sunrise)",
            "proportional_hours(3, gra)",
            "proportional_hours(4, custom(solar(16.1, before_sunrise), solar(16.1, after_sunset)))",
            "proportional_minutes(72, before_sunrise)",
            "proportional_minutes(90, after_visible_sunset, mga_72)",
            "seasonal_solar(16.1, before_geometric_sunrise)",
            "midpoint(sunrise, sunset)",
            "first_valid(solar(16.1, before_sunrise), sunrise - 72min, civil_dawn)",
            "if (latitude > 60 && season == \"summer\") { civil_dawn } else { sunrise - 72min }",
            "if (date >= 1-Mar && date < 1-Oct) { @candles + 40min } else { sunset + 50min }",
            "sunrise + (sunset - sunrise) / 2",
        ] {
            assert_eq!(check(src), Ok(()), "{src}");
        }
    }

    #[test]
    fn unknown_names() {
        let errs = errors("sunrize - 18min");
        assert!(matches!(&errs[0], ValidationError::UnknownPrimitive { name, .. } if name == "sunrize"));

        let errs = errors("zmanis(3, gra)");
        assert!(matches!(&errs[0], ValidationError::UnknownFunction { name, .. } if name == "zmanis"));

        let errs = errors("solar(16.1, before_dawn)");
        assert!(matches!(&errs[0], ValidationError::UnknownDirection { name, .. } if name == "before_dawn"));

        let errs = errors("proportional_hours(3, rabbeinu_tam)");
        assert!(matches!(&errs[0], ValidationError::UnknownBase { name, .. } if name == "rabbeinu_tam"));
    }

    #[test]
    fn literal_ranges() {
        let errs = errors("solar(95, before_sunrise)");
        assert!(matches!(
            &errs[0],
            ValidationError::OutOfRange { what: "angle", value, .. } if *value == 95.0
        ));
        assert!(matches!(
            &errors("proportional_hours(13, gra)")[0],
            ValidationError::OutOfRange { what: "hours", .. }
        ));
        assert!(matches!(
            &errors("proportional_minutes(0, before_sunrise)")[0],
            ValidationError::OutOfRange { what: "minutes", .. }
        ));
        assert!(matches!(
            &errors("proportional_hours(-1, gra)")[0],
            ValidationError::OutOfRange { .. }
        ));
    }

    #[test]
    fn restricted_directions() {
        let errs = errors("seasonal_solar(16.1, before_noon)");
        assert!(matches!(&errs[0], ValidationError::DirectionNotAllowed { .. }));
        let errs = errors("proportional_minutes(72, after_visible_sunrise)");
        assert!(matches!(&errs[0], ValidationError::DirectionNotAllowed { .. }));
        // plain solar accepts any direction
        assert_eq!(check("solar(12, after_noon)"), Ok(()));
    }

    #[test]
    fn type_errors() {
        assert!(matches!(
            &errors("sunrise + sunset")[0],
            ValidationError::TypeMismatch { .. }
        ));
        assert!(matches!(
            &errors("72min")[0],
            ValidationError::NotATime { found } if found == "duration"
        ));
        assert!(matches!(
            &errors("if (month) { sunrise } else { sunset }")[0],
            ValidationError::TypeMismatch { .. }
        ));
        assert!(matches!(
            &errors("if (month > 3) { sunrise } else { 10min }")[0],
            ValidationError::BranchMismatch { .. }
        ));
        assert!(matches!(
            &errors("midpoint(sunrise, 10min)")[0],
            ValidationError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn misplaced_argument_kinds() {
        assert!(matches!(
            &errors("before_sunrise")[0],
            ValidationError::MisplacedDirection { .. }
        ));
        assert!(matches!(&errors("gra")[0], ValidationError::MisplacedBase { .. }));
    }

    #[test]
    fn collects_every_error() {
        let errs = errors("midpoint(sunrize, solar(95, before_dawn))");
        assert_eq!(errs.len(), 3, "{errs:?}");
    }

    #[test]
    fn hand_built_call_with_missing_arguments() {
        let pos = crate::dsl::error::Position::default();
        let call = Node::new(
            Expr::Call {
                callee: Callee::Builtin(Function::ProportionalHours),
                args: vec![Node::new(Expr::Literal(Literal::Number(3.0)), pos)],
            },
            pos,
        );
        let errs = validate(&call).unwrap_err();
        assert!(matches!(
            &errs[0],
            ValidationError::TypeMismatch { message, .. } if message.contains("takes 2 arguments, got 1")
        ));
    }

    #[test]
    fn reference_checks() {
        let ast = parse(tokenize("@candles + 40min").unwrap()).unwrap();
        assert!(validate_references(&ast, "havdalah", |k| k == "candles").is_empty());

        let errs = validate_references(&ast, "havdalah", |_| false);
        assert!(matches!(&errs[0], ValidationError::UnknownReference { name, .. } if name == "candles"));

        let errs = validate_references(&ast, "candles", |_| true);
        assert!(matches!(&errs[0], ValidationError::SelfReference { .. }));
    }
}
