//! Zmanim formula language: source text → tokens → AST → validated formula → clock time.

pub mod ast;
pub mod context;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod names;
pub mod parser;
pub mod resolve;
pub mod token;
pub mod validate;

pub use ast::{Expr, Node};
pub use context::{EvaluationContext, Season};
pub use error::{
    CompileError, ContextError, EvalError, LexError, ParseError, Position, ResolveError,
    ValidationError,
};
pub use eval::{CalculationStep, NoReferences, ReferenceLookup, Value, ValueType};
pub use resolve::{resolve, BatchResult, Formula, FormulaId, FormulaSet};

use tracing::debug;

use crate::time::ClockTime;
use lexer::Lexer;
use parser::Parser;

/// A formula that has passed lexing, parsing and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    pub source: String,
    pub ast: Node,
}

impl CompiledFormula {
    /// Keys this formula references with `@`.
    pub fn references(&self) -> Vec<&str> {
        self.ast.references()
    }
}

/// The formula compiler.
///
/// Lexing and parsing stop at the first error; validation reports all of them.
pub struct Compiler;

impl Compiler {
    /// Parse source into an unvalidated AST.
    pub fn parse(source: &str) -> Result<Node, CompileError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser::new(tokens);
        Ok(parser.parse()?)
    }

    /// Parse and validate source into a [`CompiledFormula`].
    pub fn compile(source: &str) -> Result<CompiledFormula, Vec<CompileError>> {
        let ast = Self::parse(source).map_err(|e| vec![e])?;
        validate::validate(&ast)
            .map_err(|errors| errors.into_iter().map(CompileError::from).collect::<Vec<_>>())?;
        debug!(source, "compiled formula");
        Ok(CompiledFormula {
            source: source.to_string(),
            ast,
        })
    }
}

/// Compile a formula.
pub fn compile(source: &str) -> Result<CompiledFormula, Vec<CompileError>> {
    Compiler::compile(source)
}

/// Evaluate a compiled formula against a date and location.
pub fn evaluate(
    compiled: &CompiledFormula,
    ctx: &EvaluationContext,
    refs: &dyn ReferenceLookup,
) -> Result<ClockTime, EvalError> {
    eval::evaluate(&compiled.ast, ctx, refs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_reports_lex_errors() {
        let errs = compile("sunset - 18sec").unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(matches!(errs[0], CompileError::Lex(LexError::UnknownUnit { .. })));
    }

    #[test]
    fn compile_reports_parse_errors() {
        let errs = compile("solar(16.1)").unwrap_err();
        assert!(matches!(errs[0], CompileError::Parse(ParseError::ArityMismatch { .. })));
    }

    #[test]
    fn compile_collects_validation_errors() {
        let errs = compile("earlier_of(sunrize, solar(100, before_sunrise))").unwrap_err();
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| matches!(e, CompileError::Validation(_))));
    }

    #[test]
    fn compiled_formula_lists_references() {
        let f = compile("first_valid(@alos, sunrise - 72min)").unwrap();
        assert_eq!(f.references(), vec!["alos"]);
        assert_eq!(f.source, "first_valid(@alos, sunrise - 72min)");
    }
}
