//! Result and errors.
use crate::{
    lex::LexError,
    tokens::{Span, Token, TokenKind},
    types::Type,
};
use smol_str::SmolStr;
use thiserror::Error;

pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Every failure the compiler can report.
///
/// Any error aborts the whole compilation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("{span}: unexpected token '{found}', expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        span: Span,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEndOfInput { expected: String },

    #[error("{span}: mismatched type, expected '{expected}' but found '{found}'")]
    MismatchedType {
        expected: Type,
        found: Type,
        span: Span,
    },

    #[error("{span}: type of {context} could not be resolved")]
    UnresolvedType { context: String, span: Span },

    #[error("{span}: function '{name}' is already defined")]
    MultiplyDefinedFunction { name: SmolStr, span: Span },

    #[error("{span}: variable '{name}' is already defined")]
    MultiplyDefinedVariable { name: SmolStr, span: Span },

    #[error("{span}: undefined variable '{name}'")]
    UndefinedVariable { name: SmolStr, span: Span },

    #[error("{span}: undefined function '{name}'")]
    UndefinedFunction { name: SmolStr, span: Span },

    #[error("{span}: function '{name}' expects {expected} arguments, got {found}")]
    InvalidParameterCount {
        name: SmolStr,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("{span}: function '{name}' does not return a value on every path")]
    MissingReturnStatement { name: SmolStr, span: Span },

    #[error("{span}: unexpected statement, {reason}")]
    UnexpectedStatement { reason: &'static str, span: Span },

    #[error("{span}: return in function '{function}' requires a value of type '{expected}'")]
    MissingExpression {
        function: SmolStr,
        expected: Type,
        span: Span,
    },

    #[error("{span}: function '{function}' does not declare a return type, but a value is returned")]
    UnexpectedExpression { function: SmolStr, span: Span },

    #[error("{span}: function '{name}' does not return a value")]
    NoReturnValue { name: SmolStr, span: Span },
}

impl CompileError {
    /// Source location of the error, when one is known.
    pub fn span(&self) -> Option<Span> {
        use CompileError as E;
        match self {
            E::Lex(err) => Some(err.span()),
            E::UnexpectedEndOfInput { .. } => None,
            E::UnexpectedToken { span, .. }
            | E::MismatchedType { span, .. }
            | E::UnresolvedType { span, .. }
            | E::MultiplyDefinedFunction { span, .. }
            | E::MultiplyDefinedVariable { span, .. }
            | E::UndefinedVariable { span, .. }
            | E::UndefinedFunction { span, .. }
            | E::InvalidParameterCount { span, .. }
            | E::MissingReturnStatement { span, .. }
            | E::UnexpectedStatement { span, .. }
            | E::MissingExpression { span, .. }
            | E::UnexpectedExpression { span, .. }
            | E::NoReturnValue { span, .. } => Some(*span),
        }
    }

    /// Render the error with the offending source line and
    /// a caret marker underneath.
    pub fn display(&self, source: &str) -> String {
        let mut result = format!("error: {self}");
        if let Some(span) = self.span() {
            let line = span.surrounding_line(source);
            let gutter = span.line.to_string();
            let marker = format!(
                "{}{}",
                " ".repeat(span.column.saturating_sub(1) as usize),
                "^".repeat(span.size.max(1) as usize)
            );
            result.push_str(&format!("\n{} |", " ".repeat(gutter.len())));
            result.push_str(&format!("\n{gutter} | {line}"));
            result.push_str(&format!("\n{} | {marker}", " ".repeat(gutter.len())));
        }
        result
    }

    /// Grammar violation at the given token.
    ///
    /// Running into the `EOF` token is reported as the end of input.
    pub(crate) fn unexpected(token: &Token, expected: impl ToString) -> Self {
        match token.kind {
            TokenKind::EOF => CompileError::UnexpectedEndOfInput {
                expected: expected.to_string(),
            },
            _ => CompileError::UnexpectedToken {
                found: token.kind.to_string(),
                expected: expected.to_string(),
                span: token.span,
            },
        }
    }

    pub(crate) fn mismatch(expected: &Type, found: &Type, span: Span) -> Self {
        CompileError::MismatchedType {
            expected: expected.clone(),
            found: found.clone(),
            span,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display_marks_column() {
        const CODE: &str = "int x = 1;\nbool y = 2;\n";
        let err = CompileError::mismatch(
            &Type::boolean(),
            &Type::integer(),
            Span::new(20, 1, 2, 10),
        );

        let text = err.display(CODE);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "error: 2:10: mismatched type, expected 'bool' but found 'int'"
        );
        assert_eq!(lines[2], "2 | bool y = 2;");
        assert_eq!(lines[3], "  |          ^");
    }
}
