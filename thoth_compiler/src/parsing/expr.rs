//! Expressions, parsed by precedence climbing.
use super::{annotation::parse_element_type, literal::parse_list, Delimited, Parse, Parser};
use crate::{
    error::{CompileError, CompileResult},
    tokens::{Keyword, Span, TokenKind, TypeName},
    types::{Type, TypeTag},
};
use smol_str::SmolStr;
use std::fmt;

/// Expression node, annotated with the type known at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Bool(bool),
    /// Index into the literal string table.
    Str(usize),
    Var(SmolStr),
    List {
        /// Declared element type, or the type inferred from the members.
        elem: Type,
        items: Vec<Expr>,
    },
    Index {
        list: Box<Expr>,
        index: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        name: SmolStr,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinaryOp {
    /// Recognise an operator from the next token, and the adjacent
    /// token after it if there is one.
    ///
    /// Returns the operator and the number of tokens it spans.
    #[rustfmt::skip]
    pub fn from_tokens(first: &TokenKind, second: Option<&TokenKind>) -> Option<(Self, usize)> {
        use TokenKind as T;

        let second = match second {
            Some(T::Symbol(c)) => Some(*c),
            _ => None,
        };

        match (first, second) {
            (T::Symbol('='), Some('=')) => Some((Self::Eq, 2)),
            (T::Symbol('!'), Some('=')) => Some((Self::NotEq, 2)),
            (T::Symbol('<'), Some('=')) => Some((Self::LessEq, 2)),
            (T::Symbol('>'), Some('=')) => Some((Self::GreaterEq, 2)),
            (T::Symbol('<'), _)         => Some((Self::Less, 1)),
            (T::Symbol('>'), _)         => Some((Self::Greater, 1)),
            (T::Symbol('+'), _)         => Some((Self::Add, 1)),
            (T::Symbol('-'), _)         => Some((Self::Sub, 1)),
            (T::Symbol('*'), _)         => Some((Self::Mul, 1)),
            (T::Symbol('/'), _)         => Some((Self::Div, 1)),
            (T::Keyword(Keyword::And), _) => Some((Self::And, 1)),
            (T::Keyword(Keyword::Or), _)  => Some((Self::Or, 1)),
            _ => None,
        }
    }

    /// Binding power, higher binds tighter.
    ///
    /// `and` and `or` share a level with `+` and `-`.
    #[rustfmt::skip]
    pub fn precedence(self) -> u8 {
        use BinaryOp as B;
        match self {
            B::Eq | B::NotEq | B::Less | B::LessEq | B::Greater | B::GreaterEq => 1,
            B::Add | B::Sub | B::And | B::Or                                   => 2,
            B::Mul | B::Div                                                    => 3,
        }
    }

    #[rustfmt::skip]
    pub fn symbol(self) -> &'static str {
        use BinaryOp as B;
        match self {
            B::Add       => "+",
            B::Sub       => "-",
            B::Mul       => "*",
            B::Div       => "/",
            B::And       => "and",
            B::Or        => "or",
            B::Eq        => "==",
            B::NotEq     => "!=",
            B::Less      => "<",
            B::LessEq    => "<=",
            B::Greater   => ">",
            B::GreaterEq => ">=",
        }
    }

    /// Check the operand types and compute the result type.
    ///
    /// Shared by the parser and the code generator so both apply
    /// the same rules.
    pub fn check_operands(self, lhs: (&Type, Span), rhs: (&Type, Span)) -> CompileResult<Type> {
        use BinaryOp as B;
        let (lhs_ty, lhs_span) = lhs;
        let (rhs_ty, rhs_span) = rhs;

        match self {
            B::Add | B::Sub | B::Mul | B::Div => {
                Type::integer().require(lhs_ty, lhs_span)?;
                Type::integer().require(rhs_ty, rhs_span)?;
                Ok(lhs_ty.or(rhs_ty))
            }
            B::And | B::Or => {
                Type::boolean().require(lhs_ty, lhs_span)?;
                Type::boolean().require(rhs_ty, rhs_span)?;
                Ok(Type::boolean())
            }
            B::Less | B::LessEq | B::Greater | B::GreaterEq => {
                Type::integer().require(lhs_ty, lhs_span)?;
                Type::integer().require(rhs_ty, rhs_span)?;
                Ok(Type::boolean())
            }
            B::Eq | B::NotEq => {
                lhs_ty.require(rhs_ty, rhs_span)?;
                let operand = lhs_ty.or(rhs_ty);
                if operand.is_resolved()
                    && !operand.is(TypeTag::Integer)
                    && !operand.is(TypeTag::Boolean)
                {
                    return Err(CompileError::mismatch(&Type::integer(), &operand, lhs_span));
                }
                Ok(Type::boolean())
            }
        }
    }
}

/// Result type of indexing into a list.
///
/// The index must be an integer and the operand a list, unless either
/// is still unresolved.
pub fn index_type(list: (&Type, Span), index: (&Type, Span)) -> CompileResult<Type> {
    let (list_ty, list_span) = list;
    let (index_ty, index_span) = index;

    Type::integer().require(index_ty, index_span)?;
    if list_ty.is_resolved() && !list_ty.is(TypeTag::List) {
        return Err(CompileError::mismatch(
            &Type::list_of(Type::unresolved()),
            list_ty,
            list_span,
        ));
    }

    Ok(list_ty.element().cloned().unwrap_or_default())
}

/// Integer range `start..end` in the header of a `for` loop.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub start: Expr,
    pub end: Expr,
    pub span: Span,
}

impl Parse for Expr {
    #[inline]
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        parse_binary(parser, 1)
    }
}

impl Parse for Range {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let start = parse_binary(parser, 1)?;
        parser.stream.expect_compound(['.', '.'])?;
        let end = parse_binary(parser, 1)?;

        Type::integer().require(&start.ty, start.span)?;
        Type::integer().require(&end.ty, end.span)?;

        Ok(Range {
            span: start.span.merge(&end.span),
            start,
            end,
        })
    }
}

/// Precedence climbing.
///
/// Operators are consumed while their precedence is at least
/// `min_precedence`. The right operand is parsed at the operator's own
/// precedence, so operators of equal precedence group to the right.
fn parse_binary(parser: &mut Parser, min_precedence: u8) -> CompileResult<Expr> {
    let mut lhs = parse_primary(parser)?;

    loop {
        let (first, second) = parser.stream.peek_pair();
        let (op, width) = match BinaryOp::from_tokens(&first, second.as_ref()) {
            Some(found) => found,
            None => break,
        };

        let precedence = op.precedence();
        if precedence < min_precedence {
            break;
        }

        parser.stream.skip(width)?;
        let rhs = parse_binary(parser, precedence)?;
        let ty = op.check_operands((&lhs.ty, lhs.span), (&rhs.ty, rhs.span))?;
        let span = lhs.span.merge(&rhs.span);

        lhs = Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            span,
        };
    }

    Ok(lhs)
}

/// Atom followed by any number of `[index]` suffixes.
fn parse_primary(parser: &mut Parser) -> CompileResult<Expr> {
    let mut expr = parse_atom(parser)?;

    while parser.stream.match_symbol('[') {
        let index = Expr::parse(parser)?;
        let close = parser.stream.expect_symbol(']')?;
        let ty = index_type((&expr.ty, expr.span), (&index.ty, index.span))?;
        let span = expr.span.merge(&close.span);

        expr = Expr {
            kind: ExprKind::Index {
                list: Box::new(expr),
                index: Box::new(index),
            },
            ty,
            span,
        };
    }

    Ok(expr)
}

fn parse_atom(parser: &mut Parser) -> CompileResult<Expr> {
    use TokenKind as T;

    let token = parser.stream.next_token()?;
    let span = token.span;

    match token.kind {
        T::Int(value) => Ok(Expr {
            kind: ExprKind::Int(value),
            ty: Type::integer(),
            span,
        }),
        T::Symbol('-') => {
            let literal = parser.stream.next_token()?;
            match literal.kind {
                T::Int(value) => Ok(Expr {
                    kind: ExprKind::Int(-value),
                    ty: Type::integer(),
                    span: span.merge(&literal.span),
                }),
                _ => Err(CompileError::unexpected(&literal, "integer literal")),
            }
        }
        T::Bool(value) => Ok(Expr {
            kind: ExprKind::Bool(value),
            ty: Type::boolean(),
            span,
        }),
        T::Str(index) => Ok(Expr {
            kind: ExprKind::Str(index),
            ty: Type::string(),
            span,
        }),
        T::Ident(name) => {
            if parser.stream.match_symbol('(') {
                let args = Delimited::<Expr>::parse_until(parser, ')')?;
                // Functions defined later resolve during code generation.
                let ty = parser
                    .functions
                    .get(&name)
                    .and_then(|func| func.return_type.clone())
                    .unwrap_or_default();
                Ok(Expr {
                    kind: ExprKind::Call {
                        name,
                        args: args.items,
                    },
                    ty,
                    span: span.merge(&args.close),
                })
            } else {
                let ty = parser.env.lookup(&name).cloned().unwrap_or_default();
                Ok(Expr {
                    kind: ExprKind::Var(name),
                    ty,
                    span,
                })
            }
        }
        T::Symbol('(') => {
            let inner = Expr::parse(parser)?;
            let close = parser.stream.expect_symbol(')')?;
            Ok(Expr {
                span: span.merge(&close.span),
                ..inner
            })
        }
        T::Keyword(Keyword::Not) => {
            let operand = parse_primary(parser)?;
            Type::boolean().require(&operand.ty, operand.span)?;
            Ok(Expr {
                span: span.merge(&operand.span),
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                ty: Type::boolean(),
            })
        }
        T::Symbol('[') => parse_list(parser, Type::unresolved(), span),
        T::Type(TypeName::List) => {
            let elem = parse_element_type(parser)?;
            parser.stream.expect_symbol('[')?;
            parse_list(parser, elem, span)
        }
        _ => Err(CompileError::unexpected(&token, "expression")),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ExprKind::Int(value) => write!(f, "{value}"),
            ExprKind::Bool(value) => write!(f, "{value}"),
            ExprKind::Str(index) => write!(f, "string_{index}"),
            ExprKind::Var(name) => write!(f, "{name}"),
            ExprKind::List { elem, items } => {
                write!(f, "list<{elem}>[")?;
                write_comma_separated(f, items)?;
                write!(f, "]")
            }
            ExprKind::Index { list, index } => write!(f, "{list}[{index}]"),
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "not {operand}"),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            ExprKind::Call { name, args } => {
                write!(f, "{name}(")?;
                write_comma_separated(f, args)?;
                write!(f, ")")
            }
        }
    }
}

fn write_comma_separated(f: &mut fmt::Formatter, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lex::tokenize;

    fn parse_expr(source: &str) -> CompileResult<Expr> {
        let mut parser = Parser::new(tokenize(source).unwrap().tokens);
        Expr::parse(&mut parser)
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expr("1 + 2 * 3 < 4 - 5").unwrap();
        assert_eq!(expr.to_string(), "((1 + (2 * 3)) < (4 - 5))");
        assert_eq!(expr.ty, Type::boolean());
    }

    #[test]
    fn test_equal_precedence_groups_right() {
        let expr = parse_expr("10 - 4 - 3").unwrap();
        assert_eq!(expr.to_string(), "(10 - (4 - 3))");

        let expr = parse_expr("8 / 4 / 2").unwrap();
        assert_eq!(expr.to_string(), "(8 / (4 / 2))");

        let expr = parse_expr("true and false or true").unwrap();
        assert_eq!(expr.to_string(), "(true and (false or true))");
    }

    #[test]
    fn test_chained_comparison_is_not_well_typed() {
        // Binds as `2 >= (3 == false)`.
        assert!(matches!(
            parse_expr("2 >= 3 == false"),
            Err(CompileError::MismatchedType { .. })
        ));

        let expr = parse_expr("(2 >= 3) == false").unwrap();
        assert_eq!(expr.ty, Type::boolean());
    }

    #[test]
    fn test_logical_shares_additive_precedence() {
        let expr = parse_expr("a == b and c").unwrap();
        assert_eq!(expr.to_string(), "(a == (b and c))");

        // Binds as `1 == (1 and 2)`, which is not well typed.
        assert!(matches!(
            parse_expr("1 == 1 and 2 == 2"),
            Err(CompileError::MismatchedType { .. })
        ));
    }

    #[test]
    fn test_compound_operators() {
        let expr = parse_expr("1 >= 2").unwrap();
        assert!(matches!(
            expr.kind,
            ExprKind::Binary {
                op: BinaryOp::GreaterEq,
                ..
            }
        ));

        // Separated symbols do not form one operator.
        assert!(parse_expr("1 > = 2").is_err());
    }

    #[test]
    fn test_negative_literal() {
        let expr = parse_expr("3 - -2").unwrap();
        assert_eq!(expr.to_string(), "(3 - -2)");
    }

    #[test]
    fn test_arithmetic_requires_integers() {
        assert!(matches!(
            parse_expr("1 + true"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(matches!(
            parse_expr("not 1"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(matches!(
            parse_expr("\"a\" == \"a\""),
            Err(CompileError::MismatchedType { .. })
        ));
    }

    #[test]
    fn test_unresolved_operands_are_left_biased() {
        let expr = parse_expr("x + 1").unwrap();
        assert_eq!(expr.ty, Type::integer());

        let expr = parse_expr("x + y").unwrap();
        assert_eq!(expr.ty, Type::unresolved());

        let expr = parse_expr("x or y").unwrap();
        assert_eq!(expr.ty, Type::boolean());
    }

    #[test]
    fn test_list_literals() {
        let expr = parse_expr("[1, 2, 3]").unwrap();
        assert_eq!(expr.ty, Type::list_of(Type::integer()));

        let expr = parse_expr("[]").unwrap();
        assert_eq!(expr.ty, Type::list_of(Type::unresolved()));

        let expr = parse_expr("list<bool>[]").unwrap();
        assert_eq!(expr.ty, Type::list_of(Type::boolean()));

        let expr = parse_expr("[[1], []]").unwrap();
        assert_eq!(expr.ty, Type::list_of(Type::list_of(Type::integer())));

        assert!(matches!(
            parse_expr("[1, true]"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(matches!(
            parse_expr("list<string>[1]"),
            Err(CompileError::MismatchedType { .. })
        ));
    }

    #[test]
    fn test_indexing() {
        let expr = parse_expr("[[1, 2]][0][1]").unwrap();
        assert_eq!(expr.ty, Type::integer());

        assert!(matches!(
            parse_expr("[1][true]"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(matches!(
            parse_expr("5[0]"),
            Err(CompileError::MismatchedType { .. })
        ));
    }

    #[test]
    fn test_call_of_unknown_function_is_unresolved() {
        let expr = parse_expr("later(1, 2)").unwrap();
        assert_eq!(expr.ty, Type::unresolved());
        assert_eq!(expr.to_string(), "later(1, 2)");
    }
}
