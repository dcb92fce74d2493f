//! Statement parsing.
use super::{
    annotation::parse_decl_type, block::parse_body, Block, Delimited, Expr, FuncDef, Ident, Parse,
    Parser, Range,
};
use crate::{
    error::{CompileError, CompileResult},
    tokens::{Keyword, Span, TokenKind},
    types::{Type, TypeTag},
};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Variable definition
    VarDef(VarDef),
    Assign(Assign),
    If(If),
    While(While),
    For(For),
    /// Function call with the result discarded.
    Call(Call),
    /// Marks where a function was defined. The function itself
    /// is stored in the function map.
    FuncDef(FuncDef),
    Return(Return),
    Print(Print),
    Assert(Assert),
    Exit(Exit),
    Block(Block),
}

/// Definition of a variable.
///
/// # Example
///
/// ```text
/// int x = 1;
/// var y = [1, 2];
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    /// Annotated type, unresolved for `var`.
    pub ty: Type,
    pub name: Ident,
    pub init: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub cond: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub cond: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// Iteration over an inclusive integer range.
///
/// # Example
///
/// ```text
/// for (i in 1..10) print(i);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub var: Ident,
    pub range: Range,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Print {
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assert {
    pub cond: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exit {
    pub code: Expr,
    pub span: Span,
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDef(stmt) => stmt.span,
            Stmt::Assign(stmt) => stmt.span,
            Stmt::If(stmt) => stmt.span,
            Stmt::While(stmt) => stmt.span,
            Stmt::For(stmt) => stmt.span,
            Stmt::Call(stmt) => stmt.span,
            Stmt::FuncDef(stmt) => stmt.span,
            Stmt::Return(stmt) => stmt.span,
            Stmt::Print(stmt) => stmt.span,
            Stmt::Assert(stmt) => stmt.span,
            Stmt::Exit(stmt) => stmt.span,
            Stmt::Block(stmt) => stmt.span,
        }
    }
}

impl Parse for Stmt {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        use Keyword as K;
        use TokenKind as T;

        match parser.stream.peek_kind() {
            T::Symbol('{') => Block::parse(parser).map(Stmt::Block),
            T::Keyword(keyword) => match keyword {
                K::If => If::parse(parser).map(Stmt::If),
                K::While => While::parse(parser).map(Stmt::While),
                K::For => For::parse(parser).map(Stmt::For),
                K::Function => FuncDef::parse(parser).map(Stmt::FuncDef),
                K::Return => Return::parse(parser).map(Stmt::Return),
                K::Print => Print::parse(parser).map(Stmt::Print),
                K::Assert => Assert::parse(parser).map(Stmt::Assert),
                K::Exit => Exit::parse(parser).map(Stmt::Exit),
                K::In | K::And | K::Or | K::Not => {
                    let token = parser.stream.next_token()?;
                    Err(CompileError::unexpected(&token, "statement"))
                }
            },
            T::Type(_) => VarDef::parse(parser).map(Stmt::VarDef),
            T::Ident(_) => {
                // Two token lookahead decides between assignment and call.
                let second = parser.stream.peek_nth(1);
                match second.as_ref().map(|token| &token.kind) {
                    Some(T::Symbol('=')) => Assign::parse(parser).map(Stmt::Assign),
                    Some(T::Symbol('(')) => Call::parse(parser).map(Stmt::Call),
                    _ => {
                        parser.stream.next_token()?;
                        let token = parser.stream.next_token()?;
                        Err(CompileError::unexpected(&token, "'=' or '('"))
                    }
                }
            }
            _ => {
                let token = parser.stream.next_token()?;
                Err(CompileError::unexpected(&token, "statement"))
            }
        }
    }
}

impl Parse for VarDef {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let start = parser.stream.peek().map(|token| token.span).unwrap_or_default();
        let ty = parse_decl_type(parser)?;
        let name = Ident::parse(parser)?;
        parser.stream.expect_symbol('=')?;
        let init = Expr::parse(parser)?;
        let semi = parser.stream.expect_symbol(';')?;

        // An annotation wins over the initializer, `var` adopts it.
        let resolved = if ty.is_resolved() {
            ty.require_unify(&init.ty, init.span)?
        } else {
            init.ty.clone()
        };
        parser.env.define(name.name.clone(), resolved);

        Ok(VarDef {
            ty,
            name,
            init,
            span: start.merge(&semi.span),
        })
    }
}

impl Parse for Assign {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let name = Ident::parse(parser)?;
        parser.stream.expect_symbol('=')?;
        let value = Expr::parse(parser)?;
        let semi = parser.stream.expect_symbol(';')?;

        if let Some(current) = parser.env.lookup(&name.name) {
            let narrowed = current.require_unify(&value.ty, value.span)?;
            parser.env.narrow(&name.name, narrowed);
        }

        Ok(Assign {
            span: name.span.merge(&semi.span),
            name,
            value,
        })
    }
}

/// Parse `( expr )` following a keyword.
fn parse_parenthesized(parser: &mut Parser) -> CompileResult<Expr> {
    parser.stream.expect_symbol('(')?;
    let expr = Expr::parse(parser)?;
    parser.stream.expect_symbol(')')?;
    Ok(expr)
}

impl Parse for If {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::If)?;
        let cond = parse_parenthesized(parser)?;
        Type::boolean().require(&cond.ty, cond.span)?;
        let body = parse_body(parser)?;

        Ok(If {
            span: keyword.span.merge(&body.span()),
            cond,
            body,
        })
    }
}

impl Parse for While {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::While)?;
        let cond = parse_parenthesized(parser)?;
        Type::boolean().require(&cond.ty, cond.span)?;
        let body = parse_body(parser)?;

        Ok(While {
            span: keyword.span.merge(&body.span()),
            cond,
            body,
        })
    }
}

impl Parse for For {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::For)?;
        parser.stream.expect_symbol('(')?;
        let var = Ident::parse(parser)?;
        parser.stream.expect_keyword(Keyword::In)?;
        let range = Range::parse(parser)?;
        parser.stream.expect_symbol(')')?;

        // The loop variable is only visible inside the loop.
        parser.env.push_scope();
        parser.env.define(var.name.clone(), Type::integer());
        let body = parse_body(parser);
        parser.env.pop_scope();
        let body = body?;

        Ok(For {
            span: keyword.span.merge(&body.span()),
            var,
            range,
            body,
        })
    }
}

impl Parse for Call {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let name = Ident::parse(parser)?;
        parser.stream.expect_symbol('(')?;
        let args = Delimited::<Expr>::parse_until(parser, ')')?;
        let semi = parser.stream.expect_symbol(';')?;

        Ok(Call {
            span: name.span.merge(&semi.span),
            name,
            args: args.items,
        })
    }
}

impl Parse for Return {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::Return)?;
        let value = if parser.stream.peek_kind().is_symbol(';') {
            None
        } else {
            Some(Expr::parse(parser)?)
        };
        let semi = parser.stream.expect_symbol(';')?;

        // Presence of the value is checked by the code generator.
        if let (Some(Some(expected)), Some(value)) = (parser.returns.last(), &value) {
            expected.require(&value.ty, value.span)?;
        }

        Ok(Return {
            value,
            span: keyword.span.merge(&semi.span),
        })
    }
}

impl Parse for Print {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::Print)?;
        let value = parse_parenthesized(parser)?;
        let semi = parser.stream.expect_symbol(';')?;

        if value.ty.is_resolved()
            && !value.ty.is(TypeTag::String)
            && !value.ty.is(TypeTag::Integer)
        {
            return Err(CompileError::mismatch(
                &Type::string(),
                &value.ty,
                value.span,
            ));
        }

        Ok(Print {
            value,
            span: keyword.span.merge(&semi.span),
        })
    }
}

impl Parse for Assert {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::Assert)?;
        let cond = parse_parenthesized(parser)?;
        let semi = parser.stream.expect_symbol(';')?;
        Type::boolean().require(&cond.ty, cond.span)?;

        Ok(Assert {
            cond,
            span: keyword.span.merge(&semi.span),
        })
    }
}

impl Parse for Exit {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let keyword = parser.stream.expect_keyword(Keyword::Exit)?;
        let code = parse_parenthesized(parser)?;
        let semi = parser.stream.expect_symbol(';')?;
        Type::integer().require(&code.ty, code.span)?;

        Ok(Exit {
            code,
            span: keyword.span.merge(&semi.span),
        })
    }
}

/// One line rendering, for diagnostics.
impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stmt::VarDef(stmt) => {
                if stmt.ty.is_resolved() {
                    write!(f, "{} {} = {};", stmt.ty, stmt.name, stmt.init)
                } else {
                    write!(f, "var {} = {};", stmt.name, stmt.init)
                }
            }
            Stmt::Assign(stmt) => write!(f, "{} = {};", stmt.name, stmt.value),
            Stmt::If(stmt) => write!(f, "if ({}) {}", stmt.cond, stmt.body),
            Stmt::While(stmt) => write!(f, "while ({}) {}", stmt.cond, stmt.body),
            Stmt::For(stmt) => write!(
                f,
                "for ({} in {}..{}) {}",
                stmt.var, stmt.range.start, stmt.range.end, stmt.body
            ),
            Stmt::Call(stmt) => {
                write!(f, "{}(", stmt.name)?;
                for (i, arg) in stmt.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ");")
            }
            Stmt::FuncDef(stmt) => write!(f, "function {}", stmt.name),
            Stmt::Return(Return { value: Some(value), .. }) => write!(f, "return {value};"),
            Stmt::Return(Return { value: None, .. }) => write!(f, "return;"),
            Stmt::Print(stmt) => write!(f, "print({});", stmt.value),
            Stmt::Assert(stmt) => write!(f, "assert({});", stmt.cond),
            Stmt::Exit(stmt) => write!(f, "exit({});", stmt.code),
            Stmt::Block(block) => {
                write!(f, "{{")?;
                for stmt in &block.stmts {
                    write!(f, " {stmt}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lex::tokenize, parsing::parse};

    fn parse_stmts(source: &str) -> CompileResult<Vec<Stmt>> {
        parse(tokenize(source)?).map(|program| program.stmts)
    }

    #[test]
    fn test_var_def_infers_type() {
        let stmts = parse_stmts("var xs = [1, 2]; int y = xs[0];").unwrap();
        assert_eq!(stmts.len(), 2);
        match &stmts[0] {
            Stmt::VarDef(def) => {
                assert_eq!(def.ty, Type::unresolved());
                assert_eq!(def.init.ty, Type::list_of(Type::integer()));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_var_def_checks_annotation() {
        assert!(matches!(
            parse_stmts("bool b = 1;"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(parse_stmts("list<int> xs = [];").is_ok());
    }

    #[test]
    fn test_assignment_narrows_unresolved() {
        assert!(parse_stmts("var xs = []; xs = [1]; xs = [2];").is_ok());
        assert!(matches!(
            parse_stmts("var xs = []; xs = [1]; xs = [true];"),
            Err(CompileError::MismatchedType { .. })
        ));
    }

    #[test]
    fn test_control_statements() {
        let stmts = parse_stmts(
            "int n = 0; while (n < 3) n = n + 1; if (n == 3) { print(\"done\"); } for (i in 1..n) print(i);",
        )
        .unwrap();
        assert_eq!(stmts.len(), 4);
        assert_eq!(stmts[1].to_string(), "while ((n < 3)) n = (n + 1);");
        assert_eq!(stmts[3].to_string(), "for (i in 1..n) print(i);");
    }

    #[test]
    fn test_conditions_must_be_boolean() {
        assert!(matches!(
            parse_stmts("if (1) exit(1);"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(matches!(
            parse_stmts("assert(0);"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(matches!(
            parse_stmts("exit(true);"),
            Err(CompileError::MismatchedType { .. })
        ));
        assert!(matches!(
            parse_stmts("print(true);"),
            Err(CompileError::MismatchedType { .. })
        ));
    }

    #[test]
    fn test_loop_variable_is_scoped() {
        // Outside the loop `i` is unknown again, so its type is unresolved
        // and any use type checks; existence is left to code generation.
        let stmts = parse_stmts("for (i in 0..2) { bool b = i == 1; } bool c = i;").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_grammar_errors() {
        assert!(matches!(
            parse_stmts("int = 3;"),
            Err(CompileError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_stmts("x + 1;"),
            Err(CompileError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_stmts("{ print(1);"),
            Err(CompileError::UnexpectedEndOfInput { .. })
        ));
        assert!(matches!(
            parse_stmts("print(1)"),
            Err(CompileError::UnexpectedEndOfInput { .. })
        ));
    }
}
