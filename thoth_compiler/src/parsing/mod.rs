//! Syntactic analysis.
//!
//! Parsing and type resolution happen in one pass: every expression
//! node is given a [`Type`] as it is built, and statements check the
//! types they require as soon as they are parsed.
mod annotation;
mod block;
mod delim;
mod expr;
mod func;
mod ident;
mod literal;
mod stmts;

pub use annotation::*;
pub use block::*;
pub use delim::*;
pub use expr::*;
pub use func::*;
pub use ident::*;
pub use stmts::*;

use crate::{
    error::CompileResult,
    lex::Lexed,
    literals::LiteralTable,
    token_stream::TokenStream,
    tokens::{Token, TokenKind},
    types::Type,
};
use log::debug;
use smol_str::SmolStr;
use std::collections::HashMap;

pub trait Parse: Sized {
    fn parse(parser: &mut Parser) -> CompileResult<Self>;
}

/// Output of the parser.
///
/// Function definition statements stay in `stmts` in source order,
/// while their bodies live in `functions`.
#[derive(Debug)]
pub struct ParsedProgram {
    pub stmts: Vec<Stmt>,
    pub strings: LiteralTable,
    pub functions: FunctionMap,
}

/// Parse the complete token sequence of a program.
pub fn parse(lexed: Lexed) -> CompileResult<ParsedProgram> {
    let Lexed { tokens, strings } = lexed;
    let mut parser = Parser::new(tokens);
    let mut stmts = vec![];

    while parser.stream.peek_kind() != TokenKind::EOF {
        stmts.push(Stmt::parse(&mut parser)?);
    }

    debug!(
        "parsed {} statements and {} functions",
        stmts.len(),
        parser.functions.len()
    );

    Ok(ParsedProgram {
        stmts,
        strings,
        functions: parser.functions,
    })
}

/// Parser state for one compilation.
pub struct Parser {
    pub stream: TokenStream,
    /// Variable types visible at the current position.
    pub env: TypeEnv,
    /// Functions defined so far.
    pub functions: FunctionMap,
    /// Declared return types of the functions being parsed,
    /// innermost last.
    pub returns: Vec<Option<Type>>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            stream: TokenStream::new(tokens),
            env: TypeEnv::new(),
            functions: FunctionMap::new(),
            returns: vec![],
        }
    }
}

/// Scoped mapping of variable names to the types known at parse time.
///
/// Names the parser has not seen are not an error here; the code
/// generator decides whether a variable exists.
#[derive(Debug)]
pub struct TypeEnv {
    scopes: Vec<HashMap<SmolStr, Type>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        // The outermost scope is never popped.
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn define(&mut self, name: SmolStr, ty: Type) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name, ty);
        }
    }

    pub fn lookup(&self, name: &SmolStr) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// Replace the type of the innermost definition of `name`.
    pub fn narrow(&mut self, name: &SmolStr, ty: Type) {
        if let Some(slot) = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        {
            *slot = ty;
        }
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_type_env_scopes() {
        let mut env = TypeEnv::new();
        let x = SmolStr::from("x");
        env.define(x.clone(), Type::integer());

        env.push_scope();
        env.define(x.clone(), Type::boolean());
        assert_eq!(env.lookup(&x), Some(&Type::boolean()));
        env.pop_scope();

        assert_eq!(env.lookup(&x), Some(&Type::integer()));

        // The global scope survives an unbalanced pop.
        env.pop_scope();
        assert_eq!(env.lookup(&x), Some(&Type::integer()));
    }

    #[test]
    fn test_type_env_narrow() {
        let mut env = TypeEnv::new();
        let xs = SmolStr::from("xs");
        env.define(xs.clone(), Type::list_of(Type::unresolved()));
        env.push_scope();
        env.narrow(&xs, Type::list_of(Type::integer()));
        env.pop_scope();
        assert_eq!(env.lookup(&xs), Some(&Type::list_of(Type::integer())));
    }
}
