//! Type annotations.
use super::Parser;
use crate::{
    error::{CompileError, CompileResult},
    tokens::{TokenKind, TypeName},
    types::Type,
};

/// Parse a concrete type: `int`, `bool`, `string` or `list<T>`.
pub fn parse_type(parser: &mut Parser) -> CompileResult<Type> {
    let token = parser.stream.next_token()?;
    match token.kind {
        TokenKind::Type(TypeName::Int) => Ok(Type::integer()),
        TokenKind::Type(TypeName::Bool) => Ok(Type::boolean()),
        TokenKind::Type(TypeName::String) => Ok(Type::string()),
        TokenKind::Type(TypeName::List) => parse_element_type(parser).map(Type::list_of),
        _ => Err(CompileError::unexpected(&token, "type")),
    }
}

/// Parse the type written at the start of a variable definition.
///
/// `var` yields the unresolved type, to be inferred from the initializer.
pub fn parse_decl_type(parser: &mut Parser) -> CompileResult<Type> {
    if parser.stream.peek_kind() == TokenKind::Type(TypeName::Var) {
        parser.stream.next_token()?;
        Ok(Type::unresolved())
    } else {
        parse_type(parser)
    }
}

/// Parse the `<T>` that follows the `list` keyword.
pub fn parse_element_type(parser: &mut Parser) -> CompileResult<Type> {
    parser.stream.expect_symbol('<')?;
    let element = parse_type(parser)?;
    parser.stream.expect_symbol('>')?;
    Ok(element)
}
