//! Delimited list.
use super::{Parse, Parser};
use crate::{
    error::{CompileError, CompileResult},
    tokens::{Span, TokenKind},
};

/// Comma separated items, terminated by a closing symbol.
///
/// The opening symbol is consumed by the caller. An empty list
/// and a list without a trailing comma are accepted.
#[derive(Debug)]
pub struct Delimited<T> {
    pub items: Vec<T>,
    /// Span of the closing symbol.
    pub close: Span,
}

impl<T: Parse> Delimited<T> {
    pub fn parse_until(parser: &mut Parser, close: char) -> CompileResult<Self> {
        let mut items = vec![];

        if parser.stream.peek_kind().is_symbol(close) {
            let token = parser.stream.next_token()?;
            return Ok(Delimited {
                items,
                close: token.span,
            });
        }

        loop {
            items.push(T::parse(parser)?);

            let token = parser.stream.next_token()?;
            match token.kind {
                TokenKind::Symbol(',') => continue,
                TokenKind::Symbol(c) if c == close => {
                    return Ok(Delimited {
                        items,
                        close: token.span,
                    })
                }
                _ => {
                    return Err(CompileError::unexpected(
                        &token,
                        format!("',' or '{close}'"),
                    ))
                }
            }
        }
    }
}
