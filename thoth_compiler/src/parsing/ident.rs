use super::{Parse, Parser};
use crate::{error::CompileResult, tokens::Span};
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: SmolStr,
    pub span: Span,
}

impl Parse for Ident {
    #[inline]
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let (name, span) = parser.stream.expect_ident()?;
        Ok(Ident { name, span })
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
