use super::{stmts::Stmt, Parse, Parser};
use crate::{error::CompileResult, tokens::Span};

/// Braced statement list that opens a new scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Parse for Block {
    fn parse(parser: &mut Parser) -> CompileResult<Self> {
        let open = parser.stream.expect_symbol('{')?;
        let mut stmts = vec![];

        parser.env.push_scope();
        while !parser.stream.peek_kind().is_symbol('}') {
            match Stmt::parse(parser) {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    parser.env.pop_scope();
                    return Err(err);
                }
            }
        }
        parser.env.pop_scope();

        let close = parser.stream.expect_symbol('}')?;

        Ok(Block {
            stmts,
            span: open.span.merge(&close.span),
        })
    }
}

/// Parse the body of a control statement in its own scope.
pub(super) fn parse_body(parser: &mut Parser) -> CompileResult<Box<Stmt>> {
    parser.env.push_scope();
    let body = Stmt::parse(parser);
    parser.env.pop_scope();
    body.map(Box::new)
}
