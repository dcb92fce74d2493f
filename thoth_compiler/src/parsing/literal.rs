//! List literals.
use super::{Delimited, Expr, ExprKind, Parser};
use crate::{error::CompileResult, tokens::Span, types::Type};

/// Parse the members of a list literal after the opening `[`.
///
/// `elem` is the declared element type, or unresolved for the
/// shorthand form, in which case the first resolved member pins it.
pub(super) fn parse_list(parser: &mut Parser, elem: Type, start: Span) -> CompileResult<Expr> {
    let members = Delimited::<Expr>::parse_until(parser, ']')?;

    let mut elem = elem;
    for item in &members.items {
        elem = elem.require_unify(&item.ty, item.span)?;
    }

    Ok(Expr {
        ty: Type::list_of(elem.clone()),
        kind: ExprKind::List {
            elem,
            items: members.items,
        },
        span: start.merge(&members.close),
    })
}
