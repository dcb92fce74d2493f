//! Buffered stream of tokens for look ahead.
use crate::{
    error::{CompileError, CompileResult},
    tokens::{Keyword, Span, Token, TokenKind},
};

use itertools::{multipeek, MultiPeek};
use smol_str::SmolStr;
use std::vec;

/// Buffered stream of tokens that allows arbitrary look ahead.
///
/// The peek semantics are determined by the internal `MultiPeek`.
/// Each peek on `MultiPeek` advances a peek cursor, so every
/// method here resets the cursor before looking ahead. Consuming
/// a token resets it implicitly.
pub struct TokenStream {
    tokens: MultiPeek<vec::IntoIter<Token>>,
}

impl TokenStream {
    #[inline]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: multipeek(tokens),
        }
    }

    /// Return the current token without advancing the cursor.
    ///
    /// Returns `None` once the `EOF` token has been consumed.
    #[inline]
    pub fn peek(&mut self) -> Option<&Token> {
        self.tokens.reset_peek();
        self.tokens.peek()
    }

    /// Kind of the current token, `EOF` when the stream is exhausted.
    pub fn peek_kind(&mut self) -> TokenKind {
        self.peek_nth(0)
            .map(|token| token.kind)
            .unwrap_or(TokenKind::EOF)
    }

    /// Clone of the token `n` places after the current one.
    pub fn peek_nth(&mut self, n: usize) -> Option<Token> {
        self.tokens.reset_peek();
        for _ in 0..n {
            self.tokens.peek();
        }
        let token = self.tokens.peek().cloned();
        self.tokens.reset_peek();
        token
    }

    /// Peek the current token, and the one after it only when
    /// their spans touch.
    ///
    /// Used to recognise operators that are written as two adjacent
    /// symbols, like `>=` or `..`.
    pub fn peek_pair(&mut self) -> (TokenKind, Option<TokenKind>) {
        let first = self.peek_nth(0);
        let second = self.peek_nth(1);

        match first {
            Some(first) => {
                let adjacent = second
                    .filter(|second| first.span.touches(&second.span))
                    .map(|second| second.kind);
                (first.kind, adjacent)
            }
            None => (TokenKind::EOF, None),
        }
    }

    /// Consumes the current token regardless of type.
    pub fn next_token(&mut self) -> CompileResult<Token> {
        self.tokens
            .next()
            .ok_or_else(|| CompileError::UnexpectedEndOfInput {
                expected: "more tokens".to_owned(),
            })
    }

    /// Consume `count` tokens, returning a span covering all of them.
    pub fn skip(&mut self, count: usize) -> CompileResult<Span> {
        let mut span = self.next_token()?.span;
        for _ in 1..count {
            span = span.merge(&self.next_token()?.span);
        }
        Ok(span)
    }

    /// Consumes the current token if it is the given symbol.
    ///
    /// Does not consume the token if it does not match.
    pub fn match_symbol(&mut self, symbol: char) -> bool {
        let is_match = self.peek_kind().is_symbol(symbol);
        if is_match {
            self.tokens.next();
        }
        is_match
    }

    /// Consumes a two character operator, like `->`, when both
    /// symbols are next and adjacent.
    pub fn match_compound(&mut self, operator: [char; 2]) -> Option<Span> {
        match self.peek_pair() {
            (TokenKind::Symbol(a), Some(TokenKind::Symbol(b)))
                if a == operator[0] && b == operator[1] =>
            {
                self.skip(2).ok()
            }
            _ => None,
        }
    }

    pub fn expect_compound(&mut self, operator: [char; 2]) -> CompileResult<Span> {
        match self.match_compound(operator) {
            Some(span) => Ok(span),
            None => {
                let token = self.next_token()?;
                Err(CompileError::unexpected(
                    &token,
                    format!("'{}{}'", operator[0], operator[1]),
                ))
            }
        }
    }

    /// Consume the current token, which must be the given symbol.
    pub fn expect_symbol(&mut self, symbol: char) -> CompileResult<Token> {
        let token = self.next_token()?;
        if token.kind.is_symbol(symbol) {
            Ok(token)
        } else {
            Err(CompileError::unexpected(&token, format!("'{symbol}'")))
        }
    }

    pub fn expect_keyword(&mut self, keyword: Keyword) -> CompileResult<Token> {
        let token = self.next_token()?;
        if token.kind == TokenKind::Keyword(keyword) {
            Ok(token)
        } else {
            Err(CompileError::unexpected(&token, format!("'{keyword}'")))
        }
    }

    pub fn expect_ident(&mut self) -> CompileResult<(SmolStr, Span)> {
        let token = self.next_token()?;
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.span)),
            _ => Err(CompileError::unexpected(&token, "identifier")),
        }
    }
}
