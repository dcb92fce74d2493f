//! Lexical analysis (tokenizer)
use crate::{
    literals::LiteralTable,
    tokens::{Keyword, Span, Token, TokenKind, TypeName},
};

use itertools::{multipeek, MultiPeek};
use std::str::CharIndices;
use thiserror::Error;

/// Output of the lexer: the complete token sequence, terminated
/// by an `EOF` token, and the literal string table.
#[derive(Debug)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub strings: LiteralTable,
}

/// Tokenize the whole source.
pub fn tokenize(source: &str) -> Result<Lexed, LexError> {
    Lexer::new(source).tokenize()
}

pub fn debug_print_tokens(tokens: &[Token], source: &str) {
    println!("line:col | token            | fragment");

    for token in tokens {
        match token.kind {
            TokenKind::EOF => println!(
                "{:>4}:{:<3} | {:<16} |",
                token.span.line,
                token.span.column,
                token.kind.to_string()
            ),
            _ => {
                let fragment = token.span.fragment(source);
                println!(
                    "{:>4}:{:<3} | {:<16} | {}",
                    token.span.line,
                    token.span.column,
                    format!("{:?}", token.kind),
                    fragment
                );
            }
        }
    }
}

/// Lexical analyzer.
pub struct Lexer<'a> {
    source: SourceText<'a>,
    token_start: SourcePos,
    strings: LiteralTable,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        Self {
            source: SourceText::new(source_code),
            token_start: SourcePos::default(),
            strings: LiteralTable::new(),
        }
    }

    /// Consume the lexer, collecting every token and the literal table.
    pub fn tokenize(mut self) -> Result<Lexed, LexError> {
        let mut tokens = vec![];

        loop {
            let token = self.next_token()?;
            let at_end = token.kind == TokenKind::EOF;
            tokens.push(token);
            if at_end {
                break;
            }
        }

        Ok(Lexed {
            tokens,
            strings: self.strings,
        })
    }

    /// Scan the source characters and construct the next token.
    ///
    /// Whitespace and comments are skipped. Once the source is
    /// exhausted, every call returns an `EOF` token.
    #[rustfmt::skip]
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        use TokenKind as T;

        loop {
            self.start_token();

            let next_char = match self.source.next_char() {
                Some(c) => c,
                None => return Ok(self.make_token(T::EOF)),
            };

            match next_char {
                ' ' | '\t' | '\r' | '\n' => continue,
                '/' => {
                    if let Some('/') = self.source.peek_char() {
                        self.consume_until_newline();
                        continue;
                    }
                    return Ok(self.make_token(T::Symbol('/')));
                }
                '('  | ')' | '{' | '}' | '[' | ']'
                | ',' | ';' | '=' | '+' | '-' | '*'
                | '<' | '>' | '!' | '.' | ':' => return Ok(self.make_token(T::Symbol(next_char))),
                '"'               => return self.consume_string(),
                '0'..='9'         => return self.consume_number(),
                '_' | 'a'..='z'
                    | 'A'..='Z'   => return Ok(self.consume_ident()),
                _                 => {
                    return Err(LexError::UnknownCharacter {
                        character: next_char,
                        span: self.make_span(),
                    })
                }
            }
        }
    }

    /// Prime the lexer state for recording a new token.
    fn start_token(&mut self) {
        self.token_start = self.source.pos;
    }

    fn make_span(&self) -> Span {
        let start = self.token_start;
        let end = self.source.pos;

        // start and end can be equal, and a token can have 0 size.
        debug_assert!(end.index >= start.index);

        Span {
            index: start.index as u32,
            size: (end.index - start.index) as u32,
            line: start.line,
            column: start.column,
        }
    }

    fn make_token(&mut self, kind: TokenKind) -> Token {
        Token {
            kind,
            span: self.make_span(),
        }
    }

    fn token_fragment(&self) -> &'a str {
        &self.source.original[self.token_start.index..self.source.pos.index]
    }

    fn consume_until_newline(&mut self) {
        while let Some(c) = self.source.peek_char() {
            if c == '\n' {
                break;
            }
            self.source.next_char();
        }
    }

    fn consume_number(&mut self) -> Result<Token, LexError> {
        while let Some('0'..='9') = self.source.peek_char() {
            self.source.next_char();
        }

        let fragment = self.token_fragment();
        match fragment.parse::<i64>() {
            Ok(value) => Ok(self.make_token(TokenKind::Int(value))),
            Err(_) => Err(LexError::InvalidInteger {
                literal: fragment.to_owned(),
                span: self.make_span(),
            }),
        }
    }

    fn consume_ident(&mut self) -> Token {
        while let Some('_' | 'a'..='z' | 'A'..='Z' | '0'..='9') = self.source.peek_char() {
            self.source.next_char();
        }

        // Reserved words take priority over user defined identifiers.
        let fragment = self.token_fragment();
        let token_kind = match fragment {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => match Keyword::parse(fragment) {
                Some(keyword) => TokenKind::Keyword(keyword),
                None => match TypeName::parse(fragment) {
                    Some(type_name) => TokenKind::Type(type_name),
                    None => TokenKind::Ident(fragment.into()),
                },
            },
        };
        self.make_token(token_kind)
    }

    /// The opening quote has already been consumed.
    fn consume_string(&mut self) -> Result<Token, LexError> {
        let mut text = String::new();

        loop {
            match self.source.next_char() {
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.source.next_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(character) => {
                            return Err(LexError::InvalidEscape {
                                character,
                                span: self.make_span(),
                            })
                        }
                        None => {
                            return Err(LexError::UnterminatedString {
                                span: self.make_span(),
                            })
                        }
                    };
                    text.push(escaped);
                }
                Some(c) => text.push(c),
                None => {
                    return Err(LexError::UnterminatedString {
                        span: self.make_span(),
                    })
                }
            }
        }

        let index = self.strings.intern(&text);
        Ok(self.make_token(TokenKind::Str(index)))
    }
}

/// Wrapper for source code that keeps a cursor position.
///
/// Allows forward lookup via peeking.
struct SourceText<'a> {
    /// Keep reference to the source so tokens can
    /// slice fragments from it.
    original: &'a str,

    /// Iterator over UTF-8 encoded source code.
    ///
    /// Peeking advances the internal peek cursor of `MultiPeek`,
    /// so every peek here resets it first.
    chars: MultiPeek<CharIndices<'a>>,

    /// Position of the next character to be consumed.
    pos: SourcePos,
}

impl<'a> SourceText<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            original: source,
            chars: multipeek(source.char_indices()),
            pos: SourcePos::default(),
        }
    }

    /// Advance the cursor and return the consumed character.
    fn next_char(&mut self) -> Option<char> {
        let (index, c) = self.chars.next()?;
        self.pos.index = index + c.len_utf8();
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    /// Peeks the next character without consuming it.
    fn peek_char(&mut self) -> Option<char> {
        self.chars.reset_peek();
        let c = self.chars.peek().map(|(_, c)| *c);
        self.chars.reset_peek();
        c
    }
}

#[derive(Debug, Clone, Copy)]
struct SourcePos {
    index: usize,
    line: u32,
    column: u32,
}

impl Default for SourcePos {
    fn default() -> Self {
        Self {
            index: 0,
            line: 1,
            column: 1,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("{span}: unknown character '{character}'")]
    UnknownCharacter { character: char, span: Span },
    #[error("{span}: unterminated string literal")]
    UnterminatedString { span: Span },
    #[error("{span}: invalid escape sequence '\\{character}'")]
    InvalidEscape { character: char, span: Span },
    #[error("{span}: invalid integer literal '{literal}'")]
    InvalidInteger { literal: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnknownCharacter { span, .. }
            | Self::UnterminatedString { span }
            | Self::InvalidEscape { span, .. }
            | Self::InvalidInteger { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .tokens
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_lex_var_def() {
        use TokenKind as T;

        assert_eq!(
            kinds("int x = 42;"),
            vec![
                T::Type(TypeName::Int),
                T::Ident("x".into()),
                T::Symbol('='),
                T::Int(42),
                T::Symbol(';'),
                T::EOF,
            ]
        );
    }

    #[test]
    fn test_lex_multi_char_operators_are_split() {
        use TokenKind as T;

        assert_eq!(
            kinds("a >= 1..3"),
            vec![
                T::Ident("a".into()),
                T::Symbol('>'),
                T::Symbol('='),
                T::Int(1),
                T::Symbol('.'),
                T::Symbol('.'),
                T::Int(3),
                T::EOF,
            ]
        );
    }

    #[test]
    fn test_lex_keywords_and_literals() {
        use TokenKind as T;

        assert_eq!(
            kinds("while (not true) // comment\nreturn false;"),
            vec![
                T::Keyword(Keyword::While),
                T::Symbol('('),
                T::Keyword(Keyword::Not),
                T::Bool(true),
                T::Symbol(')'),
                T::Keyword(Keyword::Return),
                T::Bool(false),
                T::Symbol(';'),
                T::EOF,
            ]
        );
    }

    #[test]
    fn test_lex_strings_are_deduplicated() {
        let lexed = tokenize(r#"print("hi\n"); print("bye"); print("hi\n");"#).unwrap();
        let indices: Vec<usize> = lexed
            .tokens
            .iter()
            .filter_map(|token| match token.kind {
                TokenKind::Str(index) => Some(index),
                _ => None,
            })
            .collect();

        assert_eq!(indices, vec![0, 1, 0]);
        assert_eq!(lexed.strings.get(0), Some("hi\n"));
        assert_eq!(lexed.strings.get(1), Some("bye"));
    }

    #[test]
    fn test_lex_positions() {
        let lexed = tokenize("int a = 1;\n  a = 2;").unwrap();
        let second_a = &lexed.tokens[5];
        assert_eq!(second_a.kind, TokenKind::Ident("a".into()));
        assert_eq!((second_a.span.line, second_a.span.column), (2, 3));
        assert_eq!(second_a.span.index, 13);
        assert_eq!(second_a.span.size, 1);
    }

    #[test]
    fn test_lex_errors() {
        assert!(matches!(
            tokenize("int x = 3 # 4;"),
            Err(LexError::UnknownCharacter { character: '#', .. })
        ));
        assert!(matches!(
            tokenize("print(\"open"),
            Err(LexError::UnterminatedString { .. })
        ));
        assert!(matches!(
            tokenize("print(\"\\q\");"),
            Err(LexError::InvalidEscape { character: 'q', .. })
        ));
        assert!(matches!(
            tokenize("int x = 99999999999999999999;"),
            Err(LexError::InvalidInteger { .. })
        ));
    }
}
