//! Tokens
use smol_str::SmolStr;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Single character punctuation.
    ///
    /// Operators wider than one character, like `>=` or `..`,
    /// are collapsed by the parser from adjacent symbols.
    Symbol(char),

    Ident(SmolStr),

    /// Identifier in the set of reserved words.
    Keyword(Keyword),

    /// Integer literal
    Int(i64),

    /// Boolean literal, `true` or `false`
    Bool(bool),

    /// String literal, stored as an index into the literal table.
    Str(usize),

    /// Explicit type annotation, or `var` for an inferred type.
    Type(TypeName),

    /// End-of-source
    EOF,
}

impl TokenKind {
    #[inline]
    pub fn is_symbol(&self, c: char) -> bool {
        matches!(self, TokenKind::Symbol(s) if *s == c)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Symbol(c) => write!(f, "{c}"),
            Self::Ident(name) => write!(f, "{name}"),
            Self::Keyword(keyword) => write!(f, "{keyword}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Str(index) => write!(f, "string literal #{index}"),
            Self::Type(name) => write!(f, "{name}"),
            Self::EOF => write!(f, "end-of-file"),
        }
    }
}

/// Reserved keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Keyword {
    If,        // if
    While,     // while
    For,       // for
    In,        // in
    Function,  // function
    Return,    // return
    Print,     // print
    Assert,    // assert
    Exit,      // exit
    And,       // and
    Or,        // or
    Not,       // not
}

impl Keyword {
    #[rustfmt::skip]
    pub fn parse(text: impl AsRef<str>) -> Option<Self> {
        match text.as_ref() {
            "if"       => Some(Self::If),
            "while"    => Some(Self::While),
            "for"      => Some(Self::For),
            "in"       => Some(Self::In),
            "function" => Some(Self::Function),
            "return"   => Some(Self::Return),
            "print"    => Some(Self::Print),
            "assert"   => Some(Self::Assert),
            "exit"     => Some(Self::Exit),
            "and"      => Some(Self::And),
            "or"       => Some(Self::Or),
            "not"      => Some(Self::Not),
            _          => None,
        }
    }
}

impl fmt::Display for Keyword {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::If       => write!(f, "if"),
            Self::While    => write!(f, "while"),
            Self::For      => write!(f, "for"),
            Self::In       => write!(f, "in"),
            Self::Function => write!(f, "function"),
            Self::Return   => write!(f, "return"),
            Self::Print    => write!(f, "print"),
            Self::Assert   => write!(f, "assert"),
            Self::Exit     => write!(f, "exit"),
            Self::And      => write!(f, "and"),
            Self::Or       => write!(f, "or"),
            Self::Not      => write!(f, "not"),
        }
    }
}

/// Head of a type annotation as written in source.
///
/// Type parameters (`list<int>`) are separate tokens
/// assembled by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum TypeName {
    Int,     // int
    Bool,    // bool
    String,  // string
    List,    // list
    /// Inferred from the initializer.
    Var,     // var
}

impl TypeName {
    #[rustfmt::skip]
    pub fn parse(text: impl AsRef<str>) -> Option<Self> {
        match text.as_ref() {
            "int"    => Some(Self::Int),
            "bool"   => Some(Self::Bool),
            "string" => Some(Self::String),
            "list"   => Some(Self::List),
            "var"    => Some(Self::Var),
            _        => None,
        }
    }
}

impl fmt::Display for TypeName {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int    => write!(f, "int"),
            Self::Bool   => write!(f, "bool"),
            Self::String => write!(f, "string"),
            Self::List   => write!(f, "list"),
            Self::Var    => write!(f, "var"),
        }
    }
}

/// Chunk of source code, encoded as a byte range plus the
/// line and column where it starts.
///
/// Only used for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub index: u32,
    pub size: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(index: u32, size: u32, line: u32, column: u32) -> Self {
        Self {
            index,
            size,
            line,
            column,
        }
    }

    #[inline]
    pub fn fragment<'a>(&self, text: &'a str) -> &'a str {
        &text[(self.index as usize)..(self.end() as usize)]
    }

    /// Ending index of the span, exclusive.
    #[inline]
    pub fn end(&self) -> u32 {
        self.index + self.size
    }

    /// Indicates whether the other span starts exactly where this one ends.
    #[inline]
    pub fn touches(&self, other: &Span) -> bool {
        self.end() == other.index
    }

    /// Combine two spans to produce a new span that
    /// covers both (and everything inbetween).
    ///
    /// The line and column are taken from whichever span starts first.
    pub fn merge(&self, other: &Span) -> Span {
        let (first, _) = if self.index <= other.index {
            (self, other)
        } else {
            (other, self)
        };
        let index = first.index;
        let size = u32::max(self.end(), other.end()) - index;
        Span {
            index,
            size,
            line: first.line,
            column: first.column,
        }
    }

    /// The full line of source text containing the start of the span,
    /// without the trailing newline.
    pub fn surrounding_line<'a>(&self, text: &'a str) -> &'a str {
        let index = (self.index as usize).min(text.len());
        let start = text[..index].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let end = text[index..]
            .find(|c: char| c == '\n' || c == '\r')
            .map(|i| index + i)
            .unwrap_or(text.len());
        &text[start..end]
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
