use std::{fmt, ops::Range};

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: Box<str>,
    pub line: u32,
    pub column: u32,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, text: &str, pos: Position, span: Span) -> Token {
        Token {
            kind,
            text: text.into(),
            line: pos.line,
            column: pos.column,
            lo: span.lo,
            len: span.len,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn pos(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// Returns the keyword this token spells, if it is one.
    pub fn keyword(&self) -> Option<Keyword> {
        if self.kind == TokenKind::Keyword {
            KEYWORDS.get(&*self.text).copied()
        } else {
            None
        }
    }

    /// Checks whether this token has the provided kind and text.
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && &*self.text == text
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token({:?}, {:?}, {}, {})",
            self.kind,
            self.text,
            self.pos(),
            self.span()
        )
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap_or(u32::MAX))
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.lo..self.hi()]
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi())
    }
}

/// A one-based line and column pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const START: Position = Position { line: 1, column: 1 };
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Identifier,
    IntegerLiteral,
    FloatLiteral,
    HexLiteral,
    BinaryLiteral,
    OctalLiteral,
    StringLiteral,
    CharLiteral,
    /// `+ - * / %`
    ArithmeticOperator,
    /// `== != <= >= < >`
    ComparisonOperator,
    /// `&& || !`
    LogicalOperator,
    /// `= += -= *= /= %=`
    AssignmentOperator,
    Increment,
    Decrement,
    /// `; , ( ) { } [ ] .`
    Punctuation,
    Eof,
}

impl TokenKind {
    pub fn is_number(self) -> bool {
        matches!(
            self,
            TokenKind::IntegerLiteral
                | TokenKind::FloatLiteral
                | TokenKind::HexLiteral
                | TokenKind::BinaryLiteral
                | TokenKind::OctalLiteral
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Keyword => "KEYWORD",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::IntegerLiteral => "INTEGER_LITERAL",
            TokenKind::FloatLiteral => "FLOAT_LITERAL",
            TokenKind::HexLiteral => "HEX_LITERAL",
            TokenKind::BinaryLiteral => "BINARY_LITERAL",
            TokenKind::OctalLiteral => "OCTAL_LITERAL",
            TokenKind::StringLiteral => "STRING_LITERAL",
            TokenKind::CharLiteral => "CHAR_LITERAL",
            TokenKind::ArithmeticOperator => "ARITHMETIC_OPERATOR",
            TokenKind::ComparisonOperator => "COMPARISON_OPERATOR",
            TokenKind::LogicalOperator => "LOGICAL_OPERATOR",
            TokenKind::AssignmentOperator => "ASSIGNMENT",
            TokenKind::Increment => "INCREMENT",
            TokenKind::Decrement => "DECREMENT",
            TokenKind::Punctuation => "PUNCTUATION",
            TokenKind::Eof => "EOF",
        };
        f.pad(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Keyword {
    Int,
    Double,
    Float,
    Char,
    Void,
    Return,
    If,
    Else,
    While,
    For,
}

impl Keyword {
    /// Type keywords start declarations and function definitions.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Keyword::Int | Keyword::Double | Keyword::Float | Keyword::Char | Keyword::Void
        )
    }
}

pub static KEYWORDS: phf::Map<&'static str, Keyword> = phf::phf_map! {
    "int" => Keyword::Int,
    "double" => Keyword::Double,
    "float" => Keyword::Float,
    "char" => Keyword::Char,
    "void" => Keyword::Void,
    "return" => Keyword::Return,
    "if" => Keyword::If,
    "else" => Keyword::Else,
    "while" => Keyword::While,
    "for" => Keyword::For,
};
