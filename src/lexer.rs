use log::trace;

use crate::token::{Position, Span, Token, TokenKind};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The last produced token is always [`TokenKind::Eof`].
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Result<(), Error> {
    Lexer::new(src, tokens).lex()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn tokenize(src: &str) -> Result<Vec<Token>, Error> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens)?;
    Ok(tokens)
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unexpected character {character:?} at line {line}, column {column}")]
pub struct Error {
    /// Byte offset of the offending character.
    pub position: usize,
    pub line: u32,
    pub column: u32,
    pub character: char,
}

impl Error {
    pub fn pos(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

#[derive(Copy, Clone)]
enum Emit {
    Skip,
    Token(TokenKind),
}

/// Returns the length (in bytes) of the match at the start of the input.
type Scanner = fn(&str) -> Option<usize>;

struct Rule {
    emit: Emit,
    scan: Scanner,
}

/// Token rules in priority order. At each position the first matching rule
/// wins, so keywords must come before identifiers, literals before operators
/// and multi-character operators before their single-character prefixes.
static RULES: &[Rule] = &[
    Rule { emit: Emit::Skip, scan: scan::whitespace },
    Rule { emit: Emit::Skip, scan: scan::line_comment },
    Rule { emit: Emit::Skip, scan: scan::block_comment },
    Rule { emit: Emit::Token(TokenKind::Keyword), scan: scan::keyword },
    Rule { emit: Emit::Token(TokenKind::Identifier), scan: scan::identifier },
    Rule { emit: Emit::Token(TokenKind::FloatLiteral), scan: scan::float },
    Rule { emit: Emit::Token(TokenKind::HexLiteral), scan: scan::hex },
    Rule { emit: Emit::Token(TokenKind::BinaryLiteral), scan: scan::binary },
    Rule { emit: Emit::Token(TokenKind::OctalLiteral), scan: scan::octal },
    Rule { emit: Emit::Token(TokenKind::IntegerLiteral), scan: scan::integer },
    Rule { emit: Emit::Token(TokenKind::StringLiteral), scan: scan::string },
    Rule { emit: Emit::Token(TokenKind::CharLiteral), scan: scan::char },
    Rule { emit: Emit::Token(TokenKind::Increment), scan: scan::increment },
    Rule { emit: Emit::Token(TokenKind::Decrement), scan: scan::decrement },
    Rule { emit: Emit::Token(TokenKind::ComparisonOperator), scan: scan::comparison },
    Rule { emit: Emit::Token(TokenKind::LogicalOperator), scan: scan::logical },
    Rule { emit: Emit::Token(TokenKind::AssignmentOperator), scan: scan::assignment },
    Rule { emit: Emit::Token(TokenKind::ArithmeticOperator), scan: scan::arithmetic },
    Rule { emit: Emit::Token(TokenKind::Punctuation), scan: scan::punctuation },
];

struct Lexer<'src, 'tok> {
    src: &'src str,
    cursor: usize,
    pos: Position,
    tokens: &'tok mut Vec<Token>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    ///
    /// Tokens are written into the provided tokens buffer.
    fn lex(mut self) -> Result<(), Error> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        while self.cursor < self.src.len() {
            let (emit, span) = self.scan_rule()?;
            if let Emit::Token(kind) = emit {
                self.produce(kind, span);
            }
            self.advance(span);
        }
        self.produce(TokenKind::Eof, Span::new_of_length(self.cursor, 0));
        trace!("lexed {} tokens", self.tokens.len());
        Ok(())
    }

    /// Tries every rule at the cursor, returning the first match.
    fn scan_rule(&self) -> Result<(Emit, Span), Error> {
        let rest = &self.src[self.cursor..];
        let matched = RULES.iter().find_map(|rule| {
            let len = (rule.scan)(rest)?;
            debug_assert!(len > 0, "rules must not match the empty string");
            Some((rule.emit, Span::new_of_bounds(self.cursor..self.cursor + len)))
        });
        matched.ok_or_else(|| Error {
            position: self.cursor,
            line: self.pos.line,
            column: self.pos.column,
            character: rest.chars().next().unwrap_or('\0'),
        })
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            cursor: 0,
            pos: Position::START,
            tokens,
        }
    }

    /// Moves the cursor past the span, keeping line and column up to date.
    fn advance(&mut self, span: Span) {
        let text = span.substr(self.src);
        let newlines = text.matches('\n').count();
        if newlines > 0 {
            let last_line = text.rsplit('\n').next().unwrap_or("");
            self.pos.line += u32::try_from(newlines).unwrap_or(u32::MAX);
            self.pos.column = char_count(last_line) + 1;
        } else {
            self.pos.column += char_count(text);
        }
        self.cursor = span.hi();
    }

    /// Produces a token with the provided span at the current position.
    fn produce(&mut self, kind: TokenKind, span: Span) {
        let text = span.substr(self.src);
        self.tokens.push(Token::new(kind, text, self.pos, span));
    }
}

fn char_count(s: &str) -> u32 {
    u32::try_from(s.chars().count()).unwrap_or(u32::MAX)
}

mod scan {
    use crate::token::KEYWORDS;

    fn take_while(s: &str, pred: impl Fn(char) -> bool) -> usize {
        s.char_indices()
            .find(|&(_, c)| !pred(c))
            .map_or(s.len(), |(i, _)| i)
    }

    fn non_empty(len: usize) -> Option<usize> {
        (len > 0).then_some(len)
    }

    fn one_of(s: &str, options: &[&str]) -> Option<usize> {
        options
            .iter()
            .find(|option| s.starts_with(**option))
            .map(|option| option.len())
    }

    fn digits(s: &str, radix: u32) -> usize {
        take_while(s, |c| c.is_digit(radix))
    }

    fn word(s: &str) -> usize {
        match s.chars().next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                take_while(s, |c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => 0,
        }
    }

    fn prefixed(s: &str, prefixes: [&str; 2], radix: u32) -> Option<usize> {
        let prefix = prefixes.into_iter().find(|p| s.starts_with(p))?;
        let len = non_empty(digits(&s[prefix.len()..], radix))?;
        Some(prefix.len() + len)
    }

    /// A quoted literal which may contain escapes but no raw line break.
    fn quoted(s: &str, quote: char) -> Option<usize> {
        let mut chars = s.char_indices();
        if chars.next()?.1 != quote {
            return None;
        }
        let mut is_escaping = false;
        for (i, c) in chars {
            match (is_escaping, c) {
                (_, '\n') => return None,
                (false, '\\') => is_escaping = true,
                (false, c) if c == quote => return Some(i + c.len_utf8()),
                _ => is_escaping = false,
            }
        }
        None
    }

    pub fn whitespace(s: &str) -> Option<usize> {
        non_empty(take_while(s, char::is_whitespace))
    }

    pub fn line_comment(s: &str) -> Option<usize> {
        s.starts_with("//")
            .then(|| s.find('\n').unwrap_or(s.len()))
    }

    pub fn block_comment(s: &str) -> Option<usize> {
        let body = s.strip_prefix("/*")?;
        let end = body.find("*/")?;
        Some(2 + end + 2)
    }

    pub fn keyword(s: &str) -> Option<usize> {
        let len = non_empty(word(s))?;
        KEYWORDS.contains_key(&s[..len]).then_some(len)
    }

    pub fn identifier(s: &str) -> Option<usize> {
        non_empty(word(s))
    }

    pub fn float(s: &str) -> Option<usize> {
        let int = non_empty(digits(s, 10))?;
        let fraction = s[int..].strip_prefix('.')?;
        let frac = non_empty(digits(fraction, 10))?;
        Some(int + 1 + frac)
    }

    pub fn hex(s: &str) -> Option<usize> {
        prefixed(s, ["0x", "0X"], 16)
    }

    pub fn binary(s: &str) -> Option<usize> {
        prefixed(s, ["0b", "0B"], 2)
    }

    pub fn octal(s: &str) -> Option<usize> {
        let rest = s.strip_prefix('0')?;
        non_empty(digits(rest, 8)).map(|len| len + 1)
    }

    pub fn integer(s: &str) -> Option<usize> {
        non_empty(digits(s, 10))
    }

    pub fn string(s: &str) -> Option<usize> {
        quoted(s, '"')
    }

    pub fn char(s: &str) -> Option<usize> {
        quoted(s, '\'')
    }

    pub fn increment(s: &str) -> Option<usize> {
        one_of(s, &["++"])
    }

    pub fn decrement(s: &str) -> Option<usize> {
        one_of(s, &["--"])
    }

    pub fn comparison(s: &str) -> Option<usize> {
        one_of(s, &["==", "!=", "<=", ">=", "<", ">"])
    }

    pub fn logical(s: &str) -> Option<usize> {
        one_of(s, &["&&", "||", "!"])
    }

    pub fn assignment(s: &str) -> Option<usize> {
        one_of(s, &["+=", "-=", "*=", "/=", "%=", "="])
    }

    pub fn arithmetic(s: &str) -> Option<usize> {
        one_of(s, &["+", "-", "*", "/", "%"])
    }

    pub fn punctuation(s: &str) -> Option<usize> {
        one_of(s, &[";", ",", "(", ")", "{", "}", "[", "]", "."])
    }
}

pub mod extract {
    use crate::{
        ast::Number,
        token::{Token, TokenKind},
    };

    pub fn number(token: &Token) -> Option<Number> {
        debug_assert!(token.kind.is_number());
        let text = &*token.text;
        let int = |digits: &str, radix| i64::from_str_radix(digits, radix).ok().map(Number::Int);
        match token.kind {
            TokenKind::IntegerLiteral => int(text, 10),
            TokenKind::HexLiteral | TokenKind::BinaryLiteral => int(&text[2..], radix_of(token)),
            TokenKind::OctalLiteral => int(&text[1..], 8),
            TokenKind::FloatLiteral => text.parse().ok().map(Number::Float),
            _ => None,
        }
    }

    fn radix_of(token: &Token) -> u32 {
        if token.kind == TokenKind::HexLiteral {
            16
        } else {
            2
        }
    }

    /// The string contents without the surrounding quotes. Escape sequences
    /// are kept verbatim.
    pub fn string(token: &Token) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::StringLiteral);
        let text = &*token.text;
        text[1..text.len() - 1].into()
    }

    /// The code point of a character literal.
    pub fn char(token: &Token) -> Option<i64> {
        debug_assert_eq!(token.kind, TokenKind::CharLiteral);
        let text = &*token.text;
        let escaped = perform_escape(&text[1..text.len() - 1]);
        let mut chars = escaped.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(i64::from(u32::from(c))),
            _ => None,
        }
    }

    fn perform_escape(raw: &str) -> String {
        let mut buf = String::with_capacity(raw.len());
        let mut escaped = false;
        for char in raw.chars() {
            let char = match (escaped, char) {
                (true, '0') => '\0',
                (true, 't') => '\t',
                (true, 'n') => '\n',
                (true, 'r') => '\r',
                (false, '\\') => {
                    escaped = true;
                    continue;
                }
                (_, char) => char,
            };
            escaped = false;
            buf.push(char);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds_and_texts(src: &str) -> Vec<(TokenKind, String)> {
        tokenize(src)
            .expect("failed to lex")
            .into_iter()
            .map(|t| (t.kind, t.text.to_string()))
            .collect()
    }

    #[test]
    fn test_declaration_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds_and_texts("int x = 5 ;"),
            [
                (Keyword, "int".to_string()),
                (Identifier, "x".to_string()),
                (AssignmentOperator, "=".to_string()),
                (IntegerLiteral, "5".to_string()),
                (Punctuation, ";".to_string()),
                (Eof, String::new()),
            ]
        );
    }

    #[test]
    fn tests_with_text() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "integer int_ intx int" => [
                (Identifier, "integer"),
                (Identifier, "int_"),
                (Identifier, "intx"),
                (Keyword, "int"),
            ],
            "0x1F 0b101 017 0 3.25 42 08" => [
                (HexLiteral, "0x1F"),
                (BinaryLiteral, "0b101"),
                (OctalLiteral, "017"),
                (IntegerLiteral, "0"),
                (FloatLiteral, "3.25"),
                (IntegerLiteral, "42"),
                (IntegerLiteral, "08"),
            ],
            "a++ --b c+=1" => [
                (Identifier, "a"),
                (Increment, "++"),
                (Decrement, "--"),
                (Identifier, "b"),
                (Identifier, "c"),
                (AssignmentOperator, "+="),
                (IntegerLiteral, "1"),
            ],
            "<= < == = != ! && ||" => [
                (ComparisonOperator, "<="),
                (ComparisonOperator, "<"),
                (ComparisonOperator, "=="),
                (AssignmentOperator, "="),
                (ComparisonOperator, "!="),
                (LogicalOperator, "!"),
                (LogicalOperator, "&&"),
                (LogicalOperator, "||"),
            ],
            "a/b // comment\n/* block\n comment */ %" => [
                (Identifier, "a"),
                (ArithmeticOperator, "/"),
                (Identifier, "b"),
                (ArithmeticOperator, "%"),
            ],
            r#""hi \"there\"" 'a' '\n'"# => [
                (StringLiteral, r#""hi \"there\"""#),
                (CharLiteral, "'a'"),
                (CharLiteral, r"'\n'"),
            ],
            "f(a, b) { }" => [
                (Identifier, "f"),
                (Punctuation, "("),
                (Identifier, "a"),
                (Punctuation, ","),
                (Identifier, "b"),
                (Punctuation, ")"),
                (Punctuation, "{"),
                (Punctuation, "}"),
            ],
        });

        for (input, expected) in cases {
            let mut lexed = kinds_and_texts(input);
            assert_eq!(lexed.pop(), Some((Eof, String::new())));
            let expected: Vec<_> = expected
                .iter()
                .map(|(kind, text)| (*kind, (*text).to_string()))
                .collect();
            assert_eq!(lexed, expected, "input: {input:?}");
        }
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("int x\n  = 5;").unwrap();
        let positions: Vec<_> = tokens.iter().map(|t| (t.line, t.column)).collect();
        assert_eq!(positions, [(1, 1), (1, 5), (2, 3), (2, 5), (2, 6), (2, 7)]);
    }

    #[test]
    fn test_positions_after_multiline_comment() {
        let tokens = tokenize("/* a\nb */x").unwrap();
        assert_eq!(&*tokens[0].text, "x");
        assert_eq!(tokens[0].pos(), Position { line: 2, column: 5 });
        assert_eq!(tokens[0].span(), Span::new_of_bounds(9..10));
    }

    #[test]
    fn test_unexpected_character() {
        assert_eq!(
            tokenize("int $x"),
            Err(Error {
                position: 4,
                line: 1,
                column: 5,
                character: '$',
            })
        );
    }

    #[test]
    fn test_unclosed_string() {
        let error = tokenize("x = \"abc").unwrap_err();
        assert_eq!(error.character, '"');
        assert_eq!(error.pos(), Position { line: 1, column: 5 });
    }

    #[test]
    fn test_extract_numbers() {
        use crate::ast::Number;
        let tokens = tokenize("0x1F 0b101 017 12 2.5 '\\n'").unwrap();
        let numbers: Vec<_> = tokens[..5].iter().map(extract::number).collect();
        assert_eq!(
            numbers,
            [
                Some(Number::Int(31)),
                Some(Number::Int(5)),
                Some(Number::Int(15)),
                Some(Number::Int(12)),
                Some(Number::Float(2.5)),
            ]
        );
        assert_eq!(extract::char(&tokens[5]), Some(10));
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $text:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![$(($kind, $text)),*],
            )),*]
        }};
    }
    use cases;
}
