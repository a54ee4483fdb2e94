use std::fmt;

use log::debug;

use crate::{
    ast::{
        BinaryOperator, Block, Expr, Function, Ident, Item, Number, Param, Program, Stmt, Type,
        UnaryOperator,
    },
    lexer::extract,
    symbols::{ScopeKind, SymbolKind, SymbolTable},
    token::{Keyword, Position, Token, TokenKind},
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Parses the token stream into a program.
pub fn parse(tokens: &[Token]) -> Result<Program> {
    parse_with_symbols(tokens).map(|(program, _)| program)
}

/// Parses the token stream, also returning the symbol table. Only the global
/// scope is still open once parsing finishes; see [`SymbolTable::all`].
pub fn parse_with_symbols(tokens: &[Token]) -> Result<(Program, SymbolTable)> {
    if tokens.is_empty() {
        return Ok((Program::default(), SymbolTable::new()));
    }
    let mut p = Parser::new(tokens);
    let program = p.parse_program()?;
    debug!(
        "parsed {} top-level items, {} scopes",
        program.items.len(),
        p.symbols.all().count()
    );
    Ok((program, p.symbols))
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("{pos}: expected {expected}, but got `{actual}`")]
    Unexpected {
        expected: Expected,
        actual: Box<str>,
        pos: Position,
    },
    #[error("{pos}: unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: Expected, pos: Position },
    #[error("{pos}: invalid numeric literal `{text}`")]
    InvalidNumber { text: Box<str>, pos: Position },
    #[error("{pos}: {name} is not declared")]
    Undeclared { name: Ident, pos: Position },
    #[error("{pos}: {name} is already declared in this scope")]
    Redeclared { name: Ident, pos: Position },
}

impl Error {
    pub fn pos(&self) -> Position {
        match self {
            Error::Unexpected { pos, .. }
            | Error::UnexpectedEof { pos, .. }
            | Error::InvalidNumber { pos, .. }
            | Error::Undeclared { pos, .. }
            | Error::Redeclared { pos, .. } => *pos,
        }
    }

    /// Whether this is a name resolution error rather than a grammar one.
    pub fn is_name_error(&self) -> bool {
        matches!(self, Error::Undeclared { .. } | Error::Redeclared { .. })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    /// A token with this exact text.
    Token(&'static str),
    /// A syntactic category, such as "an expression".
    Description(&'static str),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Token(text) => write!(f, "`{text}`"),
            Expected::Description(description) => f.write_str(description),
        }
    }
}

struct Parser<'tok> {
    tokens: &'tok [Token],
    cursor: usize,
    symbols: SymbolTable,
}

impl Parser<'_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut items = Vec::with_capacity(4);
        while !self.at_eof() {
            let item = if self.is_function_start() {
                Item::Function(self.parse_function()?)
            } else {
                Item::Statement(self.parse_statement()?)
            };
            items.push(item);
        }
        Ok(Program { items })
    }

    /// A type keyword starts a function definition when followed by a name
    /// and an opening parenthesis; otherwise it starts a declaration.
    fn is_function_start(&self) -> bool {
        self.peek().keyword().is_some_and(Keyword::is_type)
            && self.peek_nth(1).kind == TokenKind::Identifier
            && self.peek_nth(2).is(TokenKind::Punctuation, "(")
    }

    fn parse_function(&mut self) -> Result<Function> {
        let return_ty = self.parse_type()?;
        let name_token = self.consume_kind(TokenKind::Identifier, "a function name")?;
        let name = name_token.text.clone();

        // Registered before the body so that recursive calls resolve.
        self.declare(&name, return_ty, SymbolKind::Function, name_token)?;
        self.symbols.enter_scope(ScopeKind::Function(name.clone()));

        self.consume("(")?;
        if self.peek().keyword() == Some(Keyword::Void)
            && self.peek_nth(1).is(TokenKind::Punctuation, ")")
        {
            self.advance();
        }
        let params = self.parse_list(")", ",", Parser::parse_param)?;
        self.consume(")")?;
        let body = self.parse_block()?;

        self.symbols.exit_scope();
        Ok(Function {
            return_ty,
            name,
            params,
            body,
        })
    }

    fn parse_param(&mut self) -> Result<Param> {
        let ty = self.parse_type()?;
        let token = self.consume_kind(TokenKind::Identifier, "a parameter name")?;
        self.declare(&token.text, ty, SymbolKind::Parameter, token)?;
        Ok(Param {
            ty,
            name: token.text.clone(),
        })
    }

    /// Parses `{ statement* }` in a new scope.
    fn parse_block(&mut self) -> Result<Block> {
        self.consume("{")?;
        self.symbols.enter_scope(ScopeKind::Block);
        let mut stmts = Vec::new();
        while !self.is("}") && !self.at_eof() {
            stmts.push(self.parse_statement()?);
        }
        self.consume("}")?;
        self.symbols.exit_scope();
        Ok(Block { stmts })
    }

    /// Loop bodies may be a single statement, which gets no scope of its own.
    fn parse_body(&mut self) -> Result<Block> {
        if self.is("{") {
            self.parse_block()
        } else {
            let stmt = self.parse_statement()?;
            Ok(Block { stmts: vec![stmt] })
        }
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let token = self.peek();
        match token.keyword() {
            Some(Keyword::If) => self.parse_if(),
            Some(Keyword::While) => self.parse_while(),
            Some(Keyword::For) => self.parse_for(),
            Some(Keyword::Return) => self.parse_return(),
            Some(keyword) if keyword.is_type() => {
                let declaration = self.parse_declaration()?;
                self.consume(";")?;
                Ok(declaration)
            }
            Some(_) => Err(Self::unexpected(token, "a statement")),
            None if self.is("{") => self.parse_block().map(Stmt::Block),
            None => {
                let stmt = self.parse_simple_statement()?;
                self.consume(";")?;
                Ok(stmt)
            }
        }
    }

    /// Parses an assignment or an expression statement, without the trailing
    /// semicolon. The token after the leading identifier tells them apart.
    fn parse_simple_statement(&mut self) -> Result<Stmt> {
        let token = self.peek();
        match token.kind {
            TokenKind::Identifier => {
                let next = self.peek_nth(1);
                match next.kind {
                    TokenKind::AssignmentOperator => self.parse_assignment(),
                    TokenKind::Increment | TokenKind::Decrement => self.parse_expr().map(Stmt::Expr),
                    TokenKind::Punctuation if &*next.text == "(" => {
                        self.parse_expr().map(Stmt::Expr)
                    }
                    _ => {
                        self.advance();
                        Err(Self::unexpected(next, "an assignment"))
                    }
                }
            }
            TokenKind::Increment | TokenKind::Decrement => self.parse_expr().map(Stmt::Expr),
            _ => Err(Self::unexpected(token, "a statement")),
        }
    }

    /// Parses `TYPE ID ['=' expr]`, without the trailing semicolon.
    fn parse_declaration(&mut self) -> Result<Stmt> {
        let ty = self.parse_type()?;
        let name = self.consume_kind(TokenKind::Identifier, "a variable name")?;
        self.declare(&name.text, ty, SymbolKind::Variable, name)?;

        let initializer = if self.peek().kind == TokenKind::AssignmentOperator {
            self.consume("=")?;
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Stmt::Declaration {
            ty,
            name: name.text.clone(),
            initializer,
        })
    }

    /// Parses `ID op= expr`. Compound assignments are desugared into
    /// `ID = ID op expr`.
    fn parse_assignment(&mut self) -> Result<Stmt> {
        let target = self.consume_kind(TokenKind::Identifier, "a variable")?;
        self.resolve(target)?;
        let op_token = self.consume_kind(TokenKind::AssignmentOperator, "`=`")?;
        let value = self.parse_expr()?;

        let compound = op_token
            .text
            .strip_suffix('=')
            .and_then(BinaryOperator::from_symbol);
        let value = match compound {
            Some(op) => Expr::binary(op, Expr::Variable(target.text.clone()), value),
            None => value,
        };
        Ok(Stmt::Assignment {
            target: target.text.clone(),
            value,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.advance(); // if
        let condition = self.parse_condition()?;
        let then_block = self.parse_block()?;

        let else_block = if self.peek().keyword() == Some(Keyword::Else) {
            self.advance();
            if self.peek().keyword() == Some(Keyword::If) {
                let nested = self.parse_if()?;
                Some(Block {
                    stmts: vec![nested],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_block,
            else_block,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        self.advance(); // while
        let condition = self.parse_condition()?;
        let body = self.parse_body()?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.advance(); // for
        self.consume("(")?;

        let init = if self.is(";") {
            None
        } else if self.peek().keyword().is_some_and(Keyword::is_type) {
            Some(Box::new(self.parse_declaration()?))
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.consume(";")?;

        let condition = if self.is(";") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(";")?;

        let update = if self.is(")") {
            None
        } else {
            Some(Box::new(self.parse_simple_statement()?))
        };
        self.consume(")")?;

        let body = self.parse_body()?;
        Ok(Stmt::For {
            init,
            condition,
            update,
            body,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt> {
        self.advance(); // return
        let value = if self.is(";") {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(";")?;
        Ok(Stmt::Return(value))
    }

    /// Parses `'(' expr ')'`.
    fn parse_condition(&mut self) -> Result<Expr> {
        self.consume("(")?;
        let condition = self.parse_expr()?;
        self.consume(")")?;
        Ok(condition)
    }

    fn parse_type(&mut self) -> Result<Type> {
        let token = self.peek();
        match token.keyword().and_then(Type::from_keyword) {
            Some(ty) => {
                self.advance();
                Ok(ty)
            }
            None => Err(Self::unexpected(token, "a type")),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    /// Precedence climbing: only operators binding tighter than
    /// `min_precedence` are consumed at this level, so chains of equal
    /// precedence associate to the left.
    fn parse_expr_bp(&mut self, min_precedence: u8) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = Self::infix_operator(self.peek()) {
            let precedence = op.precedence();
            if precedence <= min_precedence {
                break;
            }
            self.advance(); // Operator
            let rhs = self.parse_expr_bp(precedence)?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    fn infix_operator(token: &Token) -> Option<BinaryOperator> {
        match token.kind {
            TokenKind::ArithmeticOperator
            | TokenKind::ComparisonOperator
            | TokenKind::LogicalOperator => BinaryOperator::from_symbol(&token.text),
            _ => None,
        }
    }

    /// Prefix operators: `++`, `--`, `-` and `!`.
    fn parse_unary(&mut self) -> Result<Expr> {
        let token = self.peek();
        let op = match token.kind {
            TokenKind::Increment => UnaryOperator::Increment,
            TokenKind::Decrement => UnaryOperator::Decrement,
            TokenKind::ArithmeticOperator if &*token.text == "-" => UnaryOperator::Negate,
            TokenKind::LogicalOperator if &*token.text == "!" => UnaryOperator::Not,
            _ => return self.parse_primary(),
        };
        self.advance();

        let operand = match op {
            UnaryOperator::Increment | UnaryOperator::Decrement => {
                let target = self.consume_kind(TokenKind::Identifier, "a variable")?;
                self.resolve(target)?;
                Expr::Variable(target.text.clone())
            }
            UnaryOperator::Negate | UnaryOperator::Not => self.parse_unary()?,
        };

        match (op, &operand) {
            (UnaryOperator::Negate, Expr::Number(Number::Int(int))) => {
                Ok(Expr::Number(Number::Int(int.wrapping_neg())))
            }
            (UnaryOperator::Negate, Expr::Number(Number::Float(float))) => {
                Ok(Expr::Number(Number::Float(-float)))
            }
            _ => Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                postfix: false,
            }),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            kind if kind.is_number() => extract::number(token)
                .map(Expr::Number)
                .ok_or_else(|| Self::invalid_number(token)),
            TokenKind::CharLiteral => extract::char(token)
                .map(|c| Expr::Number(Number::Int(c)))
                .ok_or_else(|| Self::invalid_number(token)),
            TokenKind::StringLiteral => Ok(Expr::String(extract::string(token))),
            TokenKind::Punctuation if &*token.text == "(" => {
                let expr = self.parse_expr()?;
                self.consume(")")?;
                Ok(expr)
            }
            TokenKind::Identifier if self.is("(") => self.parse_call(token),
            TokenKind::Identifier => {
                self.resolve(token)?;
                let name = token.text.clone();
                let op = match self.peek().kind {
                    TokenKind::Increment => UnaryOperator::Increment,
                    TokenKind::Decrement => UnaryOperator::Decrement,
                    _ => return Ok(Expr::Variable(name)),
                };
                self.advance();
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(Expr::Variable(name)),
                    postfix: true,
                })
            }
            _ => Err(Self::unexpected(token, "an expression")),
        }
    }

    /// Parses the arguments of a call to `name`; the name is already consumed.
    fn parse_call(&mut self, name: &Token) -> Result<Expr> {
        self.resolve(name)?;
        self.consume("(")?;
        let args = self.parse_list(")", ",", Parser::parse_expr)?;
        self.consume(")")?;
        Ok(Expr::Call {
            name: name.text.clone(),
            args,
        })
    }

    /// Parses `item (separator item)*` until `end` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end: &'static str,
        separator: &'static str,
        mut parse_item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        debug_assert_ne!(end, separator);
        let mut items = Vec::new();
        if self.is(end) {
            return Ok(items);
        }
        loop {
            items.push(parse_item(self)?);
            if !self.take(separator) {
                break;
            }
        }
        Ok(items)
    }
}

impl<'tok> Parser<'tok> {
    fn new(tokens: &'tok [Token]) -> Parser<'tok> {
        debug_assert!(tokens.last().is_some_and(Token::is_eof));
        Parser {
            tokens,
            cursor: 0,
            symbols: SymbolTable::new(),
        }
    }

    /// Returns the current token.
    ///
    /// Past the end of the stream, this keeps returning the last token.
    fn peek(&self) -> &'tok Token {
        self.peek_nth(0)
    }

    /// Returns the token `n` positions after the current one.
    fn peek_nth(&self, n: usize) -> &'tok Token {
        let tokens: &'tok [Token] = self.tokens;
        let i = (self.cursor + n).min(tokens.len() - 1);
        &tokens[i]
    }

    /// Returns the current token and advances.
    fn advance(&mut self) -> &'tok Token {
        let c = self.peek();
        self.cursor += 1;
        c
    }

    fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    /// Checks whether the current token is the provided punctuation or
    /// operator.
    fn is(&self, text: &str) -> bool {
        let c = self.peek();
        !c.is_eof() && &*c.text == text
    }

    /// Advances if the current token matches the provided text, returning
    /// true. If not, returns false and doesn't advance.
    fn take(&mut self, text: &str) -> bool {
        if self.is(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided text. If not,
    /// fails.
    fn consume(&mut self, text: &'static str) -> Result<&'tok Token> {
        let c = self.peek();
        if self.is(text) {
            self.advance();
            Ok(c)
        } else {
            Err(Self::unexpected_expecting(c, Expected::Token(text)))
        }
    }

    /// Advances if the current token has the provided kind. If not, fails.
    fn consume_kind(&mut self, kind: TokenKind, description: &'static str) -> Result<&'tok Token> {
        let c = self.peek();
        if c.kind == kind {
            self.advance();
            Ok(c)
        } else {
            Err(Self::unexpected(c, description))
        }
    }

    fn unexpected(token: &Token, description: &'static str) -> Error {
        Self::unexpected_expecting(token, Expected::Description(description))
    }

    fn unexpected_expecting(token: &Token, expected: Expected) -> Error {
        if token.is_eof() {
            Error::UnexpectedEof {
                expected,
                pos: token.pos(),
            }
        } else {
            Error::Unexpected {
                expected,
                actual: token.text.clone(),
                pos: token.pos(),
            }
        }
    }

    fn invalid_number(token: &Token) -> Error {
        Error::InvalidNumber {
            text: token.text.clone(),
            pos: token.pos(),
        }
    }

    /// Fails if the identifier does not resolve in any enclosing scope.
    fn resolve(&self, token: &Token) -> Result<()> {
        if self.symbols.is_declared(&token.text) {
            Ok(())
        } else {
            Err(Error::Undeclared {
                name: token.text.clone(),
                pos: token.pos(),
            })
        }
    }

    fn declare(&mut self, name: &str, ty: Type, kind: SymbolKind, token: &Token) -> Result<()> {
        self.symbols
            .declare(name, ty, kind)
            .map_err(|redeclared| Error::Redeclared {
                name: redeclared.name,
                pos: token.pos(),
            })
    }
}
