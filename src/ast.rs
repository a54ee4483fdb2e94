// program     ::= (function | statement)*
// function    ::= TYPE ID '(' [TYPE ID (',' TYPE ID)*] ')' block
// block       ::= '{' statement* '}'
// statement   ::= TYPE ID ['=' expr] ';'
//               | ID ('=' | '+=' | '-=' | '*=' | '/=' | '%=') expr ';'
//               | ID ('++' | '--') ';'
//               | ('++' | '--') ID ';'
//               | ID '(' [expr (',' expr)*] ')' ';'
//               | if '(' expr ')' block [else block]
//               | while '(' expr ')' (block | statement)
//               | for '(' [simple] ';' [expr] ';' [simple] ')' (block | statement)
//               | return [expr] ';'
//               | block
// expr        ::= expr BINOP expr
//               | ('-' | '!' | '++' | '--') unary
//               | ID ('++' | '--')
//               | ID '(' [expr (',' expr)*] ')'
//               | '(' expr ')'
//               | ID | NUMBER | STRING | CHAR

// Precedence
//
// * / %
// + -
// < > <= >=
// == !=
// &&
// ||

use std::fmt;

use crate::token::Keyword;

pub type Ident = Box<str>;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Function(Function),
    Statement(Stmt),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub return_ty: Type,
    pub name: Ident,
    pub params: Vec<Param>,
    pub body: Block,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: Ident,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Declaration {
        ty: Type,
        name: Ident,
        initializer: Option<Expr>,
    },
    Assignment {
        target: Ident,
        value: Expr,
    },
    If {
        condition: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        condition: Expr,
        body: Block,
    },
    For {
        /// Either a declaration or an assignment.
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Block,
    },
    Return(Option<Expr>),
    /// An expression evaluated for its side effects, such as `i++;`.
    Expr(Expr),
    Block(Block),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
        postfix: bool,
    },
    Call {
        name: Ident,
        args: Vec<Expr>,
    },
    Number(Number),
    Variable(Ident),
    String(Box<str>),
}

impl Expr {
    pub fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Expr::Number(number) => Some(*number),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(int) => int as f64,
            Number::Float(float) => float,
        }
    }

    pub fn is_truthy(self) -> bool {
        match self {
            Number::Int(int) => int != 0,
            Number::Float(float) => float != 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(int) => write!(f, "{int}"),
            // Debug formatting keeps the fractional part of whole floats.
            Number::Float(float) => write!(f, "{float:?}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Increment,
    Decrement,
    Negate,
    Not,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Increment => "++",
            UnaryOperator::Decrement => "--",
            UnaryOperator::Negate => "-",
            UnaryOperator::Not => "!",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOperator {
    pub const ALL: &[BinaryOperator] = &[
        BinaryOperator::Or,
        BinaryOperator::And,
        BinaryOperator::Eq,
        BinaryOperator::Ne,
        BinaryOperator::Lt,
        BinaryOperator::Gt,
        BinaryOperator::Le,
        BinaryOperator::Ge,
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Rem,
    ];

    /// Higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq | BinaryOperator::Ne => 3,
            BinaryOperator::Lt | BinaryOperator::Gt | BinaryOperator::Le | BinaryOperator::Ge => 4,
            BinaryOperator::Add | BinaryOperator::Sub => 5,
            BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Rem => 6,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Or => "||",
            BinaryOperator::And => "&&",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<BinaryOperator> {
        Self::ALL.iter().copied().find(|op| op.symbol() == symbol)
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Mul
                | BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::And
                | BinaryOperator::Or
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Double,
    Float,
    Char,
    Void,
}

impl Type {
    pub fn from_keyword(keyword: Keyword) -> Option<Type> {
        let ty = match keyword {
            Keyword::Int => Type::Int,
            Keyword::Double => Type::Double,
            Keyword::Float => Type::Float,
            Keyword::Char => Type::Char,
            Keyword::Void => Type::Void,
            _ => return None,
        };
        Some(ty)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Int => "int",
            Type::Double => "double",
            Type::Float => "float",
            Type::Char => "char",
            Type::Void => "void",
        };
        f.write_str(name)
    }
}
