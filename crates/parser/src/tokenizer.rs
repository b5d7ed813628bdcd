//! Hand-written SQL tokenizer.
//!
//! Consumes a raw SQL string and produces a flat `Vec<Token>`, one token per
//! lexeme, terminated by `Eof`. Keywords are case-insensitive and normalized
//! to uppercase variants; identifiers keep their original case.

use common::{DbError, DbResult};
use types::Value;

/// Reserved words recognized by the grammar (spec §4.5), plus `TRUE`/`FALSE`
/// which the grammar's `Literal(boolean)` category requires a spelling for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    Select,
    From,
    Where,
    And,
    Or,
    Insert,
    Into,
    Values,
    Create,
    Table,
    Update,
    Set,
    Integer,
    Varchar,
    Text,
    Boolean,
    True,
    False,
}

impl Keyword {
    fn from_ident(s: &str) -> Option<Keyword> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SELECT" => Keyword::Select,
            "FROM" => Keyword::From,
            "WHERE" => Keyword::Where,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "INSERT" => Keyword::Insert,
            "INTO" => Keyword::Into,
            "VALUES" => Keyword::Values,
            "CREATE" => Keyword::Create,
            "TABLE" => Keyword::Table,
            "UPDATE" => Keyword::Update,
            "SET" => Keyword::Set,
            "INTEGER" => Keyword::Integer,
            "VARCHAR" => Keyword::Varchar,
            "TEXT" => Keyword::Text,
            "BOOLEAN" => Keyword::Boolean,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Star,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Punctuation {
    Comma,
    LParen,
    RParen,
    Semicolon,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier(String),
    Operator(Operator),
    Punctuation(Punctuation),
    Literal(Value),
    Eof,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenize `input`, returning the token stream including a trailing `Eof`.
pub fn tokenize(input: &str) -> DbResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '\'' {
            let start = i;
            i += 1;
            let mut s = String::new();
            let mut terminated = false;
            while i < chars.len() {
                if chars[i] == '\'' {
                    terminated = true;
                    i += 1;
                    break;
                }
                s.push(chars[i]);
                i += 1;
            }
            if !terminated {
                let _ = start;
                return Err(DbError::Syntax("Unterminated string literal".to_string()));
            }
            tokens.push(Token {
                kind: TokenKind::Literal(Value::Text(s)),
            });
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[start..i].iter().collect();
            let n: i64 = digits
                .parse()
                .map_err(|_| DbError::Syntax(format!("invalid integer literal: {digits}")))?;
            tokens.push(Token {
                kind: TokenKind::Literal(Value::Int(n)),
            });
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_continue(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            if let Some(kw) = Keyword::from_ident(&word) {
                match kw {
                    Keyword::True => tokens.push(Token {
                        kind: TokenKind::Literal(Value::Bool(true)),
                    }),
                    Keyword::False => tokens.push(Token {
                        kind: TokenKind::Literal(Value::Bool(false)),
                    }),
                    other => tokens.push(Token {
                        kind: TokenKind::Keyword(other),
                    }),
                }
            } else {
                tokens.push(Token {
                    kind: TokenKind::Identifier(word),
                });
            }
            continue;
        }

        match c {
            '=' => {
                tokens.push(Token {
                    kind: TokenKind::Operator(Operator::Eq),
                });
                i += 1;
            }
            '!' if matches!(chars.get(i + 1), Some('=')) => {
                tokens.push(Token {
                    kind: TokenKind::Operator(Operator::Ne),
                });
                i += 2;
            }
            '<' if matches!(chars.get(i + 1), Some('=')) => {
                tokens.push(Token {
                    kind: TokenKind::Operator(Operator::Le),
                });
                i += 2;
            }
            '>' if matches!(chars.get(i + 1), Some('=')) => {
                tokens.push(Token {
                    kind: TokenKind::Operator(Operator::Ge),
                });
                i += 2;
            }
            '<' => {
                tokens.push(Token {
                    kind: TokenKind::Operator(Operator::Lt),
                });
                i += 1;
            }
            '>' => {
                tokens.push(Token {
                    kind: TokenKind::Operator(Operator::Gt),
                });
                i += 1;
            }
            '*' => {
                tokens.push(Token {
                    kind: TokenKind::Operator(Operator::Star),
                });
                i += 1;
            }
            ',' => {
                tokens.push(Token {
                    kind: TokenKind::Punctuation(Punctuation::Comma),
                });
                i += 1;
            }
            '(' => {
                tokens.push(Token {
                    kind: TokenKind::Punctuation(Punctuation::LParen),
                });
                i += 1;
            }
            ')' => {
                tokens.push(Token {
                    kind: TokenKind::Punctuation(Punctuation::RParen),
                });
                i += 1;
            }
            ';' => {
                tokens.push(Token {
                    kind: TokenKind::Punctuation(Punctuation::Semicolon),
                });
                i += 1;
            }
            other => return Err(DbError::Syntax(format!("Invalid character: {other}"))),
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
    });
    Ok(tokens)
}
