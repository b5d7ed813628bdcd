//! Hand-written recursive-descent SQL parser.
//!
//! Tokenizes with [`tokenizer::tokenize`], then parses a single statement
//! via the grammar in spec §4.5: `SELECT`, `INSERT`, `CREATE TABLE`, and
//! `UPDATE`. A trailing `;` is tolerated; multiple statements are not.

mod ast;
pub mod tokenizer;

pub use ast::*;

use common::{DbError, DbResult};
use expr::{BinaryOp, Expr};
use tokenizer::{Keyword, Operator, Punctuation, Token, TokenKind, tokenize};
use types::{ColumnType, Value};

/// Parse a single SQL statement.
pub fn parse_sql(sql: &str) -> DbResult<Statement> {
    let tokens = tokenize(sql)?;
    if matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::Eof)) {
        return Err(DbError::Syntax("Empty query".to_string()));
    }

    let mut parser = Parser::new(&tokens);
    match parser.peek().clone() {
        TokenKind::Keyword(Keyword::Select) => parser.parse_select(),
        TokenKind::Keyword(Keyword::Insert) => parser.parse_insert(),
        TokenKind::Keyword(Keyword::Create) => parser.parse_create_table(),
        TokenKind::Keyword(Keyword::Update) => parser.parse_update(),
        _ => Err(DbError::Syntax(
            "expected one of SELECT, INSERT, CREATE, UPDATE".to_string(),
        )),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn expect_keyword(&mut self, kw: Keyword) -> DbResult<()> {
        if matches!(self.peek(), TokenKind::Keyword(k) if *k == kw) {
            self.advance();
            Ok(())
        } else {
            Err(DbError::Syntax(format!("expected keyword {kw:?}")))
        }
    }

    fn expect_identifier(&mut self) -> DbResult<String> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(DbError::Syntax(format!(
                "expected identifier, found {other:?}"
            ))),
        }
    }

    fn expect_punct(&mut self, p: Punctuation) -> DbResult<()> {
        if matches!(self.peek(), TokenKind::Punctuation(x) if *x == p) {
            self.advance();
            Ok(())
        } else {
            Err(DbError::Syntax(format!("expected {p:?}")))
        }
    }

    fn expect_literal(&mut self) -> DbResult<Value> {
        match self.peek().clone() {
            TokenKind::Literal(v) => {
                self.advance();
                Ok(v)
            }
            other => Err(DbError::Syntax(format!(
                "expected literal value, found {other:?}"
            ))),
        }
    }

    /// Verify the statement ends here (`EOF`, or a single trailing `;`),
    /// producing scoped error messages naming what came before.
    fn expect_end(&mut self, context: &str) -> DbResult<()> {
        match self.peek() {
            TokenKind::Eof => Ok(()),
            TokenKind::Punctuation(Punctuation::Semicolon) => {
                self.advance();
                match self.peek() {
                    TokenKind::Eof => Ok(()),
                    _ => Err(DbError::Syntax(format!(
                        "unexpected tokens after {context}"
                    ))),
                }
            }
            _ => Err(DbError::Syntax(format!(
                "unexpected tokens after {context}"
            ))),
        }
    }

    // ---- SELECT --------------------------------------------------------

    fn parse_select(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Select)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_select_item()?);
            if matches!(self.peek(), TokenKind::Punctuation(Punctuation::Comma)) {
                self.advance();
                continue;
            }
            break;
        }

        let from = if matches!(self.peek(), TokenKind::Keyword(Keyword::From)) {
            self.advance();
            match self.peek().clone() {
                TokenKind::Identifier(name) => {
                    self.advance();
                    Some(name)
                }
                TokenKind::Literal(_) => {
                    return Err(DbError::Syntax(
                        "expected table name, found a literal".to_string(),
                    ));
                }
                other => {
                    return Err(DbError::Syntax(format!(
                        "expected table name after FROM, found {other:?}"
                    )));
                }
            }
        } else {
            None
        };

        if from.is_none() && !matches!(self.peek(), TokenKind::Keyword(Keyword::Where)) {
            self.expect_end("SELECT list")?;
        } else if from.is_some() && !matches!(self.peek(), TokenKind::Keyword(Keyword::Where)) {
            self.expect_end("table name")?;
        }

        let selection = if matches!(self.peek(), TokenKind::Keyword(Keyword::Where)) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        if selection.is_some() {
            self.expect_end("WHERE clause")?;
        }

        Ok(Statement::Select {
            columns,
            from,
            selection,
        })
    }

    fn parse_select_item(&mut self) -> DbResult<SelectItem> {
        match self.peek().clone() {
            TokenKind::Operator(Operator::Star) => {
                self.advance();
                Ok(SelectItem::Wildcard)
            }
            TokenKind::Literal(v) => {
                self.advance();
                Ok(SelectItem::Literal(v))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(SelectItem::Column(name))
            }
            other => Err(DbError::Syntax(format!(
                "expected a column, literal, or *, found {other:?}"
            ))),
        }
    }

    // ---- INSERT ---------------------------------------------------------

    fn parse_insert(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Values)?;
        self.expect_punct(Punctuation::LParen)?;

        let mut values = Vec::new();
        if !matches!(self.peek(), TokenKind::Punctuation(Punctuation::RParen)) {
            loop {
                values.push(self.expect_literal()?);
                if matches!(self.peek(), TokenKind::Punctuation(Punctuation::Comma)) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect_punct(Punctuation::RParen)?;
        if values.is_empty() {
            return Err(DbError::Syntax(
                "INSERT VALUES list must not be empty".to_string(),
            ));
        }

        self.expect_end("VALUES list")?;

        Ok(Statement::Insert { table, values })
    }

    // ---- CREATE TABLE -----------------------------------------------------

    fn parse_create_table(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_identifier()?;

        let columns = if matches!(self.peek(), TokenKind::Punctuation(Punctuation::LParen)) {
            self.advance();
            let mut cols = Vec::new();
            loop {
                cols.push(self.parse_column_def()?);
                if matches!(self.peek(), TokenKind::Punctuation(Punctuation::Comma)) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect_punct(Punctuation::RParen)?;
            Some(cols)
        } else {
            None
        };

        self.expect_end("table definition")?;

        Ok(Statement::CreateTable { table, columns })
    }

    fn parse_column_def(&mut self) -> DbResult<ColumnDef> {
        let name = self.expect_identifier()?;
        let ty = match self.advance() {
            TokenKind::Keyword(Keyword::Integer) => ColumnType::Integer,
            TokenKind::Keyword(Keyword::Text) => ColumnType::Text,
            TokenKind::Keyword(Keyword::Boolean) => ColumnType::Boolean,
            TokenKind::Keyword(Keyword::Varchar) => {
                if matches!(self.peek(), TokenKind::Punctuation(Punctuation::LParen)) {
                    self.advance();
                    let size = match self.expect_literal()? {
                        Value::Int(n) if n > 0 => n as u32,
                        _ => {
                            return Err(DbError::Syntax(
                                "VARCHAR size must be a positive integer".to_string(),
                            ));
                        }
                    };
                    self.expect_punct(Punctuation::RParen)?;
                    ColumnType::Varchar(size)
                } else {
                    ColumnType::Varchar(255)
                }
            }
            other => {
                return Err(DbError::Syntax(format!(
                    "expected a column type, found {other:?}"
                )));
            }
        };
        Ok(ColumnDef { name, ty })
    }

    // ---- UPDATE -----------------------------------------------------------

    fn parse_update(&mut self) -> DbResult<Statement> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;
        let column = self.expect_identifier()?;
        if !matches!(self.peek(), TokenKind::Operator(Operator::Eq)) {
            return Err(DbError::Syntax("expected = in SET clause".to_string()));
        }
        self.advance();
        let value = self.expect_literal()?;

        let selection = if matches!(self.peek(), TokenKind::Keyword(Keyword::Where)) {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        self.expect_end("WHERE clause")?;

        Ok(Statement::Update {
            table,
            set: (column, value),
            selection,
        })
    }

    // ---- Expressions: OR < AND < comparisons -------------------------------

    fn parse_expr(&mut self) -> DbResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> DbResult<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), TokenKind::Keyword(Keyword::Or)) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> DbResult<Expr> {
        let mut left = self.parse_comparison()?;
        while matches!(self.peek(), TokenKind::Keyword(Keyword::And)) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> DbResult<Expr> {
        let left = self.parse_primary()?;
        let Some(op) = comparison_op(self.peek()) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_primary()?;
        let expr = Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        };
        if comparison_op(self.peek()).is_some() {
            return Err(DbError::Syntax(
                "comparison operators cannot be chained".to_string(),
            ));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> DbResult<Expr> {
        match self.peek().clone() {
            TokenKind::Literal(v) => {
                self.advance();
                Ok(Expr::Literal(v))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Expr::Column(name))
            }
            TokenKind::Punctuation(Punctuation::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect_punct(Punctuation::RParen)?;
                Ok(expr)
            }
            other => Err(DbError::Syntax(format!(
                "expected a column or literal, found {other:?}"
            ))),
        }
    }
}

fn comparison_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Operator(Operator::Eq) => Some(BinaryOp::Eq),
        TokenKind::Operator(Operator::Ne) => Some(BinaryOp::Ne),
        TokenKind::Operator(Operator::Lt) => Some(BinaryOp::Lt),
        TokenKind::Operator(Operator::Gt) => Some(BinaryOp::Gt),
        TokenKind::Operator(Operator::Le) => Some(BinaryOp::Le),
        TokenKind::Operator(Operator::Ge) => Some(BinaryOp::Ge),
        _ => None,
    }
}
