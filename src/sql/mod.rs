/// MySQL-dialect SQL front end
///
/// Architecture:
/// - Lexer: tokenizes statement text, honoring sql_mode escaping rules
/// - Parser: builds the AST from tokens
/// - Display: renders AST fragments back to canonical MySQL text

pub mod token;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod display;

pub use token::{Token, TokenType, Keyword, VariableScope};
pub use lexer::{Lexer, LexerOptions};
pub use ast::{Statement, Query, SelectStmt, InsertStmt, CreateTableStmt, Expr, BinaryOperator};
pub use parser::Parser;

use crate::error::ParseError;

/// A parsed statement with the number of `?` placeholders it uses.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub statement: Statement,
    pub placeholders: usize,
}

/// Parse exactly one statement.
pub fn parse(sql: &str, options: LexerOptions) -> Result<Parsed, ParseError> {
    let mut lexer = Lexer::with_options(sql, options);
    let tokens = lexer.tokenize()?;
    let mut parser = Parser::new(tokens, sql);
    let statement = parser.parse()?;
    Ok(Parsed {
        statement,
        placeholders: parser.placeholder_count(),
    })
}

/// Parse one expression in canonical form (CHECK bodies, DEFAULT expressions).
pub fn parse_expression(text: &str, options: LexerOptions) -> Result<ast::Expr, ParseError> {
    let mut lexer = Lexer::with_options(text, options);
    let tokens = lexer.tokenize()?;
    Parser::new(tokens, text).parse_standalone_expr()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counts_placeholders() {
        let parsed = parse("UPDATE t SET a = ? WHERE b = ?", LexerOptions::default()).unwrap();
        assert_eq!(parsed.placeholders, 2);
        assert!(parsed.statement.is_dml());
    }

    #[test]
    fn test_no_backslash_escapes_changes_literals() {
        let relaxed = parse("SELECT 'a\\_b'", LexerOptions::default()).unwrap();
        let literal = parse(
            "SELECT 'a\\_b'",
            LexerOptions {
                no_backslash_escapes: true,
                ..LexerOptions::default()
            },
        )
        .unwrap();
        // `\_` keeps its backslash in both modes; `\\` differs
        assert_eq!(relaxed, literal);

        let escaped = parse("SELECT 'a\\\\b'", LexerOptions::default()).unwrap();
        let raw = parse(
            "SELECT 'a\\\\b'",
            LexerOptions {
                no_backslash_escapes: true,
                ..LexerOptions::default()
            },
        )
        .unwrap();
        assert_ne!(escaped, raw);
    }

    #[test]
    fn test_parse_expression_reads_canonical_text() {
        let expr = parse_expression("(`price` > 0)", LexerOptions::default()).unwrap();
        assert_eq!(expr.to_string(), "(`price` > 0)");
        assert!(parse_expression("1 2", LexerOptions::default()).is_err());
    }
}
