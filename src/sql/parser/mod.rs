/// SQL Parser - converts tokens into AST
///
/// Split by statement family: `expr` (expressions and queries), `dml`,
/// `ddl` and `admin` (SHOW / SET / DESCRIBE). Shared cursor helpers live here.
mod admin;
mod ddl;
mod dml;
mod expr;

use super::ast::*;
use super::token::{Keyword, Token, TokenType};
use crate::error::ParseError;

pub(crate) type PResult<T> = std::result::Result<T, ParseError>;

/// Non-reserved words that never start an implicit alias.
const ALIAS_STOP_WORDS: &[&str] = &[
    "END", "READ", "WRITE", "LOW_PRIORITY", "PARTITION", "WINDOW", "DUAL",
];

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    source: String,
    placeholders: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, source: &str) -> Self {
        Self {
            tokens,
            position: 0,
            source: source.to_string(),
            placeholders: 0,
        }
    }

    /// Number of `?` placeholders seen so far.
    pub fn placeholder_count(&self) -> usize {
        self.placeholders
    }

    /// Parse exactly one statement; trailing semicolons are allowed, further
    /// statements are not.
    pub fn parse(&mut self) -> PResult<Statement> {
        while self.match_token(TokenType::Semicolon) {}
        if self.is_eof() {
            return Err(ParseError::Empty);
        }

        let stmt = self.parse_statement()?;

        while self.match_token(TokenType::Semicolon) {}
        if !self.is_eof() {
            let had_separator = self.position > 0
                && matches!(self.tokens[self.position - 1].token_type, TokenType::Semicolon);
            if had_separator {
                return Err(ParseError::MultipleStatements);
            }
            return Err(self.error("unexpected trailing input"));
        }
        Ok(stmt)
    }

    /// Parse one standalone expression, as stored for CHECK clauses and
    /// expression defaults.
    pub fn parse_standalone_expr(&mut self) -> PResult<Expr> {
        if self.is_eof() {
            return Err(ParseError::Empty);
        }
        let expr = self.parse_expr()?;
        if !self.is_eof() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        let token = self.current().token_type.clone();
        match token {
            TokenType::Keyword(Keyword::Select) | TokenType::LParen => {
                Ok(Statement::Select(self.parse_query()?))
            }
            TokenType::Keyword(Keyword::With) => Err(ParseError::Unsupported(
                "WITH (common table expressions)".into(),
            )),
            TokenType::Keyword(Keyword::Insert) | TokenType::Keyword(Keyword::Replace) => {
                Ok(Statement::Insert(self.parse_insert()?))
            }
            TokenType::Keyword(Keyword::Update) => Ok(Statement::Update(self.parse_update()?)),
            TokenType::Keyword(Keyword::Delete) => Ok(Statement::Delete(self.parse_delete()?)),
            TokenType::Keyword(Keyword::Create) => self.parse_create(),
            TokenType::Keyword(Keyword::Alter) => self.parse_alter(),
            TokenType::Keyword(Keyword::Drop) => self.parse_drop(),
            TokenType::Keyword(Keyword::Rename) => self.parse_rename(),
            TokenType::Keyword(Keyword::Use) => {
                self.advance();
                Ok(Statement::Use(self.parse_identifier()?))
            }
            TokenType::Keyword(Keyword::Set) => self.parse_set(),
            TokenType::Keyword(Keyword::Show) => self.parse_show(),
            TokenType::Keyword(Keyword::Describe)
            | TokenType::Keyword(Keyword::Desc)
            | TokenType::Keyword(Keyword::Explain) => self.parse_describe(),
            TokenType::Keyword(Keyword::Release) => {
                self.advance();
                self.expect_word("SAVEPOINT")?;
                Ok(Statement::ReleaseSavepoint(self.parse_identifier()?))
            }
            TokenType::Keyword(Keyword::Lock) => self.parse_lock_tables(),
            TokenType::Identifier(ref word) => match word.to_ascii_uppercase().as_str() {
                "BEGIN" => {
                    self.advance();
                    self.match_word("WORK");
                    Ok(Statement::Begin)
                }
                "START" => {
                    self.advance();
                    self.expect_word("TRANSACTION")?;
                    self.skip_transaction_characteristics()?;
                    Ok(Statement::Begin)
                }
                "COMMIT" => {
                    self.advance();
                    self.match_word("WORK");
                    self.skip_completion_options();
                    Ok(Statement::Commit)
                }
                "ROLLBACK" => self.parse_rollback(),
                "SAVEPOINT" => {
                    self.advance();
                    Ok(Statement::Savepoint(self.parse_identifier()?))
                }
                "TRUNCATE" => {
                    self.advance();
                    self.match_keyword(Keyword::Table);
                    Ok(Statement::TruncateTable(self.parse_object_name()?))
                }
                "UNLOCK" => {
                    self.advance();
                    if !self.match_word("TABLES") {
                        self.expect_keyword(Keyword::Table)?;
                    }
                    Ok(Statement::UnlockTables)
                }
                other => Err(self.error(&format!("unknown statement '{}'", other))),
            },
            _ => Err(self.error("expected a statement")),
        }
    }

    fn parse_rollback(&mut self) -> PResult<Statement> {
        self.advance();
        self.match_word("WORK");
        if self.match_keyword(Keyword::To) {
            self.match_word("SAVEPOINT");
            return Ok(Statement::RollbackToSavepoint(self.parse_identifier()?));
        }
        self.skip_completion_options();
        Ok(Statement::Rollback)
    }

    // START TRANSACTION [WITH CONSISTENT SNAPSHOT | READ ONLY | READ WRITE], ...
    fn skip_transaction_characteristics(&mut self) -> PResult<()> {
        loop {
            if self.match_keyword(Keyword::With) {
                self.expect_word("CONSISTENT")?;
                self.expect_word("SNAPSHOT")?;
            } else if self.match_word("READ") {
                if !self.match_word("ONLY") {
                    self.expect_word("WRITE")?;
                }
            } else {
                return Ok(());
            }
            if !self.match_token(TokenType::Comma) {
                return Ok(());
            }
        }
    }

    // [AND [NO] CHAIN] [[NO] RELEASE]
    fn skip_completion_options(&mut self) {
        if self.match_keyword(Keyword::And) {
            self.match_word("NO");
            self.match_word("CHAIN");
        }
        self.match_word("NO");
        self.match_keyword(Keyword::Release);
    }

    fn parse_lock_tables(&mut self) -> PResult<Statement> {
        self.advance();
        if !self.match_word("TABLES") {
            self.expect_keyword(Keyword::Table)?;
        }
        let mut targets = Vec::new();
        loop {
            let table = self.parse_object_name()?;
            let alias = if self.match_keyword(Keyword::As) {
                Some(self.parse_identifier()?)
            } else {
                self.parse_optional_alias()
            };
            let write = if self.match_word("READ") {
                self.match_word("LOCAL");
                false
            } else {
                self.match_word("LOW_PRIORITY");
                self.expect_word("WRITE")?;
                true
            };
            targets.push(LockTarget {
                table,
                alias,
                write,
            });
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(Statement::LockTables(targets))
    }

    // ---- identifiers and names ----------------------------------------

    pub(super) fn parse_identifier(&mut self) -> PResult<String> {
        match &self.current().token_type {
            TokenType::Identifier(name) | TokenType::QuotedIdentifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenType::Keyword(_) => Err(self.error("reserved word used as identifier; quote it with backticks")),
            _ => Err(self.error("expected identifier")),
        }
    }

    /// Identifier or string (aliases, charset names, savepoints).
    pub(super) fn parse_name_or_string(&mut self) -> PResult<String> {
        if let TokenType::String(s) = &self.current().token_type {
            let s = s.clone();
            self.advance();
            return Ok(s);
        }
        // Charset/collation names such as `binary` collide with keywords
        if let TokenType::Keyword(Keyword::Binary) = self.current().token_type {
            self.advance();
            return Ok("binary".to_string());
        }
        if let TokenType::Keyword(Keyword::Default) = self.current().token_type {
            self.advance();
            return Ok("DEFAULT".to_string());
        }
        self.parse_identifier()
    }

    /// `name` or `db.name`
    pub(super) fn parse_object_name(&mut self) -> PResult<ObjectName> {
        let first = self.parse_identifier()?;
        if self.check(&TokenType::Dot) && self.peek_is_identifier(1) {
            self.advance();
            let second = self.parse_identifier()?;
            return Ok(ObjectName::qualified(first, second));
        }
        Ok(ObjectName::bare(first))
    }

    pub(super) fn parse_identifier_list(&mut self) -> PResult<Vec<String>> {
        let mut names = vec![self.parse_identifier()?];
        while self.match_token(TokenType::Comma) {
            names.push(self.parse_identifier()?);
        }
        Ok(names)
    }

    /// `(a, b, c)`
    pub(super) fn parse_parenthesized_identifiers(&mut self) -> PResult<Vec<String>> {
        self.expect(TokenType::LParen)?;
        let names = self.parse_identifier_list()?;
        self.expect(TokenType::RParen)?;
        Ok(names)
    }

    /// Implicit alias: a non-reserved word or quoted name not in the stop list.
    pub(super) fn parse_optional_alias(&mut self) -> Option<String> {
        match &self.current().token_type {
            TokenType::QuotedIdentifier(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            TokenType::Identifier(name)
                if !ALIAS_STOP_WORDS.iter().any(|w| w.eq_ignore_ascii_case(name)) =>
            {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    pub(super) fn parse_string(&mut self) -> PResult<String> {
        match &self.current().token_type {
            TokenType::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error("expected string literal")),
        }
    }

    pub(super) fn parse_u64(&mut self) -> PResult<u64> {
        match &self.current().token_type {
            TokenType::Number(n) => {
                let value = n
                    .parse::<u64>()
                    .map_err(|_| self.error(&format!("expected integer, got {}", n)))?;
                self.advance();
                Ok(value)
            }
            _ => Err(self.error("expected integer")),
        }
    }

    pub(super) fn parse_u32(&mut self) -> PResult<u32> {
        let value = self.parse_u64()?;
        u32::try_from(value).map_err(|_| self.error("integer out of range"))
    }

    /// Skip `=` if present (`ENGINE = InnoDB` and `ENGINE InnoDB` are both valid).
    pub(super) fn skip_equals(&mut self) {
        self.match_token(TokenType::Eq);
    }

    // ---- cursor ---------------------------------------------------------

    pub(super) fn current(&self) -> &Token {
        // The token stream always ends in Eof
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub(super) fn peek(&self, offset: usize) -> &TokenType {
        let idx = (self.position + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].token_type
    }

    fn peek_is_identifier(&self, offset: usize) -> bool {
        matches!(
            self.peek(offset),
            TokenType::Identifier(_) | TokenType::QuotedIdentifier(_)
        )
    }

    pub(super) fn previous_end(&self) -> usize {
        if self.position == 0 {
            0
        } else {
            self.tokens[self.position - 1].end
        }
    }

    pub(super) fn source_text(&self, start: usize, end: usize) -> String {
        self.source.get(start..end).unwrap_or_default().trim().to_string()
    }

    pub(super) fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    pub(super) fn is_eof(&self) -> bool {
        matches!(self.current().token_type, TokenType::Eof)
    }

    pub(super) fn check(&self, token_type: &TokenType) -> bool {
        std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(token_type)
    }

    pub(super) fn check_keyword(&self, keyword: Keyword) -> bool {
        self.current().token_type.is_keyword(keyword)
    }

    pub(super) fn check_word(&self, word: &str) -> bool {
        self.current().token_type.is_word(word)
    }

    pub(super) fn match_token(&mut self, token_type: TokenType) -> bool {
        if self.check(&token_type) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Match a non-reserved word, case-insensitively.
    pub(super) fn match_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(super) fn expect(&mut self, token_type: TokenType) -> PResult<()> {
        if self.check(&token_type) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", token_type)))
        }
    }

    pub(super) fn expect_keyword(&mut self, keyword: Keyword) -> PResult<()> {
        if self.match_keyword(keyword) {
            Ok(())
        } else {
            let name = format!("{:?}", keyword).to_ascii_uppercase();
            Err(self.error(&format!("expected {}", name)))
        }
    }

    pub(super) fn expect_word(&mut self, word: &str) -> PResult<()> {
        if self.match_word(word) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", word)))
        }
    }

    pub(super) fn error(&self, msg: &str) -> ParseError {
        let token = self.current();
        let near = self.source.get(token.start..).unwrap_or_default();
        let near: String = near.chars().take(40).collect();
        ParseError::syntax(
            format!("{} near '{}'", msg, near),
            token.line,
            token.column,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::lexer::Lexer;

    pub(super) fn parse_sql(sql: &str) -> PResult<Statement> {
        let mut lexer = Lexer::new(sql);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser::new(tokens, sql);
        parser.parse()
    }

    #[test]
    fn test_parse_transactions() {
        assert_eq!(parse_sql("BEGIN").unwrap(), Statement::Begin);
        assert_eq!(
            parse_sql("START TRANSACTION READ WRITE, WITH CONSISTENT SNAPSHOT").unwrap(),
            Statement::Begin
        );
        assert_eq!(parse_sql("commit work").unwrap(), Statement::Commit);
        assert_eq!(
            parse_sql("ROLLBACK TO SAVEPOINT sp1").unwrap(),
            Statement::RollbackToSavepoint("sp1".into())
        );
        assert_eq!(
            parse_sql("RELEASE SAVEPOINT sp1").unwrap(),
            Statement::ReleaseSavepoint("sp1".into())
        );
        assert_eq!(parse_sql("SAVEPOINT a;").unwrap(), Statement::Savepoint("a".into()));
    }

    #[test]
    fn test_multiple_statements_rejected() {
        assert_eq!(
            parse_sql("SELECT 1; SELECT 2").unwrap_err(),
            ParseError::MultipleStatements
        );
        assert!(parse_sql("SELECT 1;;").is_ok());
        assert_eq!(parse_sql("  ; ").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn test_lock_tables() {
        let stmt = parse_sql("LOCK TABLES t1 READ, t2 AS x WRITE").unwrap();
        match stmt {
            Statement::LockTables(targets) => {
                assert_eq!(targets.len(), 2);
                assert!(!targets[0].write);
                assert_eq!(targets[1].alias.as_deref(), Some("x"));
                assert!(targets[1].write);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(parse_sql("UNLOCK TABLES").unwrap(), Statement::UnlockTables);
    }

    #[test]
    fn test_truncate_and_use() {
        assert_eq!(
            parse_sql("TRUNCATE TABLE shop.orders").unwrap(),
            Statement::TruncateTable(ObjectName::qualified("shop", "orders"))
        );
        assert_eq!(parse_sql("USE `shop`").unwrap(), Statement::Use("shop".into()));
    }

    #[test]
    fn test_reserved_word_needs_quotes() {
        let err = parse_sql("CREATE TABLE select (a INT)").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }
}
