//! SHOW / SET / DESCRIBE

use super::{PResult, Parser};
use crate::error::ParseError;
use crate::sql::ast::*;
use crate::sql::token::{Keyword, TokenType, VariableScope};

impl Parser {
    pub(super) fn parse_show(&mut self) -> PResult<Statement> {
        self.expect_keyword(Keyword::Show)?;

        if self.match_keyword(Keyword::Databases) || self.match_keyword(Keyword::Schemas) {
            let filter = self.parse_show_filter()?;
            return Ok(Statement::Show(ShowStmt::Databases { filter }));
        }

        if self.match_keyword(Keyword::Create) {
            if self.match_keyword(Keyword::Table) {
                return Ok(Statement::Show(ShowStmt::CreateTable(self.parse_object_name()?)));
            }
            if self.match_keyword(Keyword::Database) || self.match_keyword(Keyword::Schema) {
                let if_not_exists = if self.match_keyword(Keyword::If) {
                    self.expect_keyword(Keyword::Not)?;
                    self.expect_keyword(Keyword::Exists)?;
                    true
                } else {
                    false
                };
                let name = self.parse_identifier()?;
                return Ok(Statement::Show(ShowStmt::CreateDatabase { name, if_not_exists }));
            }
            return Err(ParseError::Unsupported("SHOW CREATE for this object type".into()));
        }

        let full = self.match_word("FULL");
        if self.match_word("TABLES") {
            let database = self.parse_show_database()?;
            let filter = self.parse_show_filter()?;
            return Ok(Statement::Show(ShowStmt::Tables { database, full, filter }));
        }
        if self.match_word("COLUMNS") || self.match_word("FIELDS") {
            let table = self.parse_show_table()?;
            let filter = self.parse_show_filter()?;
            return Ok(Statement::Show(ShowStmt::Columns { table, full, filter }));
        }
        if full {
            return Err(self.error("expected TABLES or COLUMNS after SHOW FULL"));
        }

        if self.match_keyword(Keyword::Index) || self.match_word("INDEXES") || self.match_keyword(Keyword::Keys) {
            let table = self.parse_show_table()?;
            let filter = self.parse_show_filter()?;
            if matches!(filter, Some(ShowFilter::Like(_))) {
                return Err(self.error("SHOW INDEX does not accept LIKE"));
            }
            return Ok(Statement::Show(ShowStmt::Index { table, filter }));
        }

        if self.match_keyword(Keyword::Table) {
            self.expect_word("STATUS")?;
            let database = self.parse_show_database()?;
            let filter = self.parse_show_filter()?;
            return Ok(Statement::Show(ShowStmt::TableStatus { database, filter }));
        }

        let global = if self.match_word("GLOBAL") {
            true
        } else {
            let _ = self.match_word("SESSION") || self.match_word("LOCAL");
            false
        };
        if self.match_word("VARIABLES") {
            let filter = self.parse_show_filter()?;
            return Ok(Statement::Show(ShowStmt::Variables { global, filter }));
        }

        if self.match_word("COLLATION") {
            let filter = self.parse_show_filter()?;
            return Ok(Statement::Show(ShowStmt::Collation { filter }));
        }
        if self.match_word("CHARSET")
            || (self.check_keyword(Keyword::Character) && self.peek(1).is_keyword(Keyword::Set))
        {
            if self.match_keyword(Keyword::Character) {
                self.advance();
            }
            let filter = self.parse_show_filter()?;
            return Ok(Statement::Show(ShowStmt::CharacterSet { filter }));
        }
        if self.match_word("WARNINGS") {
            if self.match_keyword(Keyword::Limit) {
                self.parse_limit()?;
            }
            return Ok(Statement::Show(ShowStmt::Warnings));
        }

        match self.current().token_type.identifier() {
            Some(word) => Err(ParseError::Unsupported(format!("SHOW {}", word.to_ascii_uppercase()))),
            None => Err(self.error("unknown SHOW statement")),
        }
    }

    /// `FROM|IN tbl [FROM|IN db]`
    fn parse_show_table(&mut self) -> PResult<ObjectName> {
        if !self.match_keyword(Keyword::From) {
            self.expect_keyword(Keyword::In)?;
        }
        let mut table = self.parse_object_name()?;
        if let Some(database) = self.parse_show_database()? {
            table.database = Some(database);
        }
        Ok(table)
    }

    fn parse_show_database(&mut self) -> PResult<Option<String>> {
        if self.match_keyword(Keyword::From) || self.match_keyword(Keyword::In) {
            return Ok(Some(self.parse_identifier()?));
        }
        Ok(None)
    }

    fn parse_show_filter(&mut self) -> PResult<Option<ShowFilter>> {
        if self.match_keyword(Keyword::Like) {
            return Ok(Some(ShowFilter::Like(self.parse_string()?)));
        }
        if self.match_keyword(Keyword::Where) {
            return Ok(Some(ShowFilter::Where(self.parse_expr()?)));
        }
        Ok(None)
    }

    pub(super) fn parse_set(&mut self) -> PResult<Statement> {
        self.expect_keyword(Keyword::Set)?;

        if self.match_word("NAMES") {
            let charset = self.parse_name_or_string()?;
            let collation = if self.match_keyword(Keyword::Collate) {
                Some(self.parse_name_or_string()?)
            } else {
                None
            };
            return Ok(Statement::SetNames { charset, collation });
        }
        if self.match_word("CHARSET")
            || (self.check_keyword(Keyword::Character) && self.peek(1).is_keyword(Keyword::Set))
        {
            if self.match_keyword(Keyword::Character) {
                self.advance();
            }
            let charset = self.parse_name_or_string()?;
            return Ok(Statement::SetNames {
                charset,
                collation: None,
            });
        }
        if self.check_word("PASSWORD") || self.check_word("ROLE") {
            return Err(ParseError::Unsupported("account management".into()));
        }

        // SET [GLOBAL | SESSION] TRANSACTION ...
        let scoped_transaction = (self.check_word("GLOBAL") || self.check_word("SESSION"))
            && self.peek(1).is_word("TRANSACTION");
        if scoped_transaction {
            self.advance();
        }
        if self.match_word("TRANSACTION") {
            self.skip_transaction_options()?;
            return Ok(Statement::SetTransaction);
        }

        let mut assignments = Vec::new();
        loop {
            assignments.push(self.parse_set_assignment()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(Statement::Set(assignments))
    }

    // ISOLATION LEVEL {READ UNCOMMITTED | READ COMMITTED | REPEATABLE READ | SERIALIZABLE}
    // | READ WRITE | READ ONLY, comma separated
    fn skip_transaction_options(&mut self) -> PResult<()> {
        loop {
            if self.match_word("ISOLATION") {
                self.expect_word("LEVEL")?;
                if self.match_word("READ") {
                    if !self.match_word("UNCOMMITTED") {
                        self.expect_word("COMMITTED")?;
                    }
                } else if self.match_word("REPEATABLE") {
                    self.expect_word("READ")?;
                } else {
                    self.expect_word("SERIALIZABLE")?;
                }
            } else if self.match_word("READ") {
                if !self.match_word("WRITE") {
                    self.expect_word("ONLY")?;
                }
            } else {
                return Err(self.error("expected ISOLATION LEVEL or READ WRITE/ONLY"));
            }
            if !self.match_token(TokenType::Comma) {
                return Ok(());
            }
        }
    }

    fn parse_set_assignment(&mut self) -> PResult<SetAssignment> {
        let target = match self.current().token_type.clone() {
            TokenType::UserVariable(name) => {
                self.advance();
                SetTarget::User(name)
            }
            TokenType::SystemVariable { scope, name } => {
                self.advance();
                SetTarget::System { scope, name }
            }
            TokenType::Identifier(word) => {
                let scope = match word.to_ascii_uppercase().as_str() {
                    "GLOBAL" | "PERSIST" | "PERSIST_ONLY" => Some(VariableScope::Global),
                    "SESSION" | "LOCAL" => Some(VariableScope::Session),
                    _ => None,
                };
                if scope.is_some() && matches!(self.peek(1), TokenType::Identifier(_) | TokenType::QuotedIdentifier(_)) {
                    self.advance();
                }
                let name = self.parse_identifier()?;
                SetTarget::System {
                    scope,
                    name: name.to_ascii_lowercase(),
                }
            }
            _ => return Err(self.error("expected a variable name")),
        };

        if !self.match_token(TokenType::Eq) {
            self.expect(TokenType::Assign)?;
        }
        // `SET autocommit = ON`; bare words like OFF arrive as column names
        let value = if self.match_keyword(Keyword::On) {
            Expr::string("ON")
        } else {
            self.parse_expr()?
        };
        Ok(SetAssignment { target, value })
    }

    pub(super) fn parse_describe(&mut self) -> PResult<Statement> {
        let explain = self.check_keyword(Keyword::Explain);
        self.advance();
        if self.check_keyword(Keyword::Select)
            || self.check_keyword(Keyword::Insert)
            || self.check_keyword(Keyword::Update)
            || self.check_keyword(Keyword::Delete)
            || self.check_keyword(Keyword::Replace)
            || self.check_word("FORMAT")
            || self.check_word("ANALYZE")
            || (explain && self.check(&TokenType::LParen))
        {
            return Err(ParseError::Unsupported("EXPLAIN for statements".into()));
        }
        let table = self.parse_object_name()?;
        let column = match self.current().token_type.clone() {
            TokenType::String(pattern) => {
                self.advance();
                Some(pattern)
            }
            TokenType::Identifier(name) | TokenType::QuotedIdentifier(name) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };
        Ok(Statement::Describe { table, column })
    }
}
