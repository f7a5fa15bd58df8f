//! CREATE / ALTER / DROP / RENAME

use super::{PResult, Parser};
use crate::error::ParseError;
use crate::sql::ast::*;
use crate::sql::token::{Keyword, TokenType};
use crate::types::DataType;

impl Parser {
    pub(super) fn parse_create(&mut self) -> PResult<Statement> {
        self.expect_keyword(Keyword::Create)?;

        if self.match_keyword(Keyword::Or) {
            return Err(ParseError::Unsupported("CREATE OR REPLACE".into()));
        }

        let temporary = self.match_word("TEMPORARY");
        if self.match_keyword(Keyword::Table) {
            return Ok(Statement::CreateTable(self.parse_create_table(temporary)?));
        }
        if temporary {
            return Err(self.error("expected TABLE after TEMPORARY"));
        }

        if self.match_keyword(Keyword::Database) || self.match_keyword(Keyword::Schema) {
            return self.parse_create_database();
        }

        let kind = if self.match_keyword(Keyword::Unique) {
            Some(IndexKind::Unique)
        } else if self.match_keyword(Keyword::Fulltext) {
            Some(IndexKind::Fulltext)
        } else if self.match_keyword(Keyword::Spatial) {
            Some(IndexKind::Spatial)
        } else {
            None
        };
        if kind.is_some() || self.check_keyword(Keyword::Index) {
            self.expect_keyword(Keyword::Index)?;
            return self.parse_create_index(kind.unwrap_or(IndexKind::Regular));
        }

        for object in ["VIEW", "TRIGGER", "PROCEDURE", "FUNCTION", "EVENT", "USER", "ROLE", "DEFINER", "ALGORITHM"] {
            if self.check_word(object) {
                return Err(ParseError::Unsupported(format!("CREATE {}", object)));
            }
        }
        Err(self.error("expected TABLE, INDEX or DATABASE after CREATE"))
    }

    fn parse_if_not_exists(&mut self) -> PResult<bool> {
        if self.match_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn parse_if_exists(&mut self) -> PResult<bool> {
        if self.match_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Exists)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn parse_create_table(&mut self, temporary: bool) -> PResult<CreateTableStmt> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_object_name()?;
        let mut stmt = CreateTableStmt {
            name,
            temporary,
            if_not_exists,
            columns: Vec::new(),
            constraints: Vec::new(),
            options: TableOptions::default(),
            like: None,
        };

        // CREATE TABLE t LIKE src / CREATE TABLE t (LIKE src)
        if self.match_keyword(Keyword::Like) {
            stmt.like = Some(self.parse_object_name()?);
            return Ok(stmt);
        }
        if self.check(&TokenType::LParen) && self.peek(1).is_keyword(Keyword::Like) {
            self.advance();
            self.advance();
            stmt.like = Some(self.parse_object_name()?);
            self.expect(TokenType::RParen)?;
            return Ok(stmt);
        }

        if self.check_keyword(Keyword::As)
            || self.check_keyword(Keyword::Select)
            || (self.check(&TokenType::LParen) && self.peek(1).is_keyword(Keyword::Select))
        {
            return Err(ParseError::Unsupported("CREATE TABLE ... AS SELECT".into()));
        }

        self.expect(TokenType::LParen)?;
        loop {
            if self.starts_table_constraint() {
                stmt.constraints.push(self.parse_table_constraint()?);
            } else {
                stmt.columns.push(self.parse_column_def()?);
            }
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RParen)?;

        stmt.options = self.parse_table_options(true)?;

        if self.match_keyword(Keyword::As)
            || self.check_keyword(Keyword::Select)
            || self.check_keyword(Keyword::Ignore)
            || self.check_keyword(Keyword::Replace)
        {
            return Err(ParseError::Unsupported("CREATE TABLE ... AS SELECT".into()));
        }
        if self.check_word("PARTITION") {
            return Err(ParseError::Unsupported("partitioning".into()));
        }
        if stmt.columns.is_empty() {
            return Err(self.error("a table must have at least one column"));
        }
        Ok(stmt)
    }

    fn starts_table_constraint(&self) -> bool {
        matches!(
            self.current().token_type,
            TokenType::Keyword(
                Keyword::Constraint
                    | Keyword::Primary
                    | Keyword::Unique
                    | Keyword::Index
                    | Keyword::Key
                    | Keyword::Fulltext
                    | Keyword::Spatial
                    | Keyword::Foreign
                    | Keyword::Check
            )
        )
    }

    fn parse_create_database(&mut self) -> PResult<Statement> {
        let if_not_exists = self.parse_if_not_exists()?;
        let name = self.parse_identifier()?;
        let mut stmt = CreateDatabaseStmt {
            name,
            if_not_exists,
            charset: None,
            collation: None,
        };
        loop {
            self.match_keyword(Keyword::Default);
            if let Some(charset) = self.parse_charset_clause()? {
                stmt.charset = Some(charset);
            } else if self.match_keyword(Keyword::Collate) {
                self.skip_equals();
                stmt.collation = Some(self.parse_name_or_string()?);
            } else if self.match_word("ENCRYPTION") {
                self.skip_equals();
                self.parse_string()?;
            } else {
                break;
            }
        }
        Ok(Statement::CreateDatabase(stmt))
    }

    fn parse_create_index(&mut self, kind: IndexKind) -> PResult<Statement> {
        let name = self.parse_identifier()?;
        self.skip_index_type()?;
        self.expect_keyword(Keyword::On)?;
        let table = self.parse_object_name()?;
        let parts = self.parse_index_parts()?;
        let (comment, visible) = self.parse_index_options()?;
        self.skip_algorithm_and_lock()?;
        Ok(Statement::CreateIndex(CreateIndexStmt {
            name,
            table,
            kind,
            parts,
            comment,
            visible,
        }))
    }

    // ---- columns --------------------------------------------------------

    pub(super) fn parse_column_def(&mut self) -> PResult<ColumnDef> {
        let name = self.parse_identifier()?;
        let serial = self.check_word("SERIAL");
        let data_type = self.parse_data_type()?;
        let mut column = ColumnDef::new(name, data_type);
        if serial {
            // BIGINT UNSIGNED NOT NULL AUTO_INCREMENT UNIQUE
            column.nullable = Some(false);
            column.auto_increment = true;
            column.unique = true;
        }

        loop {
            if self.match_keyword(Keyword::Not) {
                self.expect_keyword(Keyword::Null)?;
                column.nullable = Some(false);
            } else if self.match_keyword(Keyword::Null) {
                column.nullable = Some(true);
            } else if self.match_keyword(Keyword::Default) {
                column.default = Some(self.parse_default_value()?);
            } else if self.check_keyword(Keyword::On) && self.peek(1).is_keyword(Keyword::Update) {
                self.advance();
                self.advance();
                let expr = self.parse_primary()?;
                if !is_current_timestamp(&expr) {
                    return Err(self.error("ON UPDATE only accepts CURRENT_TIMESTAMP"));
                }
                column.on_update_current_timestamp = true;
            } else if self.match_word("AUTO_INCREMENT") {
                column.auto_increment = true;
            } else if self.match_keyword(Keyword::Unique) {
                self.match_keyword(Keyword::Key);
                column.unique = true;
            } else if self.match_keyword(Keyword::Primary) {
                self.expect_keyword(Keyword::Key)?;
                column.primary_key = true;
            } else if self.match_keyword(Keyword::Key) {
                column.primary_key = true;
            } else if self.match_word("COMMENT") {
                column.comment = Some(self.parse_string()?);
            } else if self.match_keyword(Keyword::Collate) {
                column.data_type.collation = Some(self.parse_name_or_string()?);
            } else if let Some(charset) = self.parse_charset_clause()? {
                column.data_type.charset = Some(charset);
            } else if self.check_keyword(Keyword::Constraint) || self.check_keyword(Keyword::Check) {
                let name = if self.match_keyword(Keyword::Constraint) {
                    self.parse_constraint_name()
                } else {
                    None
                };
                self.expect_keyword(Keyword::Check)?;
                column.check = Some(self.parse_check_body(name)?);
            } else if self.match_keyword(Keyword::References) {
                // Inline REFERENCES is parsed and ignored, as MySQL does
                self.parse_object_name()?;
                self.parse_parenthesized_identifiers()?;
                self.parse_referential_actions()?;
            } else if self.check_word("GENERATED") || self.check_keyword(Keyword::As) {
                return Err(ParseError::Unsupported("generated columns".into()));
            } else if self.match_word("VISIBLE") {
            } else if self.check_word("INVISIBLE") {
                return Err(ParseError::Unsupported("invisible columns".into()));
            } else if self.match_word("COLUMN_FORMAT") || self.match_word("STORAGE") {
                self.match_keyword(Keyword::Default);
                self.match_word("FIXED");
                self.match_word("DYNAMIC");
                self.match_word("DISK");
                self.match_word("MEMORY");
            } else if self.match_word("SRID") {
                self.parse_u32()?;
            } else {
                break;
            }
        }

        Ok(column)
    }

    /// A column default: literal, signed number, `CURRENT_TIMESTAMP[(n)]`,
    /// `NOW()` or a parenthesized expression.
    pub(super) fn parse_default_value(&mut self) -> PResult<Expr> {
        match self.current().token_type {
            TokenType::Minus | TokenType::Plus => self.parse_unary(),
            _ => self.parse_primary(),
        }
    }

    pub(super) fn parse_data_type(&mut self) -> PResult<DataType> {
        let start_error = self.error("expected a data type");
        let mut name = match &self.current().token_type {
            TokenType::Identifier(word) => word.to_ascii_uppercase(),
            TokenType::Keyword(Keyword::Set) => "SET".to_string(),
            TokenType::Keyword(Keyword::Binary) => "BINARY".to_string(),
            TokenType::Keyword(Keyword::Character) => "CHARACTER".to_string(),
            _ => return Err(start_error),
        };
        self.advance();

        // Multi-word spellings
        if name == "NATIONAL" {
            name = match &self.current().token_type {
                TokenType::Identifier(word) => word.to_ascii_uppercase(),
                TokenType::Keyword(Keyword::Character) => "CHARACTER".to_string(),
                _ => return Err(self.error("expected CHAR or VARCHAR after NATIONAL")),
            };
            self.advance();
        }
        let spelled = name.clone();
        match spelled.as_str() {
            "DOUBLE" => {
                self.match_word("PRECISION");
            }
            "CHAR" | "CHARACTER" if self.match_word("VARYING") => name = "VARCHAR".into(),
            "LONG" => {
                if self.match_word("VARCHAR") {
                    name = "LONG VARCHAR".into();
                } else if self.match_word("VARBINARY") {
                    name = "LONG VARBINARY".into();
                }
            }
            _ => {}
        }

        let mut args = Vec::new();
        let mut values = Vec::new();
        if self.match_token(TokenType::LParen) {
            if name == "ENUM" || name == "SET" {
                loop {
                    values.push(self.parse_string()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            } else {
                loop {
                    args.push(self.parse_u32()?);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenType::RParen)?;
        }

        let mut data_type = DataType::from_parts(&name, &args, values)
            .ok_or_else(|| self.error(&format!("invalid type {}", name)))?;

        let mut binary_collation = false;
        loop {
            if self.match_keyword(Keyword::Unsigned) {
                data_type.unsigned = true;
            } else if self.match_word("SIGNED") {
            } else if self.match_keyword(Keyword::Zerofill) {
                let width = if data_type.is_integer() { args.first().copied() } else { None };
                data_type.set_zerofill(width);
            } else if data_type.is_textual() && self.match_keyword(Keyword::Binary) {
                binary_collation = true;
            } else if let Some(charset) = self.parse_charset_clause()? {
                data_type.charset = Some(charset);
            } else if self.check_keyword(Keyword::Collate) && !matches!(self.peek(1), TokenType::Eq) {
                self.advance();
                data_type.collation = Some(self.parse_name_or_string()?);
            } else {
                break;
            }
        }
        if binary_collation && data_type.collation.is_none() {
            let charset = data_type.charset.as_deref().unwrap_or("utf8mb4");
            data_type.collation = Some(format!("{}_bin", charset));
        }

        Ok(data_type)
    }

    /// `CHARACTER SET [=] x`, `CHARSET [=] x`
    fn parse_charset_clause(&mut self) -> PResult<Option<String>> {
        if self.check_keyword(Keyword::Character) && self.peek(1).is_keyword(Keyword::Set) {
            self.advance();
            self.advance();
        } else if !self.match_word("CHARSET") {
            return Ok(None);
        }
        self.skip_equals();
        Ok(Some(self.parse_name_or_string()?))
    }

    // ---- constraints and indexes ---------------------------------------

    fn parse_constraint_name(&mut self) -> Option<String> {
        match &self.current().token_type {
            TokenType::Identifier(_) | TokenType::QuotedIdentifier(_) => self.parse_identifier().ok(),
            _ => None,
        }
    }

    pub(super) fn parse_table_constraint(&mut self) -> PResult<TableConstraint> {
        let constraint_name = if self.match_keyword(Keyword::Constraint) {
            self.parse_constraint_name()
        } else {
            None
        };

        if self.match_keyword(Keyword::Primary) {
            self.expect_keyword(Keyword::Key)?;
            self.skip_index_type()?;
            let parts = self.parse_index_parts()?;
            let (comment, _) = self.parse_index_options()?;
            return Ok(TableConstraint::PrimaryKey { parts, comment });
        }

        if self.match_keyword(Keyword::Unique) {
            if !self.match_keyword(Keyword::Index) {
                self.match_keyword(Keyword::Key);
            }
            return self.parse_index_constraint(constraint_name, IndexKind::Unique);
        }

        if self.match_keyword(Keyword::Foreign) {
            self.expect_keyword(Keyword::Key)?;
            let index_name = self.parse_constraint_name();
            let columns = self.parse_parenthesized_identifiers()?;
            self.expect_keyword(Keyword::References)?;
            let ref_table = self.parse_object_name()?;
            let ref_columns = self.parse_parenthesized_identifiers()?;
            let (on_delete, on_update) = self.parse_referential_actions()?;
            return Ok(TableConstraint::ForeignKey {
                name: constraint_name,
                index_name,
                columns,
                ref_table,
                ref_columns,
                on_delete,
                on_update,
            });
        }

        if self.match_keyword(Keyword::Check) {
            return Ok(TableConstraint::Check(self.parse_check_body(constraint_name)?));
        }

        if constraint_name.is_some() {
            return Err(self.error("expected PRIMARY KEY, UNIQUE, FOREIGN KEY or CHECK after CONSTRAINT"));
        }

        let kind = if self.match_keyword(Keyword::Fulltext) {
            IndexKind::Fulltext
        } else if self.match_keyword(Keyword::Spatial) {
            IndexKind::Spatial
        } else {
            IndexKind::Regular
        };
        if kind == IndexKind::Regular {
            if !self.match_keyword(Keyword::Index) {
                self.expect_keyword(Keyword::Key)?;
            }
        } else if !self.match_keyword(Keyword::Index) {
            self.match_keyword(Keyword::Key);
        }
        self.parse_index_constraint(None, kind)
    }

    fn parse_index_constraint(
        &mut self,
        constraint_name: Option<String>,
        kind: IndexKind,
    ) -> PResult<TableConstraint> {
        let name = if self.check(&TokenType::LParen) || self.check_keyword(Keyword::Using) {
            None
        } else {
            Some(self.parse_identifier()?)
        };
        self.skip_index_type()?;
        let parts = self.parse_index_parts()?;
        let (comment, visible) = self.parse_index_options()?;
        Ok(TableConstraint::Index {
            constraint_name,
            name,
            kind,
            parts,
            comment,
            visible,
        })
    }

    fn parse_check_body(&mut self, name: Option<String>) -> PResult<CheckDef> {
        self.expect(TokenType::LParen)?;
        let expr = self.parse_expr()?;
        self.expect(TokenType::RParen)?;
        let enforced = self.parse_enforcement()?.unwrap_or(true);
        Ok(CheckDef { name, expr, enforced })
    }

    /// `[NOT] ENFORCED`
    fn parse_enforcement(&mut self) -> PResult<Option<bool>> {
        if self.check_keyword(Keyword::Not) && self.peek(1).is_word("ENFORCED") {
            self.advance();
            self.advance();
            return Ok(Some(false));
        }
        if self.match_word("ENFORCED") {
            return Ok(Some(true));
        }
        Ok(None)
    }

    fn parse_referential_actions(&mut self) -> PResult<(ReferentialAction, ReferentialAction)> {
        let mut on_delete = ReferentialAction::NoAction;
        let mut on_update = ReferentialAction::NoAction;
        if self.match_word("MATCH") {
            self.parse_identifier()?;
        }
        while self.match_keyword(Keyword::On) {
            if self.match_keyword(Keyword::Delete) {
                on_delete = self.parse_referential_action()?;
            } else if self.match_keyword(Keyword::Update) {
                on_update = self.parse_referential_action()?;
            } else {
                return Err(self.error("expected DELETE or UPDATE after ON"));
            }
        }
        Ok((on_delete, on_update))
    }

    fn parse_referential_action(&mut self) -> PResult<ReferentialAction> {
        if self.match_keyword(Keyword::Restrict) {
            Ok(ReferentialAction::Restrict)
        } else if self.match_keyword(Keyword::Cascade) {
            Ok(ReferentialAction::Cascade)
        } else if self.match_keyword(Keyword::Set) {
            if self.match_keyword(Keyword::Null) {
                Ok(ReferentialAction::SetNull)
            } else {
                self.expect_keyword(Keyword::Default)?;
                Ok(ReferentialAction::SetDefault)
            }
        } else if self.match_word("NO") {
            self.expect_word("ACTION")?;
            Ok(ReferentialAction::NoAction)
        } else {
            Err(self.error("expected a referential action"))
        }
    }

    fn parse_index_parts(&mut self) -> PResult<Vec<IndexPart>> {
        self.expect(TokenType::LParen)?;
        let mut parts = Vec::new();
        loop {
            if self.check(&TokenType::LParen) {
                return Err(ParseError::Unsupported("functional key parts".into()));
            }
            let column = self.parse_identifier()?;
            let prefix = if self.match_token(TokenType::LParen) {
                let n = self.parse_u32()?;
                self.expect(TokenType::RParen)?;
                Some(n)
            } else {
                None
            };
            let desc = if self.match_keyword(Keyword::Desc) {
                true
            } else {
                self.match_keyword(Keyword::Asc);
                false
            };
            parts.push(IndexPart { column, prefix, desc });
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RParen)?;
        Ok(parts)
    }

    // USING {BTREE | HASH}
    fn skip_index_type(&mut self) -> PResult<()> {
        if self.match_keyword(Keyword::Using) {
            if !self.match_word("BTREE") {
                self.expect_word("HASH")?;
            }
        }
        Ok(())
    }

    /// Trailing index options; returns (comment, visible).
    fn parse_index_options(&mut self) -> PResult<(Option<String>, bool)> {
        let mut comment = None;
        let mut visible = true;
        loop {
            if self.check_keyword(Keyword::Using) {
                self.skip_index_type()?;
            } else if self.match_word("COMMENT") {
                comment = Some(self.parse_string()?);
            } else if self.match_word("VISIBLE") {
                visible = true;
            } else if self.match_word("INVISIBLE") {
                visible = false;
            } else if self.match_word("KEY_BLOCK_SIZE") {
                self.skip_equals();
                self.parse_u64()?;
            } else if self.check_keyword(Keyword::With) && self.peek(1).is_word("PARSER") {
                self.advance();
                self.advance();
                self.parse_identifier()?;
            } else {
                return Ok((comment, visible));
            }
        }
    }

    // ALGORITHM [=] x / LOCK [=] x on index DDL
    fn skip_algorithm_and_lock(&mut self) -> PResult<()> {
        loop {
            if self.match_word("ALGORITHM") || self.match_keyword(Keyword::Lock) {
                self.skip_equals();
                if !self.match_keyword(Keyword::Default) {
                    self.parse_identifier()?;
                }
            } else {
                return Ok(());
            }
        }
    }

    /// Table options; CREATE TABLE allows commas between them, ALTER TABLE
    /// uses commas to separate actions instead.
    fn parse_table_options(&mut self, comma_separated: bool) -> PResult<TableOptions> {
        let mut options = TableOptions::default();
        loop {
            let had_default = self.match_keyword(Keyword::Default);
            if self.match_word("ENGINE") {
                self.skip_equals();
                options.engine = Some(self.parse_name_or_string()?);
            } else if let Some(charset) = self.parse_charset_clause()? {
                options.charset = Some(charset);
            } else if self.match_keyword(Keyword::Collate) {
                self.skip_equals();
                options.collation = Some(self.parse_name_or_string()?);
            } else if self.match_word("COMMENT") {
                self.skip_equals();
                options.comment = Some(self.parse_string()?);
            } else if self.match_word("AUTO_INCREMENT") {
                self.skip_equals();
                options.auto_increment = Some(self.parse_u64()?);
            } else if had_default {
                return Err(self.error("expected CHARACTER SET or COLLATE after DEFAULT"));
            } else if self.starts_ignored_table_option() {
                self.advance();
                self.skip_equals();
                // value: word, number or string
                match self.current().token_type {
                    TokenType::Identifier(_)
                    | TokenType::QuotedIdentifier(_)
                    | TokenType::Number(_)
                    | TokenType::String(_)
                    | TokenType::Keyword(Keyword::Default) => self.advance(),
                    _ => return Err(self.error("expected a table option value")),
                }
            } else {
                return Ok(options);
            }
            if comma_separated {
                self.match_token(TokenType::Comma);
            }
        }
    }

    fn starts_ignored_table_option(&self) -> bool {
        const IGNORED: &[&str] = &[
            "ROW_FORMAT", "KEY_BLOCK_SIZE", "STATS_PERSISTENT", "STATS_AUTO_RECALC",
            "STATS_SAMPLE_PAGES", "PACK_KEYS", "CHECKSUM", "DELAY_KEY_WRITE", "AVG_ROW_LENGTH",
            "MAX_ROWS", "MIN_ROWS", "COMPRESSION", "ENCRYPTION", "INSERT_METHOD", "TABLESPACE",
        ];
        IGNORED.iter().any(|word| self.check_word(word))
    }

    // ---- ALTER ----------------------------------------------------------

    pub(super) fn parse_alter(&mut self) -> PResult<Statement> {
        self.expect_keyword(Keyword::Alter)?;
        if self.match_keyword(Keyword::Database) || self.match_keyword(Keyword::Schema) {
            return Err(ParseError::Unsupported("ALTER DATABASE".into()));
        }
        if !self.match_keyword(Keyword::Table) {
            if self.check_word("VIEW") {
                return Err(ParseError::Unsupported("ALTER VIEW".into()));
            }
            return Err(self.error("expected TABLE after ALTER"));
        }
        let name = self.parse_object_name()?;
        let mut actions = Vec::new();
        loop {
            self.parse_alter_action(&mut actions)?;
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(Statement::AlterTable(AlterTableStmt { name, actions }))
    }

    fn parse_column_position(&mut self) -> PResult<Option<ColumnPosition>> {
        if self.match_word("FIRST") {
            Ok(Some(ColumnPosition::First))
        } else if self.match_word("AFTER") {
            Ok(Some(ColumnPosition::After(self.parse_identifier()?)))
        } else {
            Ok(None)
        }
    }

    fn parse_alter_action(&mut self, actions: &mut Vec<AlterAction>) -> PResult<()> {
        if self.match_keyword(Keyword::Add) {
            if self.starts_table_constraint() {
                actions.push(AlterAction::AddConstraint(self.parse_table_constraint()?));
                return Ok(());
            }
            self.match_keyword(Keyword::Column);
            if self.match_token(TokenType::LParen) {
                loop {
                    let column = self.parse_column_def()?;
                    actions.push(AlterAction::AddColumn { column, position: None });
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
                self.expect(TokenType::RParen)?;
                return Ok(());
            }
            let column = self.parse_column_def()?;
            let position = self.parse_column_position()?;
            actions.push(AlterAction::AddColumn { column, position });
            return Ok(());
        }

        if self.match_keyword(Keyword::Drop) {
            let action = if self.match_keyword(Keyword::Primary) {
                self.expect_keyword(Keyword::Key)?;
                AlterAction::DropPrimaryKey
            } else if self.match_keyword(Keyword::Index) || self.match_keyword(Keyword::Key) {
                AlterAction::DropIndex(self.parse_identifier()?)
            } else if self.match_keyword(Keyword::Foreign) {
                self.expect_keyword(Keyword::Key)?;
                AlterAction::DropForeignKey(self.parse_identifier()?)
            } else if self.match_keyword(Keyword::Check) {
                AlterAction::DropCheck(self.parse_identifier()?)
            } else if self.match_keyword(Keyword::Constraint) {
                AlterAction::DropConstraint(self.parse_identifier()?)
            } else {
                self.match_keyword(Keyword::Column);
                let column = self.parse_identifier()?;
                self.match_keyword(Keyword::Restrict);
                self.match_keyword(Keyword::Cascade);
                AlterAction::DropColumn(column)
            };
            actions.push(action);
            return Ok(());
        }

        if self.match_word("MODIFY") {
            self.match_keyword(Keyword::Column);
            let column = self.parse_column_def()?;
            let position = self.parse_column_position()?;
            actions.push(AlterAction::ModifyColumn { column, position });
            return Ok(());
        }

        if self.match_keyword(Keyword::Change) {
            self.match_keyword(Keyword::Column);
            let old_name = self.parse_identifier()?;
            let column = self.parse_column_def()?;
            let position = self.parse_column_position()?;
            actions.push(AlterAction::ChangeColumn {
                old_name,
                column,
                position,
            });
            return Ok(());
        }

        if self.match_keyword(Keyword::Rename) {
            let action = if self.match_keyword(Keyword::Column) {
                let old_name = self.parse_identifier()?;
                self.expect_keyword(Keyword::To)?;
                AlterAction::RenameColumn {
                    old_name,
                    new_name: self.parse_identifier()?,
                }
            } else if self.match_keyword(Keyword::Index) || self.match_keyword(Keyword::Key) {
                let old_name = self.parse_identifier()?;
                self.expect_keyword(Keyword::To)?;
                AlterAction::RenameIndex {
                    old_name,
                    new_name: self.parse_identifier()?,
                }
            } else {
                if !self.match_keyword(Keyword::To) {
                    self.match_keyword(Keyword::As);
                }
                AlterAction::RenameTable(self.parse_object_name()?)
            };
            actions.push(action);
            return Ok(());
        }

        if self.match_keyword(Keyword::Alter) {
            if self.match_keyword(Keyword::Index) {
                let name = self.parse_identifier()?;
                let visible = if self.match_word("VISIBLE") {
                    true
                } else {
                    self.expect_word("INVISIBLE")?;
                    false
                };
                actions.push(AlterAction::IndexVisibility { name, visible });
                return Ok(());
            }
            if self.match_keyword(Keyword::Check) || self.match_keyword(Keyword::Constraint) {
                let name = self.parse_identifier()?;
                let enforced = self
                    .parse_enforcement()?
                    .ok_or_else(|| self.error("expected [NOT] ENFORCED"))?;
                actions.push(AlterAction::CheckEnforcement { name, enforced });
                return Ok(());
            }
            self.match_keyword(Keyword::Column);
            let column = self.parse_identifier()?;
            if self.match_keyword(Keyword::Set) {
                if self.check_word("VISIBLE") || self.check_word("INVISIBLE") {
                    return Err(ParseError::Unsupported("invisible columns".into()));
                }
                self.expect_keyword(Keyword::Default)?;
                let default = self.parse_default_value()?;
                actions.push(AlterAction::SetDefault { column, default });
            } else {
                self.expect_keyword(Keyword::Drop)?;
                self.expect_keyword(Keyword::Default)?;
                actions.push(AlterAction::DropDefault(column));
            }
            return Ok(());
        }

        if self.match_keyword(Keyword::Convert) {
            self.expect_keyword(Keyword::To)?;
            let charset = self
                .parse_charset_clause()?
                .ok_or_else(|| self.error("expected CHARACTER SET"))?;
            let collation = if self.match_keyword(Keyword::Collate) {
                Some(self.parse_name_or_string()?)
            } else {
                None
            };
            actions.push(AlterAction::ConvertCharset { charset, collation });
            return Ok(());
        }

        // ALGORITHM / LOCK / FORCE change nothing observable
        if self.check_word("ALGORITHM") || self.check_keyword(Keyword::Lock) {
            return self.skip_algorithm_and_lock();
        }
        if self.match_keyword(Keyword::Force) {
            return Ok(());
        }
        if self.check_keyword(Keyword::Order) {
            return Err(ParseError::Unsupported("ALTER TABLE ... ORDER BY".into()));
        }
        if self.check_word("PARTITION") || self.check_word("DISCARD") || self.check_word("IMPORT") {
            return Err(ParseError::Unsupported("partition and tablespace operations".into()));
        }

        let options = self.parse_table_options(false)?;
        if options.is_empty() {
            return Err(self.error("expected an ALTER TABLE specification"));
        }
        actions.push(AlterAction::Options(options));
        Ok(())
    }

    // ---- DROP / RENAME --------------------------------------------------

    pub(super) fn parse_drop(&mut self) -> PResult<Statement> {
        self.expect_keyword(Keyword::Drop)?;

        let temporary = self.match_word("TEMPORARY");
        if self.match_keyword(Keyword::Table) || self.match_word("TABLES") {
            let if_exists = self.parse_if_exists()?;
            let mut names = vec![self.parse_object_name()?];
            while self.match_token(TokenType::Comma) {
                names.push(self.parse_object_name()?);
            }
            if !self.match_keyword(Keyword::Restrict) {
                self.match_keyword(Keyword::Cascade);
            }
            return Ok(Statement::DropTable(DropTableStmt {
                names,
                if_exists,
                temporary,
            }));
        }
        if temporary {
            return Err(self.error("expected TABLE after TEMPORARY"));
        }

        if self.match_keyword(Keyword::Index) {
            let name = self.parse_identifier()?;
            self.expect_keyword(Keyword::On)?;
            let table = self.parse_object_name()?;
            self.skip_algorithm_and_lock()?;
            return Ok(Statement::DropIndex { name, table });
        }

        if self.match_keyword(Keyword::Database) || self.match_keyword(Keyword::Schema) {
            let if_exists = self.parse_if_exists()?;
            let name = self.parse_identifier()?;
            return Ok(Statement::DropDatabase { name, if_exists });
        }

        for object in ["VIEW", "TRIGGER", "PROCEDURE", "FUNCTION", "EVENT", "USER", "ROLE"] {
            if self.check_word(object) {
                return Err(ParseError::Unsupported(format!("DROP {}", object)));
            }
        }
        Err(self.error("expected TABLE, INDEX or DATABASE after DROP"))
    }

    pub(super) fn parse_rename(&mut self) -> PResult<Statement> {
        self.expect_keyword(Keyword::Rename)?;
        if !self.match_keyword(Keyword::Table) {
            self.expect_word("TABLES")?;
        }
        let mut pairs = Vec::new();
        loop {
            let from = self.parse_object_name()?;
            self.expect_keyword(Keyword::To)?;
            let to = self.parse_object_name()?;
            pairs.push((from, to));
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(Statement::RenameTable(pairs))
    }
}

fn is_current_timestamp(expr: &Expr) -> bool {
    matches!(expr, Expr::Function { name, .. } if name == "NOW")
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_sql;
    use super::*;
    use crate::types::TypeKind;

    fn create(sql: &str) -> CreateTableStmt {
        match parse_sql(sql).unwrap() {
            Statement::CreateTable(stmt) => stmt,
            other => panic!("expected CREATE TABLE, got {:?}", other),
        }
    }

    fn alter(sql: &str) -> Vec<AlterAction> {
        match parse_sql(sql).unwrap() {
            Statement::AlterTable(stmt) => stmt.actions,
            other => panic!("expected ALTER TABLE, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_create_table() {
        let stmt = create(
            "CREATE TABLE IF NOT EXISTS `users` (
                id INT UNSIGNED NOT NULL AUTO_INCREMENT,
                email VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
                active TINYINT(1) NOT NULL DEFAULT '1',
                balance DECIMAL(10,2) DEFAULT -1.50,
                updated_at TIMESTAMP NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
                PRIMARY KEY (id),
                UNIQUE KEY uq_email (email(100)),
                KEY idx_active (active DESC)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COMMENT='people'",
        );
        assert!(stmt.if_not_exists);
        assert_eq!(stmt.columns.len(), 5);
        assert_eq!(stmt.constraints.len(), 3);

        let id = &stmt.columns[0];
        assert!(id.auto_increment);
        assert!(id.data_type.unsigned);
        assert_eq!(id.nullable, Some(false));

        let email = &stmt.columns[1];
        assert_eq!(email.data_type.collation.as_deref(), Some("utf8mb4_bin"));
        assert_eq!(email.data_type.length, Some(255));

        assert_eq!(stmt.columns[2].data_type.column_type(), "tinyint(1)");
        assert!(matches!(stmt.columns[3].default, Some(Expr::Unary { op: UnaryOperator::Minus, .. })));
        assert!(stmt.columns[4].on_update_current_timestamp);

        match &stmt.constraints[1] {
            TableConstraint::Index { name, kind, parts, .. } => {
                assert_eq!(name.as_deref(), Some("uq_email"));
                assert_eq!(*kind, IndexKind::Unique);
                assert_eq!(parts[0].prefix, Some(100));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(&stmt.constraints[2], TableConstraint::Index { parts, .. } if parts[0].desc));

        assert_eq!(stmt.options.engine.as_deref(), Some("InnoDB"));
        assert_eq!(stmt.options.charset.as_deref(), Some("utf8mb4"));
        assert_eq!(stmt.options.comment.as_deref(), Some("people"));
    }

    #[test]
    fn test_parse_foreign_key_and_check() {
        let stmt = create(
            "CREATE TABLE orders (
                id INT PRIMARY KEY,
                user_id INT,
                qty INT CHECK (qty > 0),
                CONSTRAINT fk_user FOREIGN KEY (user_id) REFERENCES users (id)
                    ON DELETE CASCADE ON UPDATE SET NULL,
                CONSTRAINT qty_cap CHECK (qty < 100) NOT ENFORCED
            )",
        );
        assert!(stmt.columns[0].primary_key);
        assert!(stmt.columns[2].check.is_some());
        match &stmt.constraints[0] {
            TableConstraint::ForeignKey {
                name,
                on_delete,
                on_update,
                ref_table,
                ..
            } => {
                assert_eq!(name.as_deref(), Some("fk_user"));
                assert_eq!(*on_delete, ReferentialAction::Cascade);
                assert_eq!(*on_update, ReferentialAction::SetNull);
                assert_eq!(ref_table.name, "users");
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmt.constraints[1] {
            TableConstraint::Check(check) => {
                assert_eq!(check.name.as_deref(), Some("qty_cap"));
                assert!(!check.enforced);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_type_spellings() {
        let stmt = create(
            "CREATE TABLE t (a BOOL, b DOUBLE PRECISION, c ENUM('x','y'), d SET('p'), e INT(4) ZEROFILL,
             f NATIONAL VARCHAR(10), g SERIAL, h DATETIME(3), i CHAR(4) BINARY)",
        );
        let types: Vec<String> = stmt.columns.iter().map(|c| c.data_type.column_type()).collect();
        assert_eq!(types[0], "tinyint(1)");
        assert_eq!(stmt.columns[1].data_type.kind, TypeKind::Double);
        assert_eq!(types[2], "enum('x','y')");
        assert_eq!(stmt.columns[3].data_type.kind, TypeKind::Set);
        assert_eq!(types[4], "int(4) unsigned zerofill");
        assert_eq!(stmt.columns[5].data_type.kind, TypeKind::VarChar);
        assert_eq!(types[6], "bigint unsigned");
        assert_eq!(types[7], "datetime(3)");
        assert_eq!(stmt.columns[8].data_type.collation.as_deref(), Some("utf8mb4_bin"));

        assert!(parse_sql("CREATE TABLE t (a VARCHAR)").is_err());
        assert!(parse_sql("CREATE TABLE t (a FOO)").is_err());
    }

    #[test]
    fn test_create_like_and_unsupported() {
        let stmt = create("CREATE TEMPORARY TABLE t2 LIKE t1");
        assert!(stmt.temporary);
        assert_eq!(stmt.like, Some(ObjectName::bare("t1")));

        assert!(matches!(
            parse_sql("CREATE TABLE t AS SELECT 1").unwrap_err(),
            ParseError::Unsupported(_)
        ));
        assert!(matches!(
            parse_sql("CREATE VIEW v AS SELECT 1").unwrap_err(),
            ParseError::Unsupported(_)
        ));
        assert!(matches!(
            parse_sql("CREATE TABLE t (a INT, b INT GENERATED ALWAYS AS (a + 1))").unwrap_err(),
            ParseError::Unsupported(_)
        ));
    }

    #[test]
    fn test_parse_alter_actions() {
        let actions = alter(
            "ALTER TABLE t ADD COLUMN c INT NOT NULL AFTER b, DROP PRIMARY KEY, DROP INDEX idx,
             DROP FOREIGN KEY fk1, MODIFY name VARCHAR(20) FIRST, CHANGE old new_col TEXT,
             RENAME COLUMN a TO z, RENAME INDEX i1 TO i2, ALTER COLUMN d SET DEFAULT 5,
             ALTER COLUMN e DROP DEFAULT, ALTER INDEX i3 INVISIBLE, ALTER CHECK c1 NOT ENFORCED,
             ADD UNIQUE (x), ALGORITHM=INPLACE, ENGINE=InnoDB",
        );
        assert_eq!(actions.len(), 14);
        assert!(matches!(
            &actions[0],
            AlterAction::AddColumn { position: Some(ColumnPosition::After(col)), .. } if col == "b"
        ));
        assert_eq!(actions[1], AlterAction::DropPrimaryKey);
        assert_eq!(actions[2], AlterAction::DropIndex("idx".into()));
        assert_eq!(actions[3], AlterAction::DropForeignKey("fk1".into()));
        assert!(matches!(
            &actions[4],
            AlterAction::ModifyColumn { position: Some(ColumnPosition::First), .. }
        ));
        assert!(matches!(&actions[5], AlterAction::ChangeColumn { old_name, .. } if old_name == "old"));
        assert!(matches!(&actions[10], AlterAction::IndexVisibility { visible: false, .. }));
        assert!(matches!(&actions[11], AlterAction::CheckEnforcement { enforced: false, .. }));
        assert!(matches!(&actions[12], AlterAction::AddConstraint(TableConstraint::Index { .. })));
        assert!(matches!(&actions[13], AlterAction::Options(o) if o.engine.as_deref() == Some("InnoDB")));
    }

    #[test]
    fn test_parse_drop_and_rename() {
        assert_eq!(
            parse_sql("DROP TABLE IF EXISTS a, db.b").unwrap(),
            Statement::DropTable(DropTableStmt {
                names: vec![ObjectName::bare("a"), ObjectName::qualified("db", "b")],
                if_exists: true,
                temporary: false,
            })
        );
        assert_eq!(
            parse_sql("DROP INDEX idx ON t").unwrap(),
            Statement::DropIndex {
                name: "idx".into(),
                table: ObjectName::bare("t")
            }
        );
        assert_eq!(
            parse_sql("RENAME TABLE a TO b, c TO d").unwrap(),
            Statement::RenameTable(vec![
                (ObjectName::bare("a"), ObjectName::bare("b")),
                (ObjectName::bare("c"), ObjectName::bare("d")),
            ])
        );
        assert_eq!(
            parse_sql("DROP DATABASE IF EXISTS shop").unwrap(),
            Statement::DropDatabase {
                name: "shop".into(),
                if_exists: true
            }
        );
    }

    #[test]
    fn test_create_index_and_database() {
        match parse_sql("CREATE UNIQUE INDEX ix ON t (a, b(5) DESC) COMMENT 'c'").unwrap() {
            Statement::CreateIndex(stmt) => {
                assert_eq!(stmt.kind, IndexKind::Unique);
                assert_eq!(stmt.parts.len(), 2);
                assert_eq!(stmt.comment.as_deref(), Some("c"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_sql("CREATE DATABASE IF NOT EXISTS shop DEFAULT CHARACTER SET utf8mb4 COLLATE utf8mb4_bin").unwrap() {
            Statement::CreateDatabase(stmt) => {
                assert!(stmt.if_not_exists);
                assert_eq!(stmt.charset.as_deref(), Some("utf8mb4"));
                assert_eq!(stmt.collation.as_deref(), Some("utf8mb4_bin"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
