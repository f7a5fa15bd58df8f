//! INSERT / REPLACE / UPDATE / DELETE

use super::{PResult, Parser};
use crate::error::ParseError;
use crate::sql::ast::*;
use crate::sql::token::{Keyword, TokenType};

impl Parser {
    pub(super) fn parse_insert(&mut self) -> PResult<InsertStmt> {
        let replace = self.match_keyword(Keyword::Replace);
        if !replace {
            self.expect_keyword(Keyword::Insert)?;
        }
        let _ = self.match_word("LOW_PRIORITY") || self.match_word("DELAYED") || self.match_word("HIGH_PRIORITY");
        let ignore = self.match_keyword(Keyword::Ignore);
        self.match_keyword(Keyword::Into);
        let table = self.parse_object_name()?;
        if self.check_word("PARTITION") {
            return Err(ParseError::Unsupported("PARTITION selection".into()));
        }

        let mut columns = Vec::new();
        let source;

        if self.match_keyword(Keyword::Set) {
            let mut row = Vec::new();
            loop {
                let assignment = self.parse_assignment()?;
                columns.push(assignment.column.column);
                row.push(assignment.value);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            source = InsertSource::Values(vec![row]);
        } else {
            let starts_query = |p: &Parser| {
                p.check_keyword(Keyword::Select)
                    || (p.check(&TokenType::LParen) && p.peek(1).is_keyword(Keyword::Select))
            };
            if self.check(&TokenType::LParen) && !starts_query(self) {
                self.advance();
                if !self.check(&TokenType::RParen) {
                    columns = self.parse_identifier_list()?;
                }
                self.expect(TokenType::RParen)?;
            }

            if self.match_keyword(Keyword::Values) || self.match_word("VALUE") {
                let mut rows = Vec::new();
                loop {
                    // ROW(...) constructor is accepted as a plain row
                    self.match_word("ROW");
                    self.expect(TokenType::LParen)?;
                    let row = if self.check(&TokenType::RParen) {
                        Vec::new()
                    } else {
                        self.parse_expr_list()?
                    };
                    self.expect(TokenType::RParen)?;
                    rows.push(row);
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
                source = InsertSource::Values(rows);
            } else if starts_query(self) {
                source = InsertSource::Select(Box::new(self.parse_query()?));
            } else if self.check_keyword(Keyword::Table) || self.check_keyword(Keyword::With) {
                return Err(ParseError::Unsupported("INSERT ... TABLE / WITH".into()));
            } else {
                return Err(self.error("expected VALUES, SELECT or SET"));
            }
        }

        if self.check_keyword(Keyword::As) {
            return Err(ParseError::Unsupported("row alias in INSERT".into()));
        }

        let mut on_duplicate = Vec::new();
        if self.match_keyword(Keyword::On) {
            self.expect_word("DUPLICATE")?;
            self.expect_keyword(Keyword::Key)?;
            self.expect_keyword(Keyword::Update)?;
            if replace {
                return Err(self.error("REPLACE does not accept ON DUPLICATE KEY UPDATE"));
            }
            on_duplicate = self.parse_assignments()?;
        }

        Ok(InsertStmt {
            table,
            columns,
            source,
            ignore,
            replace,
            on_duplicate,
        })
    }

    pub(super) fn parse_update(&mut self) -> PResult<UpdateStmt> {
        self.expect_keyword(Keyword::Update)?;
        self.match_word("LOW_PRIORITY");
        let ignore = self.match_keyword(Keyword::Ignore);
        let tables = self.parse_table_refs()?;
        self.expect_keyword(Keyword::Set)?;
        let assignments = self.parse_assignments()?;

        let where_clause = if self.match_keyword(Keyword::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        let (order_by, limit) = self.parse_order_and_limit()?;
        let multi_table = tables.len() > 1 || matches!(tables[0], TableRef::Join { .. });
        if multi_table && (!order_by.is_empty() || limit.is_some()) {
            return Err(self.error("incorrect usage of UPDATE and ORDER BY / LIMIT"));
        }

        Ok(UpdateStmt {
            tables,
            assignments,
            where_clause,
            order_by,
            limit,
            ignore,
        })
    }

    pub(super) fn parse_delete(&mut self) -> PResult<DeleteStmt> {
        self.expect_keyword(Keyword::Delete)?;
        loop {
            if !(self.match_word("LOW_PRIORITY") || self.match_word("QUICK")) {
                break;
            }
        }
        let ignore = self.match_keyword(Keyword::Ignore);

        let mut stmt = DeleteStmt {
            targets: Vec::new(),
            from: Vec::new(),
            where_clause: None,
            order_by: Vec::new(),
            limit: None,
            ignore,
        };

        if self.match_keyword(Keyword::From) {
            let first = self.parse_delete_target()?;
            if self.check(&TokenType::Comma) || self.check_keyword(Keyword::Using) {
                // DELETE FROM t1, t2 USING <table refs>
                stmt.targets.push(first);
                while self.match_token(TokenType::Comma) {
                    stmt.targets.push(self.parse_delete_target()?);
                }
                self.expect_keyword(Keyword::Using)?;
                stmt.from = self.parse_table_refs()?;
            } else {
                let alias = if self.match_keyword(Keyword::As) {
                    Some(self.parse_identifier()?)
                } else {
                    self.parse_optional_alias()
                };
                stmt.from = vec![TableRef::Table { name: first, alias }];
            }
        } else {
            // DELETE t1, t2 FROM <table refs>
            loop {
                stmt.targets.push(self.parse_delete_target()?);
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            self.expect_keyword(Keyword::From)?;
            stmt.from = self.parse_table_refs()?;
        }

        if self.match_keyword(Keyword::Where) {
            stmt.where_clause = Some(self.parse_expr()?);
        }
        let (order_by, limit) = self.parse_order_and_limit()?;
        if !stmt.targets.is_empty() && (!order_by.is_empty() || limit.is_some()) {
            return Err(self.error("incorrect usage of DELETE and ORDER BY / LIMIT"));
        }
        stmt.order_by = order_by;
        stmt.limit = limit;
        Ok(stmt)
    }

    /// `t`, `db.t`, optionally followed by `.*`
    fn parse_delete_target(&mut self) -> PResult<ObjectName> {
        let name = self.parse_object_name()?;
        if self.check(&TokenType::Dot) && *self.peek(1) == TokenType::Star {
            self.advance();
            self.advance();
        }
        Ok(name)
    }

    fn parse_order_and_limit(&mut self) -> PResult<(Vec<OrderByExpr>, Option<Limit>)> {
        let order_by = if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            self.parse_order_by_list()?
        } else {
            Vec::new()
        };
        let limit = if self.match_keyword(Keyword::Limit) {
            let limit = self.parse_limit()?;
            if limit.offset.is_some() {
                return Err(self.error("LIMIT with an offset is not allowed here"));
            }
            Some(limit)
        } else {
            None
        };
        Ok((order_by, limit))
    }

    fn parse_assignments(&mut self) -> PResult<Vec<Assignment>> {
        let mut assignments = vec![self.parse_assignment()?];
        while self.match_token(TokenType::Comma) {
            assignments.push(self.parse_assignment()?);
        }
        Ok(assignments)
    }

    /// `col = expr`, `t.col = expr`, `db.t.col = expr`
    fn parse_assignment(&mut self) -> PResult<Assignment> {
        let first = self.parse_identifier()?;
        let column = if self.match_token(TokenType::Dot) {
            let second = self.parse_identifier()?;
            if self.match_token(TokenType::Dot) {
                ColumnRef {
                    database: Some(first),
                    table: Some(second),
                    column: self.parse_identifier()?,
                }
            } else {
                ColumnRef {
                    database: None,
                    table: Some(first),
                    column: second,
                }
            }
        } else {
            ColumnRef::bare(first)
        };
        if !self.match_token(TokenType::Eq) {
            self.expect(TokenType::Assign)?;
        }
        let value = self.parse_expr()?;
        Ok(Assignment { column, value })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_sql;
    use super::*;

    fn insert(sql: &str) -> InsertStmt {
        match parse_sql(sql).unwrap() {
            Statement::Insert(stmt) => stmt,
            other => panic!("expected INSERT, got {:?}", other),
        }
    }

    fn delete(sql: &str) -> DeleteStmt {
        match parse_sql(sql).unwrap() {
            Statement::Delete(stmt) => stmt,
            other => panic!("expected DELETE, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_values() {
        let stmt = insert("INSERT INTO users (id, name) VALUES (1, 'a'), (2, DEFAULT)");
        assert_eq!(stmt.columns, vec!["id", "name"]);
        match stmt.source {
            InsertSource::Values(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1][1], Expr::Default);
            }
            _ => panic!("expected VALUES"),
        }
        assert!(!stmt.ignore && !stmt.replace);
    }

    #[test]
    fn test_parse_insert_variants() {
        let stmt = insert("INSERT IGNORE t SET a = 1, b = 'x'");
        assert!(stmt.ignore);
        assert_eq!(stmt.columns, vec!["a", "b"]);

        let stmt = insert("REPLACE INTO t VALUE (1)");
        assert!(stmt.replace);

        let stmt = insert("INSERT INTO t (a) SELECT x FROM u WHERE y > 1");
        assert!(matches!(stmt.source, InsertSource::Select(_)));

        let stmt = insert("INSERT INTO t VALUES ()");
        assert!(matches!(&stmt.source, InsertSource::Values(rows) if rows[0].is_empty()));

        let stmt = insert("INSERT INTO t (a, b) VALUES (1, 2) ON DUPLICATE KEY UPDATE b = VALUES(b) + 1");
        assert_eq!(stmt.on_duplicate.len(), 1);
        assert!(matches!(
            &stmt.on_duplicate[0].value,
            Expr::Binary { left, .. } if **left == Expr::InsertedValue("b".into())
        ));
    }

    #[test]
    fn test_parse_update() {
        match parse_sql("UPDATE t SET a = a + 1, t.b = NULL WHERE id = 3 ORDER BY id DESC LIMIT 2").unwrap() {
            Statement::Update(stmt) => {
                assert_eq!(stmt.assignments.len(), 2);
                assert_eq!(stmt.assignments[1].column.table.as_deref(), Some("t"));
                assert!(stmt.where_clause.is_some());
                assert_eq!(stmt.order_by.len(), 1);
                assert!(stmt.limit.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_sql("UPDATE a JOIN b ON a.id = b.id SET a.x = b.y").unwrap() {
            Statement::Update(stmt) => assert!(matches!(stmt.tables[0], TableRef::Join { .. })),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse_sql("UPDATE a, b SET a.x = 1 LIMIT 1").is_err());
    }

    #[test]
    fn test_parse_delete_forms() {
        let stmt = delete("DELETE FROM t WHERE id > 5 ORDER BY id LIMIT 10");
        assert!(stmt.targets.is_empty());
        assert_eq!(stmt.from.len(), 1);
        assert!(stmt.limit.is_some());

        let stmt = delete("DELETE a, b FROM a JOIN b ON a.id = b.a_id WHERE a.x = 1");
        assert_eq!(stmt.targets, vec![ObjectName::bare("a"), ObjectName::bare("b")]);
        assert!(matches!(stmt.from[0], TableRef::Join { .. }));

        let stmt = delete("DELETE FROM a.* USING a, b WHERE a.id = b.id");
        assert_eq!(stmt.targets, vec![ObjectName::bare("a")]);
        assert_eq!(stmt.from.len(), 2);

        assert!(parse_sql("DELETE a FROM a, b LIMIT 1").is_err());
    }
}
