//! Expressions and SELECT queries
//!
//! Precedence climbing follows MySQL's operator table: OR/||, XOR, AND/&&,
//! NOT, comparison predicates, |, &, shifts, additive, multiplicative, ^,
//! unary operators, COLLATE.

use super::{PResult, Parser};
use crate::error::ParseError;
use crate::sql::ast::*;
use crate::sql::token::{Keyword, TokenType};

impl Parser {
    // ---- queries --------------------------------------------------------

    pub(crate) fn parse_query(&mut self) -> PResult<Query> {
        let first = self.parse_query_term()?;
        let mut query = match first {
            QueryTerm::Select(select) => Query::simple(select),
            QueryTerm::Parenthesized(inner) => inner,
        };

        while self.match_keyword(Keyword::Union) {
            let all = if self.match_keyword(Keyword::All) {
                true
            } else {
                self.match_keyword(Keyword::Distinct);
                false
            };
            let select = match self.parse_query_term()? {
                QueryTerm::Select(select) => select,
                QueryTerm::Parenthesized(inner) => {
                    if !inner.unions.is_empty() || !inner.order_by.is_empty() || inner.limit.is_some() {
                        return Err(ParseError::Unsupported(
                            "ORDER BY or LIMIT inside a UNION operand".into(),
                        ));
                    }
                    *inner.select
                }
            };
            query.unions.push(UnionPart { all, select });
        }

        if self.match_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            query.order_by = self.parse_order_by_list()?;
        }
        if self.match_keyword(Keyword::Limit) {
            query.limit = Some(self.parse_limit()?);
        }
        self.skip_locking_clause()?;
        Ok(query)
    }

    fn parse_query_term(&mut self) -> PResult<QueryTerm> {
        if self.match_token(TokenType::LParen) {
            let inner = self.parse_query()?;
            self.expect(TokenType::RParen)?;
            return Ok(QueryTerm::Parenthesized(inner));
        }
        Ok(QueryTerm::Select(self.parse_select_body()?))
    }

    // FOR UPDATE / FOR SHARE / LOCK IN SHARE MODE are accepted and ignored
    fn skip_locking_clause(&mut self) -> PResult<()> {
        loop {
            if self.match_keyword(Keyword::For) {
                if !self.match_keyword(Keyword::Update) {
                    self.expect_word("SHARE")?;
                }
                if self.match_word("OF") {
                    self.parse_identifier_list()?;
                }
                if !self.match_word("NOWAIT") && self.match_word("SKIP") {
                    self.expect_word("LOCKED")?;
                }
            } else if self.check_keyword(Keyword::Lock) && self.peek(1).is_keyword(Keyword::In) {
                self.advance();
                self.advance();
                self.expect_word("SHARE")?;
                self.expect_word("MODE")?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_select_body(&mut self) -> PResult<SelectStmt> {
        self.expect_keyword(Keyword::Select)?;
        let mut select = SelectStmt::default();

        loop {
            if self.match_keyword(Keyword::Distinct) || self.match_word("DISTINCTROW") {
                select.distinct = true;
            } else if self.match_keyword(Keyword::All) || self.match_keyword(Keyword::StraightJoin) {
            } else if self.match_word("SQL_CALC_FOUND_ROWS") {
                select.calc_found_rows = true;
            } else if self.match_word("HIGH_PRIORITY")
                || self.match_word("SQL_NO_CACHE")
                || self.match_word("SQL_CACHE")
                || self.match_word("SQL_SMALL_RESULT")
                || self.match_word("SQL_BIG_RESULT")
                || self.match_word("SQL_BUFFER_RESULT")
            {
            } else {
                break;
            }
        }

        select.columns = self.parse_select_items()?;

        if self.match_keyword(Keyword::Into) {
            return Err(ParseError::Unsupported("SELECT ... INTO".into()));
        }

        if self.match_keyword(Keyword::From) {
            if !self.match_word("DUAL") {
                select.from = self.parse_table_refs()?;
            }
        }

        if self.match_keyword(Keyword::Where) {
            select.where_clause = Some(self.parse_expr()?);
        }

        if self.match_keyword(Keyword::Group) {
            self.expect_keyword(Keyword::By)?;
            loop {
                select.group_by.push(self.parse_expr()?);
                // ASC/DESC after GROUP BY items is accepted for old syntax
                if !self.match_keyword(Keyword::Asc) {
                    self.match_keyword(Keyword::Desc);
                }
                if !self.match_token(TokenType::Comma) {
                    break;
                }
            }
            if self.check_keyword(Keyword::With) && self.peek(1).is_word("ROLLUP") {
                return Err(ParseError::Unsupported("WITH ROLLUP".into()));
            }
        }

        if self.match_keyword(Keyword::Having) {
            select.having = Some(self.parse_expr()?);
        }

        Ok(select)
    }

    fn parse_select_items(&mut self) -> PResult<Vec<SelectItem>> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_select_item()?);
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_select_item(&mut self) -> PResult<SelectItem> {
        if self.match_token(TokenType::Star) {
            return Ok(SelectItem::Wildcard);
        }

        // t.* and db.t.*
        let is_name = |t: &TokenType| matches!(t, TokenType::Identifier(_) | TokenType::QuotedIdentifier(_));
        if is_name(self.peek(0)) && *self.peek(1) == TokenType::Dot {
            if *self.peek(2) == TokenType::Star {
                let table = self.parse_identifier()?;
                self.advance();
                self.advance();
                return Ok(SelectItem::QualifiedWildcard(ObjectName::bare(table)));
            }
            if is_name(self.peek(2)) && *self.peek(3) == TokenType::Dot && *self.peek(4) == TokenType::Star {
                let db = self.parse_identifier()?;
                self.advance();
                let table = self.parse_identifier()?;
                self.advance();
                self.advance();
                return Ok(SelectItem::QualifiedWildcard(ObjectName::qualified(db, table)));
            }
        }

        let start = self.current().start;
        let expr = self.parse_expr()?;
        let text = self.source_text(start, self.previous_end());

        let alias = if self.match_keyword(Keyword::As) {
            Some(self.parse_name_or_string()?)
        } else if let TokenType::String(s) = &self.current().token_type {
            let s = s.clone();
            self.advance();
            Some(s)
        } else {
            self.parse_optional_alias()
        };

        Ok(SelectItem::Expr { expr, alias, text })
    }

    pub(crate) fn parse_table_refs(&mut self) -> PResult<Vec<TableRef>> {
        let mut refs = vec![self.parse_joined_table()?];
        while self.match_token(TokenType::Comma) {
            refs.push(self.parse_joined_table()?);
        }
        Ok(refs)
    }

    pub(crate) fn parse_joined_table(&mut self) -> PResult<TableRef> {
        let mut left = self.parse_table_factor()?;

        loop {
            let natural = self.match_keyword(Keyword::Natural);
            let kind = if self.match_keyword(Keyword::Join) {
                JoinKind::Inner
            } else if self.match_keyword(Keyword::Inner) {
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Inner
            } else if self.match_keyword(Keyword::Cross) {
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Cross
            } else if self.match_keyword(Keyword::StraightJoin) {
                JoinKind::Straight
            } else if self.match_keyword(Keyword::Left) {
                self.match_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Left
            } else if self.match_keyword(Keyword::Right) {
                self.match_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Right
            } else if natural {
                return Err(self.error("expected JOIN after NATURAL"));
            } else {
                break;
            };

            let right = self.parse_table_factor()?;
            let constraint = if natural {
                JoinConstraint::Natural
            } else if self.match_keyword(Keyword::On) {
                JoinConstraint::On(self.parse_expr()?)
            } else if self.match_keyword(Keyword::Using) {
                JoinConstraint::Using(self.parse_parenthesized_identifiers()?)
            } else {
                JoinConstraint::None
            };

            left = TableRef::Join {
                left: Box::new(left),
                right: Box::new(right),
                kind,
                constraint,
            };
        }

        Ok(left)
    }

    fn parse_table_factor(&mut self) -> PResult<TableRef> {
        if self.check(&TokenType::LParen) {
            if self.peek(1).is_keyword(Keyword::Select) || *self.peek(1) == TokenType::LParen {
                self.advance();
                let query = self.parse_query()?;
                self.expect(TokenType::RParen)?;
                self.match_keyword(Keyword::As);
                let alias = self
                    .parse_optional_alias()
                    .ok_or_else(|| self.error("every derived table must have its own alias"))?;
                return Ok(TableRef::Derived {
                    query: Box::new(query),
                    alias,
                });
            }
            self.advance();
            let inner = self.parse_joined_table()?;
            self.expect(TokenType::RParen)?;
            return Ok(inner);
        }

        let name = self.parse_object_name()?;
        let alias = if self.match_keyword(Keyword::As) {
            Some(self.parse_identifier()?)
        } else {
            self.parse_optional_alias()
        };
        self.skip_index_hints()?;
        Ok(TableRef::Table { name, alias })
    }

    // USE|FORCE|IGNORE {INDEX|KEY} [FOR {JOIN|ORDER BY|GROUP BY}] (names)
    fn skip_index_hints(&mut self) -> PResult<()> {
        loop {
            let is_hint = (self.check_keyword(Keyword::Use)
                || self.check_keyword(Keyword::Force)
                || self.check_keyword(Keyword::Ignore))
                && (self.peek(1).is_keyword(Keyword::Index) || self.peek(1).is_keyword(Keyword::Key));
            if !is_hint {
                return Ok(());
            }
            self.advance();
            self.advance();
            if self.match_keyword(Keyword::For) {
                if !self.match_keyword(Keyword::Join) {
                    if !self.match_keyword(Keyword::Order) {
                        self.expect_keyword(Keyword::Group)?;
                    }
                    self.expect_keyword(Keyword::By)?;
                }
            }
            self.expect(TokenType::LParen)?;
            if !self.check(&TokenType::RParen) {
                loop {
                    if !self.match_keyword(Keyword::Primary) {
                        self.parse_identifier()?;
                    }
                    if !self.match_token(TokenType::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenType::RParen)?;
        }
    }

    pub(crate) fn parse_order_by_list(&mut self) -> PResult<Vec<OrderByExpr>> {
        let mut items = Vec::new();
        loop {
            let expr = self.parse_expr()?;
            let asc = if self.match_keyword(Keyword::Desc) {
                false
            } else {
                self.match_keyword(Keyword::Asc);
                true
            };
            items.push(OrderByExpr { expr, asc });
            if !self.match_token(TokenType::Comma) {
                break;
            }
        }
        Ok(items)
    }

    /// `LIMIT n`, `LIMIT offset, n` or `LIMIT n OFFSET offset`
    pub(crate) fn parse_limit(&mut self) -> PResult<Limit> {
        let first = self.parse_limit_value()?;
        if self.match_token(TokenType::Comma) {
            let count = self.parse_limit_value()?;
            return Ok(Limit {
                count,
                offset: Some(first),
            });
        }
        let offset = if self.match_word("OFFSET") {
            Some(self.parse_limit_value()?)
        } else {
            None
        };
        Ok(Limit {
            count: first,
            offset,
        })
    }

    fn parse_limit_value(&mut self) -> PResult<Expr> {
        match self.current().token_type.clone() {
            TokenType::Number(n) if !n.contains(['.', 'e', 'E']) => {
                let value = n
                    .parse::<u64>()
                    .map_err(|_| self.error("LIMIT value out of range"))?;
                self.advance();
                // the native LIMIT is signed; past i64::MAX it is unbounded anyway
                let value = value.min(i64::MAX as u64);
                Ok(Expr::Literal(Literal::Number(value.to_string())))
            }
            TokenType::Placeholder => {
                self.advance();
                let idx = self.placeholders;
                self.placeholders += 1;
                Ok(Expr::Placeholder(idx))
            }
            _ => Err(self.error("LIMIT expects a non-negative integer")),
        }
    }

    // ---- expressions ----------------------------------------------------

    pub(crate) fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_xor()?;
        while self.match_keyword(Keyword::Or) || self.match_token(TokenType::LogicalOr) {
            let right = self.parse_xor()?;
            left = binary(left, BinaryOperator::Or, right);
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.match_keyword(Keyword::Xor) {
            let right = self.parse_and()?;
            left = binary(left, BinaryOperator::Xor, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not()?;
        while self.match_keyword(Keyword::And) || self.match_token(TokenType::LogicalAnd) {
            let right = self.parse_not()?;
            left = binary(left, BinaryOperator::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.match_keyword(Keyword::Not) {
            let expr = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bit_or()?;

        loop {
            if let Some(op) = self.comparison_operator() {
                self.advance();
                if self.check_keyword(Keyword::All) || self.check_word("ANY") || self.check_word("SOME") {
                    return Err(ParseError::Unsupported("ANY/ALL subquery comparison".into()));
                }
                let right = self.parse_bit_or()?;
                left = binary(left, op, right);
                continue;
            }

            if self.match_keyword(Keyword::Is) {
                let negated = self.match_keyword(Keyword::Not);
                left = if self.match_keyword(Keyword::Null) || self.match_word("UNKNOWN") {
                    Expr::IsNull {
                        expr: Box::new(left),
                        negated,
                    }
                } else if self.match_keyword(Keyword::True) {
                    Expr::IsBool {
                        expr: Box::new(left),
                        value: true,
                        negated,
                    }
                } else if self.match_keyword(Keyword::False) {
                    Expr::IsBool {
                        expr: Box::new(left),
                        value: false,
                        negated,
                    }
                } else {
                    return Err(self.error("expected NULL, TRUE or FALSE after IS"));
                };
                continue;
            }

            // [NOT] IN / BETWEEN / LIKE / REGEXP
            let negated = self.check_keyword(Keyword::Not)
                && matches!(
                    self.peek(1),
                    TokenType::Keyword(
                        Keyword::In | Keyword::Between | Keyword::Like | Keyword::Regexp | Keyword::Rlike
                    )
                );
            if negated {
                self.advance();
            }

            if self.match_keyword(Keyword::In) {
                self.expect(TokenType::LParen)?;
                if self.check_keyword(Keyword::Select) {
                    let query = self.parse_query()?;
                    self.expect(TokenType::RParen)?;
                    left = Expr::InSubquery {
                        expr: Box::new(left),
                        query: Box::new(query),
                        negated,
                    };
                } else {
                    let list = self.parse_expr_list()?;
                    self.expect(TokenType::RParen)?;
                    left = Expr::InList {
                        expr: Box::new(left),
                        list,
                        negated,
                    };
                }
            } else if self.match_keyword(Keyword::Between) {
                let low = self.parse_bit_or()?;
                self.expect_keyword(Keyword::And)?;
                let high = self.parse_bit_or()?;
                left = Expr::Between {
                    expr: Box::new(left),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                };
            } else if self.match_keyword(Keyword::Like) {
                let pattern = self.parse_bit_or()?;
                let escape = if self.match_word("ESCAPE") {
                    Some(Box::new(self.parse_primary()?))
                } else {
                    None
                };
                left = Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    escape,
                    negated,
                };
            } else if self.match_keyword(Keyword::Regexp) || self.match_keyword(Keyword::Rlike) {
                let pattern = self.parse_bit_or()?;
                left = Expr::Regexp {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated,
                };
            } else {
                break;
            }
        }

        Ok(left)
    }

    fn comparison_operator(&self) -> Option<BinaryOperator> {
        match self.current().token_type {
            TokenType::Eq => Some(BinaryOperator::Eq),
            TokenType::NullSafeEq => Some(BinaryOperator::NullSafeEq),
            TokenType::Ne => Some(BinaryOperator::Ne),
            TokenType::Lt => Some(BinaryOperator::Lt),
            TokenType::Le => Some(BinaryOperator::Le),
            TokenType::Gt => Some(BinaryOperator::Gt),
            TokenType::Ge => Some(BinaryOperator::Ge),
            _ => None,
        }
    }

    fn parse_bit_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bit_and()?;
        while self.match_token(TokenType::Pipe) {
            let right = self.parse_bit_and()?;
            left = binary(left, BinaryOperator::BitOr, right);
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_shift()?;
        while self.match_token(TokenType::Ampersand) {
            let right = self.parse_shift()?;
            left = binary(left, BinaryOperator::BitAnd, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.match_token(TokenType::ShiftLeft) {
                BinaryOperator::ShiftLeft
            } else if self.match_token(TokenType::ShiftRight) {
                BinaryOperator::ShiftRight
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = binary(left, op, right);
        }
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.match_token(TokenType::Plus) {
                BinaryOperator::Add
            } else if self.match_token(TokenType::Minus) {
                BinaryOperator::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = binary(left, op, right);
        }
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_bit_xor()?;
        loop {
            let op = if self.match_token(TokenType::Star) {
                BinaryOperator::Mul
            } else if self.match_token(TokenType::Slash) {
                BinaryOperator::Div
            } else if self.match_keyword(Keyword::Div) {
                BinaryOperator::IntDiv
            } else if self.match_token(TokenType::Percent) || self.match_keyword(Keyword::Mod) {
                BinaryOperator::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_bit_xor()?;
            left = binary(left, op, right);
        }
    }

    fn parse_bit_xor(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        while self.match_token(TokenType::Caret) {
            let right = self.parse_unary()?;
            left = binary(left, BinaryOperator::BitXor, right);
        }
        Ok(left)
    }

    pub(crate) fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.current().token_type {
            TokenType::Minus => Some(UnaryOperator::Minus),
            TokenType::Plus => Some(UnaryOperator::Plus),
            TokenType::Tilde => Some(UnaryOperator::BitNot),
            TokenType::Bang => Some(UnaryOperator::Not),
            TokenType::Keyword(Keyword::Binary) if *self.peek(1) != TokenType::LParen => {
                Some(UnaryOperator::Binary)
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }

        let mut expr = self.parse_primary()?;
        loop {
            if self.match_keyword(Keyword::Collate) {
                let collation = self.parse_name_or_string()?;
                expr = Expr::Collate {
                    expr: Box::new(expr),
                    collation,
                };
            } else if self.check(&TokenType::Arrow) || self.check(&TokenType::LongArrow) {
                let unquote = self.check(&TokenType::LongArrow);
                self.advance();
                let path = self.parse_string()?;
                expr = Expr::JsonExtract {
                    expr: Box::new(expr),
                    path,
                    unquote,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    pub(crate) fn parse_expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut exprs = vec![self.parse_expr()?];
        while self.match_token(TokenType::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    pub(crate) fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.current().token_type.clone();
        match token {
            TokenType::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(n)))
            }
            TokenType::String(s) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(s)))
            }
            TokenType::HexString(b) => {
                self.advance();
                Ok(Expr::Literal(Literal::Hex(b)))
            }
            TokenType::BitString(b) => {
                self.advance();
                Ok(Expr::Literal(Literal::Bit(b)))
            }
            TokenType::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::Literal(Literal::Null))
            }
            TokenType::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(true)))
            }
            TokenType::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Literal(Literal::Boolean(false)))
            }
            TokenType::Placeholder => {
                self.advance();
                let idx = self.placeholders;
                self.placeholders += 1;
                Ok(Expr::Placeholder(idx))
            }
            TokenType::UserVariable(name) => {
                self.advance();
                if self.match_token(TokenType::Assign) {
                    let value = self.parse_expr()?;
                    return Ok(Expr::AssignUserVariable {
                        name,
                        value: Box::new(value),
                    });
                }
                Ok(Expr::UserVariable(name))
            }
            TokenType::SystemVariable { scope, name } => {
                self.advance();
                Ok(Expr::SystemVariable { scope, name })
            }
            TokenType::LParen => {
                self.advance();
                if self.check_keyword(Keyword::Select) {
                    let query = self.parse_query()?;
                    self.expect(TokenType::RParen)?;
                    return Ok(Expr::Subquery(Box::new(query)));
                }
                let mut items = self.parse_expr_list()?;
                self.expect(TokenType::RParen)?;
                if items.len() == 1 {
                    Ok(Expr::Nested(Box::new(items.remove(0))))
                } else {
                    Ok(Expr::Tuple(items))
                }
            }
            TokenType::Keyword(Keyword::Exists) => {
                self.advance();
                self.expect(TokenType::LParen)?;
                let query = self.parse_query()?;
                self.expect(TokenType::RParen)?;
                Ok(Expr::Exists {
                    query: Box::new(query),
                    negated: false,
                })
            }
            TokenType::Keyword(Keyword::Case) => self.parse_case(),
            TokenType::Keyword(Keyword::Interval) => {
                self.advance();
                let value = self.parse_expr()?;
                let unit = self.parse_interval_unit()?;
                Ok(Expr::Interval {
                    value: Box::new(value),
                    unit,
                })
            }
            TokenType::Keyword(Keyword::Default) => {
                self.advance();
                if self.match_token(TokenType::LParen) {
                    return Err(ParseError::Unsupported("DEFAULT(column)".into()));
                }
                Ok(Expr::Default)
            }
            TokenType::Keyword(Keyword::Values) if *self.peek(1) == TokenType::LParen => {
                self.advance();
                self.advance();
                let column = self.parse_identifier()?;
                self.expect(TokenType::RParen)?;
                Ok(Expr::InsertedValue(column))
            }
            TokenType::Keyword(Keyword::Convert) => self.parse_convert(),
            TokenType::Keyword(
                Keyword::CurrentTimestamp | Keyword::LocalTime | Keyword::LocalTimestamp,
            ) => {
                self.advance();
                let args = self.parse_optional_empty_args()?;
                Ok(function("NOW", args))
            }
            TokenType::Keyword(Keyword::CurrentDate) => {
                self.advance();
                self.parse_optional_empty_args()?;
                Ok(function("CURDATE", Vec::new()))
            }
            TokenType::Keyword(Keyword::CurrentTime) => {
                self.advance();
                let args = self.parse_optional_empty_args()?;
                Ok(function("CURTIME", args))
            }
            TokenType::Keyword(Keyword::CurrentUser) => {
                self.advance();
                self.parse_optional_empty_args()?;
                Ok(function("CURRENT_USER", Vec::new()))
            }
            TokenType::Keyword(
                kw @ (Keyword::If
                | Keyword::Left
                | Keyword::Right
                | Keyword::Replace
                | Keyword::Insert
                | Keyword::Mod
                | Keyword::Database
                | Keyword::Schema
                | Keyword::Character),
            ) if *self.peek(1) == TokenType::LParen => {
                self.advance();
                let name = match kw {
                    Keyword::Schema => "DATABASE".to_string(),
                    Keyword::Character => "CHAR".to_string(),
                    other => format!("{:?}", other).to_ascii_uppercase(),
                };
                self.parse_function_call(name)
            }
            TokenType::Identifier(name) => {
                if *self.peek(1) == TokenType::LParen {
                    self.advance();
                    return self.parse_function_call(name.to_ascii_uppercase());
                }
                // Typed literals: DATE '2024-01-01', TIME '..', TIMESTAMP '..'
                if let TokenType::String(s) = self.peek(1).clone() {
                    let target = match name.to_ascii_uppercase().as_str() {
                        "DATE" => Some(CastTarget::Date),
                        "TIME" => Some(CastTarget::Time(None)),
                        "TIMESTAMP" => Some(CastTarget::DateTime(None)),
                        _ => None,
                    };
                    if let Some(target) = target {
                        self.advance();
                        self.advance();
                        return Ok(Expr::Cast {
                            expr: Box::new(Expr::string(s)),
                            target,
                        });
                    }
                }
                self.parse_column_ref()
            }
            TokenType::QuotedIdentifier(_) => self.parse_column_ref(),
            _ => Err(self.error("expected expression")),
        }
    }

    fn parse_column_ref(&mut self) -> PResult<Expr> {
        let first = self.parse_identifier()?;
        if !self.check(&TokenType::Dot) {
            return Ok(Expr::Column(ColumnRef::bare(first)));
        }
        self.advance();
        let second = self.parse_identifier()?;
        if !self.check(&TokenType::Dot) {
            return Ok(Expr::Column(ColumnRef {
                database: None,
                table: Some(first),
                column: second,
            }));
        }
        self.advance();
        let third = self.parse_identifier()?;
        Ok(Expr::Column(ColumnRef {
            database: Some(first),
            table: Some(second),
            column: third,
        }))
    }

    // `NOW` vs `NOW()` vs `NOW(3)`
    fn parse_optional_empty_args(&mut self) -> PResult<Vec<Expr>> {
        if !self.match_token(TokenType::LParen) {
            return Ok(Vec::new());
        }
        if self.match_token(TokenType::RParen) {
            return Ok(Vec::new());
        }
        let args = self.parse_expr_list()?;
        self.expect(TokenType::RParen)?;
        Ok(args)
    }

    fn parse_case(&mut self) -> PResult<Expr> {
        self.expect_keyword(Keyword::Case)?;
        let operand = if self.check_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut branches = Vec::new();
        while self.match_keyword(Keyword::When) {
            let when = self.parse_expr()?;
            self.expect_keyword(Keyword::Then)?;
            let then = self.parse_expr()?;
            branches.push((when, then));
        }
        if branches.is_empty() {
            return Err(self.error("CASE requires at least one WHEN"));
        }
        let else_result = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_word("END")?;
        Ok(Expr::Case {
            operand,
            branches,
            else_result,
        })
    }

    fn parse_convert(&mut self) -> PResult<Expr> {
        self.expect_keyword(Keyword::Convert)?;
        self.expect(TokenType::LParen)?;
        let expr = self.parse_expr()?;
        if self.match_keyword(Keyword::Using) {
            // CONVERT(x USING charset) only changes the character set
            self.parse_name_or_string()?;
            self.expect(TokenType::RParen)?;
            return Ok(Expr::Cast {
                expr: Box::new(expr),
                target: CastTarget::Char(None),
            });
        }
        self.expect(TokenType::Comma)?;
        let target = self.parse_cast_target()?;
        self.expect(TokenType::RParen)?;
        Ok(Expr::Cast {
            expr: Box::new(expr),
            target,
        })
    }

    fn parse_cast_target(&mut self) -> PResult<CastTarget> {
        let optional_len = |p: &mut Parser| -> PResult<Option<u32>> {
            if p.match_token(TokenType::LParen) {
                let n = p.parse_u32()?;
                p.expect(TokenType::RParen)?;
                Ok(Some(n))
            } else {
                Ok(None)
            }
        };

        if self.match_keyword(Keyword::Binary) {
            return Ok(CastTarget::Binary(optional_len(self)?));
        }
        if self.match_keyword(Keyword::Unsigned) {
            self.match_word("INTEGER");
            self.match_word("INT");
            return Ok(CastTarget::Unsigned);
        }
        let word = self.parse_identifier()?.to_ascii_uppercase();
        let target = match word.as_str() {
            "SIGNED" => {
                if !self.match_word("INTEGER") {
                    self.match_word("INT");
                }
                CastTarget::Signed
            }
            "INTEGER" | "INT" => CastTarget::Signed,
            "CHAR" | "NCHAR" | "VARCHAR" => {
                let len = optional_len(self)?;
                self.skip_charset_clause()?;
                CastTarget::Char(len)
            }
            "DECIMAL" | "DEC" | "NUMERIC" => {
                if self.match_token(TokenType::LParen) {
                    let p = self.parse_u32()?;
                    let s = if self.match_token(TokenType::Comma) {
                        Some(self.parse_u32()?)
                    } else {
                        None
                    };
                    self.expect(TokenType::RParen)?;
                    CastTarget::Decimal(Some(p), s)
                } else {
                    CastTarget::Decimal(None, None)
                }
            }
            "DOUBLE" | "FLOAT" | "REAL" => {
                optional_len(self)?;
                CastTarget::Double
            }
            "DATE" => CastTarget::Date,
            "DATETIME" => CastTarget::DateTime(optional_len(self)?),
            "TIME" => CastTarget::Time(optional_len(self)?),
            "JSON" => CastTarget::Json,
            other => return Err(self.error(&format!("unsupported cast target {}", other))),
        };
        Ok(target)
    }

    /// `CHARACTER SET x` / `CHARSET x` after a CHAR cast target
    fn skip_charset_clause(&mut self) -> PResult<()> {
        if self.match_keyword(Keyword::Character) {
            self.expect_keyword(Keyword::Set)?;
            self.parse_name_or_string()?;
        } else if self.match_word("CHARSET") {
            self.parse_name_or_string()?;
        }
        Ok(())
    }

    pub(crate) fn parse_interval_unit(&mut self) -> PResult<String> {
        let unit = self.parse_identifier()?.to_ascii_uppercase();
        const UNITS: &[&str] = &[
            "MICROSECOND", "SECOND", "MINUTE", "HOUR", "DAY", "WEEK", "MONTH", "QUARTER", "YEAR",
            "SECOND_MICROSECOND", "MINUTE_MICROSECOND", "MINUTE_SECOND", "HOUR_MICROSECOND",
            "HOUR_SECOND", "HOUR_MINUTE", "DAY_MICROSECOND", "DAY_SECOND", "DAY_MINUTE",
            "DAY_HOUR", "YEAR_MONTH",
        ];
        if UNITS.contains(&unit.as_str()) {
            Ok(unit)
        } else {
            Err(self.error(&format!("unknown interval unit {}", unit)))
        }
    }

    /// Function call after the name; the cursor is on `(`.
    fn parse_function_call(&mut self, name: String) -> PResult<Expr> {
        self.expect(TokenType::LParen)?;

        match name.as_str() {
            "CAST" => {
                let expr = self.parse_expr()?;
                self.expect_keyword(Keyword::As)?;
                let target = self.parse_cast_target()?;
                self.expect(TokenType::RParen)?;
                return Ok(Expr::Cast {
                    expr: Box::new(expr),
                    target,
                });
            }
            "GROUP_CONCAT" => {
                let distinct = self.match_keyword(Keyword::Distinct);
                let args = self.parse_expr_list()?;
                let order_by = if self.match_keyword(Keyword::Order) {
                    self.expect_keyword(Keyword::By)?;
                    self.parse_order_by_list()?
                } else {
                    Vec::new()
                };
                let separator = if self.match_keyword(Keyword::Separator) {
                    Some(self.parse_string()?)
                } else {
                    None
                };
                self.expect(TokenType::RParen)?;
                return Ok(Expr::GroupConcat {
                    distinct,
                    args,
                    order_by,
                    separator,
                });
            }
            "TRIM" => return self.parse_trim(),
            "SUBSTRING" | "SUBSTR" | "MID" => {
                let s = self.parse_expr()?;
                let mut args = vec![s];
                if self.match_keyword(Keyword::From) {
                    args.push(self.parse_expr()?);
                    if self.match_keyword(Keyword::For) {
                        args.push(self.parse_expr()?);
                    }
                } else {
                    while self.match_token(TokenType::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(TokenType::RParen)?;
                return Ok(function("SUBSTRING", args));
            }
            "EXTRACT" => {
                let unit = self.parse_interval_unit()?;
                self.expect_keyword(Keyword::From)?;
                let expr = self.parse_expr()?;
                self.expect(TokenType::RParen)?;
                return Ok(function("EXTRACT", vec![Expr::string(unit), expr]));
            }
            "POSITION" => {
                let needle = self.parse_bit_or()?;
                self.expect_keyword(Keyword::In)?;
                let haystack = self.parse_expr()?;
                self.expect(TokenType::RParen)?;
                return Ok(function("LOCATE", vec![needle, haystack]));
            }
            "TIMESTAMPDIFF" | "TIMESTAMPADD" => {
                let unit = self.parse_interval_unit()?;
                let mut args = vec![Expr::string(unit)];
                while self.match_token(TokenType::Comma) {
                    args.push(self.parse_expr()?);
                }
                self.expect(TokenType::RParen)?;
                return Ok(function(&name, args));
            }
            "CHAR" => {
                let args = self.parse_expr_list()?;
                if self.match_keyword(Keyword::Using) {
                    self.parse_name_or_string()?;
                }
                self.expect(TokenType::RParen)?;
                return Ok(function("CHAR", args));
            }
            _ => {}
        }

        if self.match_token(TokenType::RParen) {
            return Ok(function(&name, Vec::new()));
        }
        if self.match_token(TokenType::Star) {
            self.expect(TokenType::RParen)?;
            return Ok(Expr::Function {
                name,
                args: vec![Expr::Wildcard],
                distinct: false,
            });
        }
        let distinct = self.match_keyword(Keyword::Distinct);
        if !distinct {
            self.match_keyword(Keyword::All);
        }
        let args = self.parse_expr_list()?;
        self.expect(TokenType::RParen)?;
        if self.check_word("OVER") {
            return Err(ParseError::Unsupported("window functions".into()));
        }
        Ok(Expr::Function {
            name,
            args,
            distinct,
        })
    }

    // TRIM([{BOTH | LEADING | TRAILING} [remstr] FROM] str)
    fn parse_trim(&mut self) -> PResult<Expr> {
        let mode = if self.match_word("BOTH") {
            Some("TRIM")
        } else if self.match_word("LEADING") {
            Some("LTRIM")
        } else if self.match_word("TRAILING") {
            Some("RTRIM")
        } else {
            None
        };
        let first = if mode.is_some() && self.check_keyword(Keyword::From) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let result = if self.match_keyword(Keyword::From) {
            let target = self.parse_expr()?;
            let mut args = vec![target];
            if let Some(remove) = first {
                args.push(remove);
            }
            function(mode.unwrap_or("TRIM"), args)
        } else {
            let target = first.ok_or_else(|| self.error("TRIM requires an argument"))?;
            function(mode.unwrap_or("TRIM"), vec![target])
        };
        self.expect(TokenType::RParen)?;
        Ok(result)
    }
}

enum QueryTerm {
    Select(SelectStmt),
    Parenthesized(Query),
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

fn function(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.to_string(),
        args,
        distinct: false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::parse_sql;
    use super::*;

    fn select(sql: &str) -> Query {
        match parse_sql(sql).unwrap() {
            Statement::Select(q) => q,
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    fn first_expr(sql: &str) -> Expr {
        match &select(sql).select.columns[0] {
            SelectItem::Expr { expr, .. } => expr.clone(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_select() {
        let q = select("SELECT * FROM users");
        assert_eq!(q.select.columns, vec![SelectItem::Wildcard]);
        match &q.select.from[0] {
            TableRef::Table { name, alias } => {
                assert_eq!(name.name, "users");
                assert!(alias.is_none());
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_labels_and_aliases() {
        let q = select("SELECT a+1, b AS bee, c 'see', t.* FROM t");
        let items = &q.select.columns;
        match &items[0] {
            SelectItem::Expr { text, alias, .. } => {
                assert_eq!(text, "a+1");
                assert!(alias.is_none());
            }
            _ => panic!(),
        }
        assert!(matches!(&items[1], SelectItem::Expr { alias: Some(a), .. } if a == "bee"));
        assert!(matches!(&items[2], SelectItem::Expr { alias: Some(a), .. } if a == "see"));
        assert_eq!(items[3], SelectItem::QualifiedWildcard(ObjectName::bare("t")));
    }

    #[test]
    fn test_precedence() {
        let e = first_expr("SELECT 1 + 2 * 3 = 7 AND NOT a OR b");
        match e {
            Expr::Binary {
                op: BinaryOperator::Or,
                left,
                ..
            } => match *left {
                Expr::Binary {
                    op: BinaryOperator::And,
                    left,
                    right,
                } => {
                    assert!(matches!(*left, Expr::Binary { op: BinaryOperator::Eq, .. }));
                    assert!(matches!(*right, Expr::Unary { op: UnaryOperator::Not, .. }));
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_predicates() {
        assert!(matches!(
            first_expr("SELECT a NOT IN (1, 2)"),
            Expr::InList { negated: true, .. }
        ));
        assert!(matches!(
            first_expr("SELECT a BETWEEN 1 AND 5"),
            Expr::Between { negated: false, .. }
        ));
        assert!(matches!(
            first_expr("SELECT a NOT LIKE 'x%' ESCAPE '!'"),
            Expr::Like { negated: true, escape: Some(_), .. }
        ));
        assert!(matches!(
            first_expr("SELECT a IS NOT NULL"),
            Expr::IsNull { negated: true, .. }
        ));
        assert!(matches!(
            first_expr("SELECT a RLIKE '^x'"),
            Expr::Regexp { negated: false, .. }
        ));
        assert!(matches!(
            first_expr("SELECT a <=> NULL"),
            Expr::Binary { op: BinaryOperator::NullSafeEq, .. }
        ));
    }

    #[test]
    fn test_joins() {
        let q = select(
            "SELECT * FROM a JOIN b ON a.id = b.a_id LEFT OUTER JOIN c USING (id) NATURAL JOIN d, e",
        );
        assert_eq!(q.select.from.len(), 2);
        match &q.select.from[0] {
            TableRef::Join { kind, constraint, .. } => {
                assert_eq!(*kind, JoinKind::Inner);
                assert_eq!(*constraint, JoinConstraint::Natural);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(q.select.from[0].tables().len(), 4);
    }

    #[test]
    fn test_limit_forms() {
        let q = select("SELECT * FROM t LIMIT 5, 10");
        let limit = q.limit.unwrap();
        assert_eq!(limit.count, Expr::number(10));
        assert_eq!(limit.offset, Some(Expr::number(5)));

        let q = select("SELECT * FROM t ORDER BY a DESC LIMIT 10 OFFSET 5");
        assert!(!q.order_by[0].asc);
        assert_eq!(q.limit.unwrap().offset, Some(Expr::number(5)));
    }

    #[test]
    fn test_limit_range() {
        let q = select("SELECT * FROM t LIMIT 18446744073709551615");
        assert_eq!(q.limit.unwrap().count, Expr::Literal(Literal::Number(i64::MAX.to_string())));
        let err = parse_sql("SELECT 1 LIMIT 99999999999999999999").unwrap_err();
        assert_eq!(err.code(), 1064);
        assert!(err.to_string().contains("LIMIT value out of range"));
    }

    #[test]
    fn test_union_and_subqueries() {
        let q = select("SELECT a FROM t UNION ALL SELECT b FROM (SELECT b FROM u) AS x ORDER BY 1");
        assert_eq!(q.unions.len(), 1);
        assert!(q.unions[0].all);
        assert!(matches!(q.unions[0].select.from[0], TableRef::Derived { .. }));
        assert_eq!(q.order_by.len(), 1);

        assert!(matches!(
            first_expr("SELECT EXISTS (SELECT 1)"),
            Expr::Exists { .. }
        ));
    }

    #[test]
    fn test_function_forms() {
        assert!(matches!(
            first_expr("SELECT COUNT(*)"),
            Expr::Function { ref name, ref args, .. } if name == "COUNT" && args == &vec![Expr::Wildcard]
        ));
        assert!(matches!(
            first_expr("SELECT GROUP_CONCAT(DISTINCT a ORDER BY a SEPARATOR ';')"),
            Expr::GroupConcat { distinct: true, separator: Some(_), .. }
        ));
        assert!(matches!(
            first_expr("SELECT CAST(a AS UNSIGNED)"),
            Expr::Cast { target: CastTarget::Unsigned, .. }
        ));
        assert!(matches!(
            first_expr("SELECT IF(a, 1, 2)"),
            Expr::Function { ref name, .. } if name == "IF"
        ));
        assert!(matches!(
            first_expr("SELECT CURRENT_TIMESTAMP"),
            Expr::Function { ref name, .. } if name == "NOW"
        ));
        assert!(matches!(
            first_expr("SELECT DATE_ADD(d, INTERVAL 1 DAY)"),
            Expr::Function { ref args, .. } if matches!(args[1], Expr::Interval { .. })
        ));
        assert!(matches!(
            first_expr("SELECT TRIM(LEADING 'x' FROM s)"),
            Expr::Function { ref name, .. } if name == "LTRIM"
        ));
        assert!(matches!(
            first_expr("SELECT CASE WHEN a THEN 1 ELSE 2 END"),
            Expr::Case { .. }
        ));
    }

    #[test]
    fn test_placeholders_numbered() {
        let q = select("SELECT ? + ? FROM t WHERE a = ? LIMIT ?");
        assert!(matches!(q.limit.unwrap().count, Expr::Placeholder(3)));
    }

    #[test]
    fn test_unsupported_shapes() {
        assert!(matches!(
            parse_sql("SELECT a INTO @x FROM t").unwrap_err(),
            ParseError::Unsupported(_)
        ));
        assert!(matches!(
            parse_sql("WITH x AS (SELECT 1) SELECT * FROM x").unwrap_err(),
            ParseError::Unsupported(_)
        ));
    }
}
